//! Physical access to the ZIP container of a package.
//!
//! The reader inflates every member up front, in archive order, so the decode pass can look
//! entries up by name as relationships reveal them and can tell afterwards which members
//! were never consumed. The writer streams members into any `Write + Seek` sink.

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use tracing::{debug, warn};
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::{CompressionMethod, ZipArchive};

use crate::ooxml::config::Compression;
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::PackURI;

/// Most bytes reserved up front for one member; larger members grow as they inflate.
const MAX_PREALLOCATION: usize = 4 << 20;

// The declared size comes from the archive and is not trusted beyond the cap.
fn initial_capacity(declared: u64) -> usize {
    usize::try_from(declared).map_or(MAX_PREALLOCATION, |size| size.min(MAX_PREALLOCATION))
}

/// One inflated archive member.
#[derive(Debug)]
pub struct PhysEntry {
    /// Member name exactly as stored in the archive.
    pub name: String,
    pub data: Vec<u8>,
}

/// All non-directory members of a ZIP archive.
#[derive(Debug)]
pub struct PhysPkgReader {
    entries: Vec<PhysEntry>,
    // lowercased member name without leading slash -> entry index
    index: HashMap<String, usize>,
}

impl PhysPkgReader {
    /// Open an OPC package from a file path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(OpcError::PackageNotFound(path.display().to_string()));
        }
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Load every member of an in-memory archive. A malformed archive is an error.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        let mut entries = Vec::with_capacity(archive.len());
        let mut index = HashMap::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(initial_capacity(file.size()));
            file.read_to_end(&mut data)?;

            let key = lookup_key(&name);
            if index.contains_key(&key) {
                warn!(member = %name, "duplicate archive member, keeping the first");
                continue;
            }
            index.insert(key, entries.len());
            entries.push(PhysEntry { name, data });
        }

        debug!(members = entries.len(), "archive loaded");
        Ok(Self { entries, index })
    }

    /// Position of a member in archive order, tolerant of a leading slash and ASCII case.
    pub fn position(&self, member: &str) -> Option<usize> {
        self.index.get(&lookup_key(member)).copied()
    }

    pub fn contains(&self, pack_uri: &PackURI) -> bool {
        self.position(pack_uri.membername()).is_some()
    }

    pub fn blob_for(&self, pack_uri: &PackURI) -> Result<&[u8]> {
        self.position(pack_uri.membername())
            .map(|i| self.entries[i].data.as_slice())
            .ok_or_else(|| OpcError::PartNotFound(pack_uri.to_string()))
    }

    #[inline]
    pub fn entry(&self, index: usize) -> &PhysEntry {
        &self.entries[index]
    }

    #[inline]
    pub fn entries(&self) -> &[PhysEntry] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn lookup_key(member: &str) -> String {
    member.trim_start_matches('/').to_ascii_lowercase()
}

/// Streams members into a ZIP archive.
pub struct PhysPkgWriter<W: Write + Seek> {
    archive: ZipWriter<W>,
    options: SimpleFileOptions,
    written: HashSet<String>,
}

impl PhysPkgWriter<Cursor<Vec<u8>>> {
    /// A writer producing an in-memory archive.
    pub fn in_memory(compression: Compression) -> Self {
        Self::new(Cursor::new(Vec::new()), compression)
    }
}

impl<W: Write + Seek> PhysPkgWriter<W> {
    pub fn new(sink: W, compression: Compression) -> Self {
        let method = match compression {
            Compression::Stored => CompressionMethod::Stored,
            Compression::Deflated => CompressionMethod::Deflated,
        };
        Self {
            archive: ZipWriter::new(sink),
            options: SimpleFileOptions::default().compression_method(method),
            written: HashSet::new(),
        }
    }

    /// Write one member. A second member with the same name is refused with a warning;
    /// the return value tells whether the member was written.
    pub fn write(&mut self, member: &str, blob: &[u8]) -> Result<bool> {
        let member = member.trim_start_matches('/');
        if !self.written.insert(lookup_key(member)) {
            warn!(member, "refusing to write duplicate archive member");
            return Ok(false);
        }
        self.archive.start_file(member, self.options)?;
        self.archive.write_all(blob)?;
        Ok(true)
    }

    /// Write a part under its pack URI.
    pub fn write_part(&mut self, pack_uri: &PackURI, blob: &[u8]) -> Result<bool> {
        self.write(pack_uri.membername(), blob)
    }

    /// Whether a member of that name was already written.
    pub fn has_written(&self, member: &str) -> bool {
        self.written.contains(&lookup_key(member))
    }

    /// Finish the archive and hand back the sink.
    pub fn finish(self) -> Result<W> {
        Ok(self.archive.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut writer = PhysPkgWriter::in_memory(Compression::Deflated);
        let pack_uri = PackURI::new("/test.txt").unwrap();
        assert!(writer.write_part(&pack_uri, b"Hello, World!").unwrap());
        let zip_data = writer.finish().unwrap().into_inner();

        let reader = PhysPkgReader::from_bytes(&zip_data).unwrap();
        assert_eq!(reader.blob_for(&pack_uri).unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_lookup_is_case_and_slash_tolerant() {
        let mut writer = PhysPkgWriter::in_memory(Compression::Stored);
        writer.write("[Content_Types].xml", b"<Types/>").unwrap();
        writer.write("word/Document.xml", b"<document/>").unwrap();
        let zip_data = writer.finish().unwrap().into_inner();

        let reader = PhysPkgReader::from_bytes(&zip_data).unwrap();
        assert_eq!(reader.len(), 2);
        assert_eq!(reader.position("/word/document.xml"), Some(1));
        assert!(reader.contains(&PackURI::new("/[content_types].xml").unwrap()));
        assert_eq!(reader.entry(1).name, "word/Document.xml");
    }

    #[test]
    fn test_duplicate_member_is_refused() {
        let mut writer = PhysPkgWriter::in_memory(Compression::Deflated);
        assert!(writer.write("a.xml", b"one").unwrap());
        assert!(!writer.write("/a.xml", b"two").unwrap());
        assert!(writer.has_written("A.xml"));
        let zip_data = writer.finish().unwrap().into_inner();
        let reader = PhysPkgReader::from_bytes(&zip_data).unwrap();
        assert_eq!(reader.blob_for(&PackURI::new("/a.xml").unwrap()).unwrap(), b"one");
    }

    #[test]
    fn test_declared_size_does_not_drive_allocation() {
        assert_eq!(initial_capacity(512), 512);
        assert_eq!(initial_capacity(u64::MAX), MAX_PREALLOCATION);
        assert_eq!(initial_capacity(MAX_PREALLOCATION as u64 + 1), MAX_PREALLOCATION);
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(
            PhysPkgReader::from_bytes(b"definitely not a zip archive"),
            Err(OpcError::Zip(_))
        ));
    }
}
