//! Serializes parts into the zip container.
//!
//! The root objects decide what goes in and in which order; this module decides how each
//! member is encoded: XML parts get empty elements collapsed, relationship tables and the
//! content-type registry are rendered from their models, extra files are copied back from the
//! staging directory.

use std::io::{Seek, Write};

use tracing::{trace, warn};

use crate::ooxml::config::Compression;
use crate::ooxml::opc::content_types::ContentTypes;
use crate::ooxml::opc::error::Result;
use crate::ooxml::opc::marshal::collapse_empty_elements;
use crate::ooxml::opc::packuri::{CONTENT_TYPES_URI, PACKAGE_URI, PackURI};
use crate::ooxml::opc::part::{ExtraFile, XmlPart};
use crate::ooxml::opc::phys_pkg::PhysPkgWriter;
use crate::ooxml::opc::rel::Relationships;
use crate::ooxml::opc::staging::StagingDir;

/// Writes one package into a seekable sink.
pub struct PackageWriter<W: Write + Seek> {
    phys: PhysPkgWriter<W>,
}

impl<W: Write + Seek> PackageWriter<W> {
    pub fn new(sink: W, compression: Compression) -> Self {
        Self {
            phys: PhysPkgWriter::new(sink, compression),
        }
    }

    /// Write the relationship table of `source`. Empty part-level tables are omitted; the
    /// package-level table is always written.
    pub fn write_rels(&mut self, source: &PackURI, rels: &Relationships) -> Result<()> {
        if rels.is_empty() && source.as_str() != PACKAGE_URI {
            return Ok(());
        }
        self.phys
            .write_part(&source.rels_uri(), rels.to_xml().as_bytes())?;
        Ok(())
    }

    /// Write an XML part followed by its relationship table.
    ///
    /// A part whose XML cannot be re-serialized is written as it is.
    pub fn write_xml_part(&mut self, part: &XmlPart) -> Result<()> {
        trace!(part = %part.partname(), "writing part");
        match collapse_empty_elements(part.blob()) {
            Ok(blob) => self.phys.write_part(part.partname(), &blob)?,
            Err(e) => {
                warn!(part = %part.partname(), error = %e, "writing part XML unmodified");
                self.phys.write_part(part.partname(), part.blob())?
            },
        };
        self.write_rels(part.partname(), part.rels())
    }

    /// Write a binary part.
    pub fn write_blob(&mut self, partname: &PackURI, blob: &[u8]) -> Result<()> {
        self.phys.write_part(partname, blob)?;
        Ok(())
    }

    pub fn write_content_types(&mut self, content_types: &ContentTypes) -> Result<()> {
        self.phys
            .write(CONTENT_TYPES_URI, content_types.to_xml().as_bytes())?;
        Ok(())
    }

    /// Copy an extra file back from staging under its original member name.
    ///
    /// An extra whose name was taken by a part written earlier loses.
    pub fn write_extra(&mut self, extra: &ExtraFile, staging: &StagingDir) -> Result<()> {
        if self.phys.has_written(&extra.zip_path) {
            warn!(member = %extra.zip_path, "extra file shadowed by a part of the same name");
            return Ok(());
        }
        let data = staging.load(&extra.disk_path)?;
        self.phys.write(&extra.zip_path, &data)?;
        Ok(())
    }

    /// Finish the archive and hand back the sink.
    pub fn finish(self) -> Result<W> {
        self.phys.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::opc::phys_pkg::PhysPkgReader;
    use std::io::Cursor;

    fn writer() -> PackageWriter<Cursor<Vec<u8>>> {
        PackageWriter::new(Cursor::new(Vec::new()), Compression::Deflated)
    }

    #[test]
    fn test_empty_part_rels_are_skipped() {
        let mut writer = writer();
        let part = XmlPart::new(
            PackURI::new("/word/styles.xml").unwrap(),
            "application/xml",
            b"<w:styles></w:styles>".to_vec(),
        )
        .unwrap();
        writer.write_xml_part(&part).unwrap();
        writer
            .write_rels(&PackURI::new(PACKAGE_URI).unwrap(), &Relationships::default())
            .unwrap();

        let bytes = writer.finish().unwrap().into_inner();
        let phys = PhysPkgReader::from_bytes(&bytes).unwrap();
        let names: Vec<_> = phys.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["word/styles.xml", "_rels/.rels"]);
        assert_eq!(phys.entry(0).data, b"<w:styles/>");
    }

    #[test]
    fn test_extra_file_shadowed_by_part() {
        let mut staging = StagingDir::create(None).unwrap();
        let disk_path = staging.stage(b"old").unwrap();
        let extra = ExtraFile {
            zip_path: "word/styles.xml".to_string(),
            disk_path,
        };

        let mut writer = writer();
        writer
            .write_blob(&PackURI::new("/word/styles.xml").unwrap(), b"new")
            .unwrap();
        writer.write_extra(&extra, &staging).unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        let phys = PhysPkgReader::from_bytes(&bytes).unwrap();
        assert_eq!(phys.len(), 1);
        assert_eq!(phys.entry(0).data, b"new");
    }
}
