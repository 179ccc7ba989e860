//! Entry point for loading a package into a root object.
//!
//! The archive is inflated once, the decode pass walks the relationship graph from
//! `_rels/.rels` and hands parts to the root, and whatever the pass did not consume is staged
//! on disk as extra files.

use std::path::Path;

use tracing::{debug, info_span};

use crate::ooxml::opc::decode::{DecodeHost, DecodeMap};
use crate::ooxml::opc::error::Result;
use crate::ooxml::opc::phys_pkg::PhysPkgReader;

/// A package read from disk or memory, ready to be decoded.
#[derive(Debug)]
pub struct PackageReader {
    phys: PhysPkgReader,
}

impl PackageReader {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(Self {
            phys: PhysPkgReader::from_bytes(data)?,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            phys: PhysPkgReader::open(path)?,
        })
    }

    /// Decode the package into `host`.
    ///
    /// On return the host's package holds the content-type registry as read, the detected
    /// conformance class and the staged extra files.
    pub fn decode<H: DecodeHost>(&self, host: &mut H) -> Result<()> {
        let doc_type = host.doc_type();
        let span = info_span!("decode", ?doc_type, members = self.phys.len());
        let _guard = span.enter();

        let decoded = DecodeMap::new(&self.phys, doc_type).run(host)?;
        debug!(
            conformance = ?decoded.conformance,
            renamed = decoded.renamed.len(),
            "relationship graph decoded"
        );

        let package = host.package();
        package.set_content_types(decoded.content_types);
        package.set_conformance(decoded.conformance);
        package.stage_extras(&self.phys, &decoded.leftovers, &decoded.renamed)
    }
}
