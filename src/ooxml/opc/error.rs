/// Error types for package-level operations
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpcError {
    #[error("Package not found: {0}")]
    PackageNotFound(String),

    /// `[Content_Types].xml` or the root `_rels/.rels` is absent.
    #[error("Missing required bootstrap part: {0}")]
    MissingBootstrapPart(String),

    #[error("Invalid pack URI: {0}")]
    InvalidPackUri(String),

    #[error("Part not found: {0}")]
    PartNotFound(String),

    #[error("Relationship not found: {0}")]
    RelationshipNotFound(String),

    #[error("Content type not found for partname: {0}")]
    ContentTypeNotFound(String),

    #[error("Invalid relationship: {0}")]
    InvalidRelationship(String),

    #[error("XML parsing error: {0}")]
    XmlError(String),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Staging directory I/O, with the file and the operation that failed.
    #[error("staging {op} failed for {}: {source}", path.display())]
    Staging {
        path: PathBuf,
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "thumbnails")]
    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Attribute error: {0}")]
    AttrError(String),
}

impl From<quick_xml::events::attributes::AttrError> for OpcError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        OpcError::AttrError(err.to_string())
    }
}

impl From<quick_xml::Error> for OpcError {
    fn from(err: quick_xml::Error) -> Self {
        OpcError::XmlError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OpcError>;
