/// Error types for document-level operations.
use thiserror::Error;

use crate::ooxml::opc::validate::ValidationReport;

/// Result type for document-level operations.
pub type Result<T> = std::result::Result<T, OoxmlError>;

/// Error types for document-level operations.
#[derive(Error, Debug)]
pub enum OoxmlError {
    /// OPC package error
    #[error("OPC error: {0}")]
    Opc(#[from] crate::ooxml::opc::error::OpcError),

    /// XML parsing error
    #[error("XML error: {0}")]
    Xml(String),

    /// The main part is not the kind of document the root type expects
    #[error("Invalid content type: expected {expected}, got {got}")]
    InvalidContentType { expected: String, got: String },

    /// Structural problems found by an explicit validation pass
    #[error("{0}")]
    Validation(ValidationReport),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad or unserializable settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<quick_xml::Error> for OoxmlError {
    fn from(err: quick_xml::Error) -> Self {
        OoxmlError::Xml(err.to_string())
    }
}
