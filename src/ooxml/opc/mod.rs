/// Open Packaging Conventions (OPC) engine.
///
/// This module maps a ZIP archive onto the parts and relationship graph of an OOXML package
/// and writes that graph back out. It includes:
///
/// - Relationship tables with `rIdN` allocation (`rel`)
/// - The `[Content_Types].xml` registry (`content_types`)
/// - Deterministic part naming (`naming`)
/// - The fixed-point decode pass driven by relationship files (`decode`, `pkgreader`)
/// - Ordered serialization (`pkgwriter`, `marshal`)
/// - On-disk staging of members the model does not understand (`staging`)
///
/// # Performance Features
///
/// - Uses `memchr` for fast string searching in XML
/// - Uses `atoi_simd` for fast integer parsing
/// - Uses `fixedbitset` to track used relationship numbers and consumed archive members
/// - Uses `quick-xml` for streaming XML parsing
pub mod constants;
pub mod content_types;
pub mod decode;
pub mod error;
pub mod kind;
pub mod marshal;
pub mod naming;
pub mod package;
pub mod packuri;
pub mod part;
pub mod phys_pkg;
pub mod pkgreader;
pub mod pkgwriter;
pub mod rel;
pub mod staging;
pub mod validate;

// Re-export commonly used types
pub use content_types::ContentTypes;
pub use error::{OpcError, Result};
pub use kind::{Conformance, DocType, PartKind};
pub use package::OpcPackage;
pub use packuri::PackURI;
pub use part::{ExtraFile, ImagePart, Thumbnail, XmlPart, XmlTree};
pub use rel::{Relationship, Relationships};
pub use validate::{ValidationIssue, ValidationReport};
