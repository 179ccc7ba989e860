//! Office Open XML (OOXML) packages.
//!
//! # Architecture
//!
//! 1. **OPC layer** (`opc`): archive access, part names, content types, relationship tables,
//!    the decode pass and the ordered writer
//! 2. **Shared parts** (`common`, `custom_properties`): document properties, themes, images
//! 3. **Roots**: `docx::Document`, `xlsx::Workbook`, `pptx::Presentation`, each owning its
//!    main part and the parts hanging off it
//!
//! # Example
//!
//! ```rust,no_run
//! use kumquat::ooxml::pptx::Presentation;
//!
//! let mut pres = Presentation::new()?;
//! pres.add_slide()?;
//! let bytes = pres.to_bytes()?;
//! let again = Presentation::read(&bytes)?;
//! assert_eq!(again.slides().len(), 1);
//! # Ok::<(), kumquat::ooxml::OoxmlError>(())
//! ```
pub mod common;
pub mod config;
pub mod custom_properties;
pub mod docx;
pub mod error;
pub mod opc;
pub mod pptx;
pub mod xlsx;

mod root;

// Re-export commonly used types from OPC layer
pub use opc::{OpcPackage, PackURI, XmlPart};

pub use common::{AppProperties, CoreProperties, Theme};
pub use config::{PackageConfig, PackageSettings, SavePolicy};
pub use custom_properties::{CustomProperties, PropertyValue};
pub use error::{OoxmlError, Result};
