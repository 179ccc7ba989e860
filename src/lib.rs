//! Kumquat - a package engine for Office Open XML documents
//!
//! Kumquat reads and writes the container layer of `.docx`, `.xlsx` and `.pptx` files: the
//! ZIP archive, the `[Content_Types].xml` registry, the relationship graph and the parts it
//! connects. Part XML is kept byte-for-byte; the engine keeps the graph consistent around it.
//!
//! # Features
//!
//! - **Lossless round trips**: parts the object model does not understand are staged on disk
//!   and written back unchanged
//! - **Deterministic naming**: headers, footers, sheets, slides, themes and images are renamed
//!   by discovery order (`header1.xml`, `image3.png`), so output is stable across saves
//! - **Relationship tables** with `rIdN` allocation and kind-aware lookups
//! - **Transitional and Strict** relationship URIs, preserved as read
//! - **Structural validation**: dangling targets, undefined `r:id` references, missing
//!   content types, duplicate bookmarks
//!
//! # Example - Adding a header to a DOCX file
//!
//! ```no_run
//! use kumquat::ooxml::docx::Document;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut doc = Document::open("report.docx")?;
//! let r_id = doc.add_header()?;
//! println!("header related as {}", r_id);
//! for header in doc.headers() {
//!     println!("{} ({} relationships)", header.partname(), header.rels().len());
//! }
//! doc.save_to_file("report-out.docx")?;
//! doc.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Scoped logging
//!
//! ```no_run
//! use kumquat::ooxml::config::PackageConfig;
//! use kumquat::ooxml::xlsx::Workbook;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let subscriber = tracing::subscriber::NoSubscriber::default();
//! let config = PackageConfig::new().with_dispatch(tracing::Dispatch::new(subscriber));
//! let workbook = Workbook::open_with("book.xlsx", config)?;
//! println!("{} worksheets", workbook.worksheets().len());
//! # Ok(())
//! # }
//! ```

/// Helpers shared across formats (XML escaping)
pub mod common;

/// OOXML packages: the OPC engine and the Word, Excel and PowerPoint roots
pub mod ooxml;

pub use ooxml::docx::Document;
pub use ooxml::pptx::Presentation;
pub use ooxml::xlsx::Workbook;
pub use ooxml::{OoxmlError, Result};
