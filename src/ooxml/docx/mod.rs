//! Word (.docx) packages.
//!
//! [`Document`] owns `word/document.xml` and the parts it relates to: styles, numbering,
//! settings, web settings, font table, footnotes, endnotes, and any number of headers and
//! footers. Part XML is kept as read; the document maintains the relationships and
//! content-type registrations around it.
//!
//! # Example
//!
//! ```rust,no_run
//! use kumquat::ooxml::docx::Document;
//!
//! let mut doc = Document::new()?;
//! doc.add_header()?;
//! doc.add_footer()?;
//! doc.save_to_file("out.docx")?;
//! # Ok::<(), kumquat::ooxml::OoxmlError>(())
//! ```
mod document;
mod watermark;

pub use document::Document;
pub use watermark::Watermark;
