//! Excel (.xlsx) packages.
//!
//! [`Workbook`] owns `xl/workbook.xml`, the stylesheet, the shared string table and the
//! worksheets. Cell content is left to the caller; the workbook keeps the package around it
//! consistent.
//!
//! ```rust,no_run
//! use kumquat::ooxml::xlsx::Workbook;
//!
//! let mut workbook = Workbook::open("book.xlsx")?;
//! workbook.add_sheet("Summary")?;
//! workbook.save_to_file("book-out.xlsx")?;
//! # Ok::<(), kumquat::ooxml::OoxmlError>(())
//! ```
mod workbook;

pub use workbook::Workbook;
