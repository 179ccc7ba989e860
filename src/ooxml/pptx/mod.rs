//! PowerPoint (.pptx) packages.
//!
//! [`Presentation`] owns `ppt/presentation.xml`, its slide masters, slide layouts and slides,
//! and the presentation-level property parts.
mod presentation;
mod template;

pub use presentation::Presentation;
