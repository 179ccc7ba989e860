//! Types shared by the Word, Excel and PowerPoint roots.

pub mod image;
pub mod properties;
pub mod theme;

pub use image::ImageFormat;
pub use properties::{AppProperties, CoreProperties};
pub use theme::{ColorScheme, Theme};
