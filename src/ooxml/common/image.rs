//! Image formats that can be stored as media parts.

use crate::ooxml::opc::constants::content_type as ct;

/// Image format detection and properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
    Emf,
    Wmf,
}

impl ImageFormat {
    /// Detect image format from byte signature.
    pub fn detect_from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }

        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }
        if data.starts_with(b"BM") {
            return Some(Self::Bmp);
        }
        // little-endian and big-endian TIFF
        if data.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A])
        {
            return Some(Self::Tiff);
        }
        // " EMF" record signature at offset 40
        if data.len() >= 44 && data[40..44] == [0x20, 0x45, 0x4D, 0x46] {
            return Some(Self::Emf);
        }
        // placeable or standard WMF header
        if data[0..4] == [0xD7, 0xCD, 0xC6, 0x9A] || data[0..4] == [0x01, 0x00, 0x09, 0x00] {
            return Some(Self::Wmf);
        }

        None
    }

    /// Map a file extension (case-insensitive, with or without the period).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.');
        [
            ("png", Self::Png),
            ("jpeg", Self::Jpeg),
            ("jpg", Self::Jpeg),
            ("jpe", Self::Jpeg),
            ("gif", Self::Gif),
            ("bmp", Self::Bmp),
            ("tif", Self::Tiff),
            ("tiff", Self::Tiff),
            ("emf", Self::Emf),
            ("wmf", Self::Wmf),
        ]
        .into_iter()
        .find(|(name, _)| ext.eq_ignore_ascii_case(name))
        .map(|(_, format)| format)
    }

    /// Map a content type. `image/jpg` and `image/pjpeg` are accepted as JPEG.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type.to_ascii_lowercase().as_str() {
            ct::PNG => Some(Self::Png),
            ct::JPEG | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            ct::GIF => Some(Self::Gif),
            ct::BMP => Some(Self::Bmp),
            ct::TIFF => Some(Self::Tiff),
            ct::X_EMF | "image/emf" => Some(Self::Emf),
            ct::X_WMF | "image/wmf" => Some(Self::Wmf),
            _ => None,
        }
    }

    /// Lowercase file extension used when naming media parts.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::Emf => "emf",
            Self::Wmf => "wmf",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => ct::PNG,
            Self::Jpeg => ct::JPEG,
            Self::Gif => ct::GIF,
            Self::Bmp => ct::BMP,
            Self::Tiff => ct::TIFF,
            Self::Emf => ct::X_EMF,
            Self::Wmf => ct::X_WMF,
        }
    }
}
