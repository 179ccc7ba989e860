//! The `PackURI` value type: a part name inside a package.
//!
//! Part names always begin with a forward slash and use forward slashes as separators.
//! The zip member name of a part is its pack URI without the leading slash.

use crate::ooxml::opc::error::{OpcError, Result};

/// The package pseudo-partname, representing the package itself
pub const PACKAGE_URI: &str = "/";

/// The URI for the [Content_Types].xml part
pub const CONTENT_TYPES_URI: &str = "/[Content_Types].xml";

/// An absolute part name such as `/word/document.xml`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackURI {
    uri: String,
}

impl PackURI {
    /// Create a new PackURI. The string must begin with a forward slash.
    pub fn new<S: Into<String>>(uri: S) -> Result<Self> {
        let uri = uri.into();
        if !uri.starts_with('/') {
            return Err(OpcError::InvalidPackUri(format!(
                "PackURI must begin with slash, got '{}'",
                uri
            )));
        }
        Ok(PackURI { uri })
    }

    /// The pack URI of a zip member name (`word/document.xml` -> `/word/document.xml`).
    pub fn from_member(member: &str) -> Self {
        let normalized = normalize_path(&format!("/{}", member.trim_start_matches('/')));
        PackURI { uri: normalized }
    }

    /// Resolve a relationship target against the directory of its source part.
    ///
    /// Targets that already start with `/` are absolute and ignore `base_uri`;
    /// `..` and `.` segments are collapsed.
    ///
    /// ```
    /// use kumquat::ooxml::opc::PackURI;
    /// let uri = PackURI::from_rel_ref("/ppt/slides", "../slideLayouts/slideLayout1.xml").unwrap();
    /// assert_eq!(uri.as_str(), "/ppt/slideLayouts/slideLayout1.xml");
    /// ```
    pub fn from_rel_ref(base_uri: &str, relative_ref: &str) -> Result<Self> {
        if relative_ref.is_empty() {
            return Err(OpcError::InvalidPackUri(format!(
                "empty relationship target from '{}'",
                base_uri
            )));
        }
        let joined = if relative_ref.starts_with('/') {
            relative_ref.to_string()
        } else if base_uri.ends_with('/') {
            format!("{}{}", base_uri, relative_ref)
        } else {
            format!("{}/{}", base_uri, relative_ref)
        };
        Self::new(normalize_path(&joined))
    }

    /// The directory portion, e.g. `/ppt/slides` for `/ppt/slides/slide1.xml`.
    /// The package pseudo-partname `/` returns `/`.
    pub fn base_uri(&self) -> &str {
        match self.uri.rfind('/') {
            Some(0) | None => "/",
            Some(pos) => &self.uri[..pos],
        }
    }

    /// The final path segment; empty for `/`.
    pub fn filename(&self) -> &str {
        match self.uri.rfind('/') {
            Some(pos) => &self.uri[pos + 1..],
            None => "",
        }
    }

    /// The extension without its period (`xml` for `/word/document.xml`).
    pub fn ext(&self) -> &str {
        let filename = self.filename();
        match filename.rfind('.') {
            Some(pos) => &filename[pos + 1..],
            None => "",
        }
    }

    /// The trailing number of a tuple partname, e.g. 21 for `/ppt/slides/slide21.xml`.
    /// Singleton partnames like `/ppt/presentation.xml` return `None`.
    pub fn idx(&self) -> Option<u32> {
        let filename = self.filename();
        let stem = match filename.rfind('.') {
            Some(pos) => &filename[..pos],
            None => filename,
        };
        let digits = stem.bytes().rev().take_while(u8::is_ascii_digit).count();
        if digits == 0 || digits == stem.len() {
            return None;
        }
        atoi_simd::parse::<u32>(&stem.as_bytes()[stem.len() - digits..]).ok()
    }

    /// The zip member name (leading slash stripped); empty for `/`.
    pub fn membername(&self) -> &str {
        &self.uri[1..]
    }

    /// Express this part relative to a source directory.
    ///
    /// ```
    /// use kumquat::ooxml::opc::PackURI;
    /// let layout = PackURI::new("/ppt/slideLayouts/slideLayout1.xml").unwrap();
    /// assert_eq!(layout.relative_ref("/ppt/slides"), "../slideLayouts/slideLayout1.xml");
    /// assert_eq!(layout.relative_ref("/"), "ppt/slideLayouts/slideLayout1.xml");
    /// ```
    pub fn relative_ref(&self, base_uri: &str) -> String {
        if base_uri == "/" {
            return self.membername().to_string();
        }

        let from: Vec<&str> = base_uri.split('/').filter(|s| !s.is_empty()).collect();
        let to: Vec<&str> = self.uri.split('/').filter(|s| !s.is_empty()).collect();
        let common = from
            .iter()
            .zip(to.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let mut result = String::with_capacity(self.uri.len());
        for _ in common..from.len() {
            result.push_str("../");
        }
        result.push_str(&to[common..].join("/"));
        result
    }

    /// The `.rels` part holding this part's relationships,
    /// e.g. `/word/_rels/document.xml.rels` for `/word/document.xml`.
    pub fn rels_uri(&self) -> PackURI {
        let base_uri = self.base_uri();
        let uri = if base_uri == "/" {
            format!("/_rels/{}.rels", self.filename())
        } else {
            format!("{}/_rels/{}.rels", base_uri, self.filename())
        };
        PackURI { uri }
    }

    /// The inverse of [`rels_uri`](Self::rels_uri): the part a `.rels` part belongs to.
    /// `/_rels/.rels` maps to the package itself.
    pub fn rels_source(&self) -> Option<PackURI> {
        let filename = self.filename().strip_suffix(".rels")?;
        let dir = self.base_uri();
        let parent = dir.strip_suffix("/_rels")?;
        Some(PackURI {
            uri: format!("{}/{}", parent, filename),
        })
    }

    /// Part names compare case-insensitively.
    pub fn eq_ignore_case(&self, other: &str) -> bool {
        self.uri.eq_ignore_ascii_case(other)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.uri
    }
}

fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {},
            ".." => {
                parts.pop();
            },
            _ => parts.push(part),
        }
    }
    format!("/{}", parts.join("/"))
}

impl std::fmt::Display for PackURI {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.uri)
    }
}

impl AsRef<str> for PackURI {
    fn as_ref(&self) -> &str {
        &self.uri
    }
}
