//! The content-type registry stored as `[Content_Types].xml`.
//!
//! `Default` entries map an extension to a content type, `Override` entries map one exact
//! part name. Overrides win over defaults when resolving a part. Both lists keep insertion
//! order so that a read-then-write cycle reproduces the original ordering.

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::warn;

use crate::common::xml::escape_xml;
use crate::ooxml::opc::constants::{content_type as ct, namespace};
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::kind::DocType;
use crate::ooxml::opc::packuri::PackURI;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultEntry {
    pub extension: String,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideEntry {
    /// Always begins with `/`.
    pub part_name: String,
    pub content_type: String,
}

/// Ordered `Default` and `Override` registrations.
#[derive(Debug, Clone, Default)]
pub struct ContentTypes {
    defaults: Vec<DefaultEntry>,
    overrides: Vec<OverrideEntry>,
}

fn normalize_ext(ext: &str) -> &str {
    ext.trim_start_matches('.')
}

fn normalize_part_name(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

// content types are MIME types; relationship types are the URIs
fn check_content_type(content_type: &str, target: &str) {
    if content_type.starts_with("http") {
        warn!(
            target,
            content_type, "content type looks like a relationship type URI"
        );
    }
}

impl ContentTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry for a freshly created package: `rels`/`xml` defaults plus the main part.
    pub fn for_new(doc_type: DocType) -> Self {
        let mut cts = Self::new();
        cts.add_default("rels", ct::OPC_RELATIONSHIPS);
        cts.add_default("xml", ct::XML);
        cts.add_override(doc_type.main_partname(), doc_type.main_content_type());
        cts
    }

    /// Parse `[Content_Types].xml`.
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut cts = Self::new();
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if matches!(e.local_name().as_ref(), b"Default" | b"Override") =>
                {
                    let is_default = e.local_name().as_ref() == b"Default";

                    let mut key = None;
                    let mut content_type = None;
                    for attr in e.attributes() {
                        let attr = attr?;
                        match attr.key.as_ref() {
                            b"Extension" | b"PartName" => {
                                key = Some(attr.unescape_value()?.into_owned())
                            },
                            b"ContentType" => {
                                content_type = Some(attr.unescape_value()?.into_owned())
                            },
                            _ => {},
                        }
                    }

                    match (key, content_type) {
                        (Some(key), Some(value)) if is_default => cts.add_default(&key, &value),
                        (Some(key), Some(value)) => cts.add_override(&key, &value),
                        _ => warn!("skipping incomplete content type entry"),
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(OpcError::XmlError(format!(
                        "Content types parse error: {}",
                        e
                    )));
                },
                _ => {},
            }
            buf.clear();
        }

        Ok(cts)
    }

    /// Serialize: all defaults, then all overrides, each in registration order.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(
            128 + self.defaults.len() * 96 + self.overrides.len() * 160,
        );
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(&format!(r#"<Types xmlns="{}">"#, namespace::OPC_CONTENT_TYPES));

        for entry in &self.defaults {
            xml.push_str(&format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                escape_xml(&entry.extension),
                escape_xml(&entry.content_type)
            ));
        }
        for entry in &self.overrides {
            xml.push_str(&format!(
                r#"<Override PartName="{}" ContentType="{}"/>"#,
                escape_xml(&entry.part_name),
                escape_xml(&entry.content_type)
            ));
        }

        xml.push_str("</Types>");
        xml
    }

    /// Append a default. Use when the extension is known not to be registered yet.
    pub fn add_default(&mut self, ext: &str, content_type: &str) {
        check_content_type(content_type, ext);
        self.defaults.push(DefaultEntry {
            extension: normalize_ext(ext).to_string(),
            content_type: content_type.to_string(),
        });
    }

    /// Append an override, prefixing the path with `/` when needed.
    pub fn add_override(&mut self, path: &str, content_type: &str) {
        check_content_type(content_type, path);
        self.overrides.push(OverrideEntry {
            part_name: normalize_part_name(path),
            content_type: content_type.to_string(),
        });
    }

    /// Insert or update the default for an extension.
    pub fn ensure_default(&mut self, ext: &str, content_type: &str) {
        let ext = normalize_ext(ext);
        match self
            .defaults
            .iter_mut()
            .find(|entry| entry.extension.eq_ignore_ascii_case(ext))
        {
            Some(entry) => {
                check_content_type(content_type, ext);
                entry.content_type = content_type.to_string();
            },
            None => self.add_default(ext, content_type),
        }
    }

    /// Insert or update the override for a part.
    pub fn ensure_override(&mut self, path: &str, content_type: &str) {
        let part_name = normalize_part_name(path);
        match self
            .overrides
            .iter_mut()
            .find(|entry| entry.part_name.eq_ignore_ascii_case(&part_name))
        {
            Some(entry) => {
                check_content_type(content_type, &part_name);
                entry.content_type = content_type.to_string();
            },
            None => self.add_override(&part_name, content_type),
        }
    }

    /// Remove the override for a part. Returns whether one existed.
    pub fn remove_override(&mut self, path: &str) -> bool {
        let part_name = normalize_part_name(path);
        match self
            .overrides
            .iter()
            .position(|entry| entry.part_name.eq_ignore_ascii_case(&part_name))
        {
            Some(pos) => {
                self.overrides.remove(pos);
                true
            },
            None => false,
        }
    }

    /// Content type of a part: exact override first, then the extension default.
    pub fn resolve(&self, partname: &PackURI) -> Option<&str> {
        if let Some(entry) = self
            .overrides
            .iter()
            .find(|entry| partname.eq_ignore_case(&entry.part_name))
        {
            return Some(&entry.content_type);
        }
        let ext = partname.ext();
        self.defaults
            .iter()
            .find(|entry| entry.extension.eq_ignore_ascii_case(ext))
            .map(|entry| entry.content_type.as_str())
    }

    pub fn has_override(&self, path: &str) -> bool {
        let part_name = normalize_part_name(path);
        self.overrides
            .iter()
            .any(|entry| entry.part_name.eq_ignore_ascii_case(&part_name))
    }

    pub fn has_default(&self, ext: &str) -> bool {
        let ext = normalize_ext(ext);
        self.defaults
            .iter()
            .any(|entry| entry.extension.eq_ignore_ascii_case(ext))
    }

    pub fn defaults(&self) -> &[DefaultEntry] {
        &self.defaults
    }

    pub fn overrides(&self) -> &[OverrideEntry] {
        &self.overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins_over_default() {
        let mut cts = ContentTypes::new();
        cts.add_default("png", "image/png");
        cts.add_override("/media/image1.png", "image/x-custom");

        let image1 = PackURI::new("/media/image1.png").unwrap();
        let image2 = PackURI::new("/media/image2.PNG").unwrap();
        assert_eq!(cts.resolve(&image1), Some("image/x-custom"));
        assert_eq!(cts.resolve(&image2), Some("image/png"));
        assert_eq!(cts.resolve(&PackURI::new("/a.bin").unwrap()), None);
    }

    #[test]
    fn test_ensure_override_is_idempotent() {
        let mut cts = ContentTypes::new();
        cts.ensure_override("word/header1.xml", "t1");
        cts.ensure_override("/word/header1.xml", "t2");

        let matching: Vec<_> = cts
            .overrides()
            .iter()
            .filter(|o| o.part_name == "/word/header1.xml")
            .collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].content_type, "t2");
    }

    #[test]
    fn test_add_is_append_only() {
        let mut cts = ContentTypes::new();
        cts.add_default("png", "image/png");
        cts.add_default("png", "image/png");
        assert_eq!(cts.defaults().len(), 2);

        cts.ensure_default(".jpeg", "image/jpeg");
        cts.ensure_default("jpeg", "image/jpeg");
        assert_eq!(cts.defaults().len(), 3);
    }

    #[test]
    fn test_remove_override() {
        let mut cts = ContentTypes::for_new(DocType::Document);
        assert!(cts.has_override("/word/document.xml"));
        assert!(cts.remove_override("word/document.xml"));
        assert!(!cts.remove_override("/word/document.xml"));
        assert!(!cts.has_override("/word/document.xml"));
    }

    #[test]
    fn test_http_content_type_is_accepted() {
        let mut cts = ContentTypes::new();
        cts.add_override(
            "/word/styles.xml",
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles",
        );
        assert_eq!(cts.overrides().len(), 1);
    }

    #[test]
    fn test_xml_round_trip_preserves_order() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="xml" ContentType="application/xml"/>
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
  <Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>
</Types>"#;
        let cts = ContentTypes::from_xml(xml).unwrap();
        let again = ContentTypes::from_xml(cts.to_xml().as_bytes()).unwrap();
        assert_eq!(again.defaults(), cts.defaults());
        assert_eq!(again.overrides(), cts.overrides());
        assert_eq!(cts.defaults()[0].extension, "xml");
        assert_eq!(cts.overrides()[1].part_name, "/docProps/core.xml");
    }
}
