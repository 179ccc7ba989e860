//! Document properties parts shared by all three formats.
//!
//! `docProps/core.xml` carries Dublin Core metadata, `docProps/app.xml` the producing
//! application. Both are kept as XML parts in the package so unknown children survive a round
//! trip; these types are the typed view over them.

use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::common::xml::{escape_xml, general_ref_text};
use crate::ooxml::config::PackageSettings;
use crate::ooxml::opc::constants::namespace;
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::part::XmlTree;

/// Document core properties (`docProps/core.xml`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreProperties {
    pub title: Option<String>,
    pub subject: Option<String>,
    /// Document creator/author
    pub creator: Option<String>,
    /// Comma-separated
    pub keywords: Option<String>,
    pub description: Option<String>,
    pub last_modified_by: Option<String>,
    pub revision: Option<String>,
    pub category: Option<String>,
    /// e.g. "Draft", "Final"
    pub content_status: Option<String>,
    pub language: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub last_printed: Option<DateTime<Utc>>,
}

impl CoreProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Properties for a freshly created package: created and modified stamped now.
    pub fn stamped_now() -> Self {
        let now = Utc::now();
        Self {
            created: Some(now),
            modified: Some(now),
            ..Self::default()
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    pub fn creator(mut self, creator: &str) -> Self {
        self.creator = Some(creator.to_string());
        self
    }

    pub fn keywords(mut self, keywords: &str) -> Self {
        self.keywords = Some(keywords.to_string());
        self
    }

    pub fn last_modified_by(mut self, name: &str) -> Self {
        self.last_modified_by = Some(name.to_string());
        self
    }

    fn text_slot(&mut self, local_name: &[u8]) -> Option<&mut Option<String>> {
        Some(match local_name {
            b"title" => &mut self.title,
            b"subject" => &mut self.subject,
            b"creator" | b"author" => &mut self.creator,
            b"keywords" => &mut self.keywords,
            b"description" | b"comment" => &mut self.description,
            b"lastModifiedBy" => &mut self.last_modified_by,
            b"revision" => &mut self.revision,
            b"category" => &mut self.category,
            b"contentStatus" => &mut self.content_status,
            b"language" => &mut self.language,
            _ => return None,
        })
    }

    fn date_slot(&mut self, local_name: &[u8]) -> Option<&mut Option<DateTime<Utc>>> {
        Some(match local_name {
            b"created" => &mut self.created,
            b"modified" => &mut self.modified,
            b"lastPrinted" => &mut self.last_printed,
            _ => return None,
        })
    }
}

/// Parse a W3CDTF timestamp. Timestamps without an offset are taken as UTC.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// `(local name, text)` of every element that directly contains text, in document order.
fn leaf_texts(xml: &[u8]) -> Result<Vec<(Vec<u8>, String)>> {
    let mut reader = Reader::from_reader(xml);
    let mut leaves = Vec::new();
    let mut current: Option<(Vec<u8>, String)> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => current = Some((e.local_name().as_ref().to_vec(), String::new())),
            Ok(Event::Text(ref t)) => {
                if let Some((_, text)) = current.as_mut() {
                    text.push_str(&t.decode().map_err(|e| OpcError::XmlError(e.to_string()))?);
                }
            },
            Ok(Event::GeneralRef(ref r)) => {
                if let Some((_, text)) = current.as_mut() {
                    text.push_str(&general_ref_text(r));
                }
            },
            Ok(Event::End(_)) => {
                if let Some(leaf) = current.take() {
                    leaves.push(leaf);
                }
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpcError::XmlError(format!("properties: {}", e))),
            _ => {},
        }
        buf.clear();
    }
    Ok(leaves)
}

impl XmlTree for CoreProperties {
    fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut props = CoreProperties::default();
        for (name, text) in leaf_texts(xml)? {
            if let Some(slot) = props.text_slot(&name) {
                *slot = Some(text);
            } else if let Some(slot) = props.date_slot(&name) {
                *slot = parse_datetime(text.trim());
            }
        }
        Ok(props)
    }

    fn to_xml(&self) -> Result<Vec<u8>> {
        let mut xml = String::with_capacity(1024);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<cp:coreProperties xmlns:cp="{}" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
            namespace::OPC_CORE_PROPERTIES
        ));

        let texts = [
            ("dc:title", &self.title),
            ("dc:subject", &self.subject),
            ("dc:creator", &self.creator),
            ("cp:keywords", &self.keywords),
            ("dc:description", &self.description),
            ("cp:lastModifiedBy", &self.last_modified_by),
            ("cp:revision", &self.revision),
            ("cp:category", &self.category),
            ("cp:contentStatus", &self.content_status),
            ("dc:language", &self.language),
        ];
        for (tag, value) in texts {
            if let Some(value) = value {
                xml.push_str(&format!("<{0}>{1}</{0}>", tag, escape_xml(value)));
            }
        }

        if let Some(printed) = &self.last_printed {
            xml.push_str(&format!("<cp:lastPrinted>{}</cp:lastPrinted>", format_datetime(printed)));
        }
        for (tag, value) in [("dcterms:created", &self.created), ("dcterms:modified", &self.modified)] {
            if let Some(value) = value {
                xml.push_str(&format!(
                    r#"<{0} xsi:type="dcterms:W3CDTF">{1}</{0}>"#,
                    tag,
                    format_datetime(value)
                ));
            }
        }

        xml.push_str("</cp:coreProperties>");
        Ok(xml.into_bytes())
    }
}

/// Extended properties (`docProps/app.xml`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppProperties {
    pub application: Option<String>,
    /// `XX.YYYY`
    pub app_version: Option<String>,
    pub company: Option<String>,
    pub template: Option<String>,
}

impl AppProperties {
    /// Application name and version from the settings a package is created with.
    pub fn from_settings(settings: &PackageSettings) -> Self {
        Self {
            application: Some(settings.application.clone()),
            app_version: Some(settings.app_version.clone()),
            ..Self::default()
        }
    }
}

impl XmlTree for AppProperties {
    fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut props = AppProperties::default();
        for (name, text) in leaf_texts(xml)? {
            let slot = match name.as_slice() {
                b"Application" => &mut props.application,
                b"AppVersion" => &mut props.app_version,
                b"Company" => &mut props.company,
                b"Template" => &mut props.template,
                _ => continue,
            };
            *slot = Some(text);
        }
        Ok(props)
    }

    fn to_xml(&self) -> Result<Vec<u8>> {
        let mut xml = String::with_capacity(512);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<Properties xmlns="{}" xmlns:vt="{}">"#,
            namespace::EXTENDED_PROPERTIES,
            namespace::DOC_PROPS_VTYPES
        ));
        let fields = [
            ("Template", &self.template),
            ("Application", &self.application),
            ("Company", &self.company),
            ("AppVersion", &self.app_version),
        ];
        for (tag, value) in fields {
            if let Some(value) = value {
                xml.push_str(&format!("<{0}>{1}</{0}>", tag, escape_xml(value)));
            }
        }
        xml.push_str("</Properties>");
        Ok(xml.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_core_properties_round_trip() {
        let props = CoreProperties::new()
            .title("Q3 <draft>")
            .creator("R&D")
            .keywords("a, b")
            .last_modified_by("someone");
        let xml = props.to_xml().unwrap();
        let text = std::str::from_utf8(&xml).unwrap();
        assert!(text.contains("<dc:title>Q3 &lt;draft&gt;</dc:title>"));
        assert_eq!(CoreProperties::from_xml(&xml).unwrap(), props);
    }

    #[test]
    fn test_core_properties_dates() {
        let xml = br#"<cp:coreProperties xmlns:cp="urn:cp" xmlns:dcterms="urn:dc" xmlns:xsi="urn:xsi">
            <dcterms:created xsi:type="dcterms:W3CDTF">2023-10-10T14:30:00Z</dcterms:created>
            <dcterms:modified xsi:type="dcterms:W3CDTF">2024-01-02T03:04:05.1234567Z</dcterms:modified>
            <cp:lastPrinted>not a date</cp:lastPrinted>
        </cp:coreProperties>"#;
        let props = CoreProperties::from_xml(xml).unwrap();
        assert_eq!(props.created.unwrap().year(), 2023);
        assert_eq!(props.modified.unwrap().month(), 1);
        assert_eq!(props.last_printed, None);

        let again = CoreProperties::from_xml(&props.to_xml().unwrap()).unwrap();
        assert_eq!(again.created, props.created);
    }

    #[test]
    fn test_app_properties_from_settings() {
        let settings = PackageSettings {
            application: "Report Builder".to_string(),
            app_version: "03.0001".to_string(),
            ..PackageSettings::default()
        };
        let app = AppProperties::from_settings(&settings);
        let parsed = AppProperties::from_xml(&app.to_xml().unwrap()).unwrap();
        assert_eq!(parsed.application.as_deref(), Some("Report Builder"));
        assert_eq!(parsed.app_version.as_deref(), Some("03.0001"));
        assert_eq!(parsed.company, None);
    }
}
