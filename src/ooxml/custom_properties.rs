//! Custom document properties (`docProps/custom.xml`).
//!
//! A custom property is a named, typed value. Property IDs (`pid`) start at 2; an existing
//! name keeps its ID when its value is replaced.
//!
//! ```rust
//! use kumquat::ooxml::custom_properties::{CustomProperties, PropertyValue};
//! use kumquat::ooxml::opc::part::XmlTree;
//!
//! let mut props = CustomProperties::new();
//! props.set("ProjectName", PropertyValue::String("MyProject".to_string()));
//! props.set("Version", PropertyValue::Integer(42));
//! assert_eq!(props.get("Version"), Some(&PropertyValue::Integer(42)));
//!
//! let xml = props.to_xml().unwrap();
//! let again = CustomProperties::from_xml(&xml).unwrap();
//! assert_eq!(again.len(), 2);
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::common::xml::{escape_xml, general_ref_text};
use crate::ooxml::opc::constants::namespace;
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::part::XmlTree;

/// Format ID every custom property carries.
const FORMAT_ID: &str = "{D5CDD505-2E9C-101B-9397-08002B2CF9AE}";

const CUSTOM_PROPERTIES_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/custom-properties";

// 100ns intervals between 1601-01-01 and 1970-01-01
const WINDOWS_EPOCH_OFFSET: i64 = 116_444_736_000_000_000;

const FIRST_PID: i32 = 2;

/// A typed property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// `vt:lpwstr`
    String(String),
    /// `vt:i4`
    Integer(i32),
    /// `vt:i8`
    Long(i64),
    /// `vt:r4`
    Float(f32),
    /// `vt:r8`
    Double(f64),
    /// `vt:bool`
    Boolean(bool),
    /// `vt:filetime`
    DateTime(DateTime<Utc>),
}

impl PropertyValue {
    fn vt_name(&self) -> &'static str {
        match self {
            PropertyValue::String(_) => "lpwstr",
            PropertyValue::Integer(_) => "i4",
            PropertyValue::Long(_) => "i8",
            PropertyValue::Float(_) => "r4",
            PropertyValue::Double(_) => "r8",
            PropertyValue::Boolean(_) => "bool",
            PropertyValue::DateTime(_) => "filetime",
        }
    }

    fn to_text(&self) -> String {
        match self {
            PropertyValue::String(s) => s.clone(),
            PropertyValue::Integer(i) => i.to_string(),
            PropertyValue::Long(l) => l.to_string(),
            PropertyValue::Float(f) => f.to_string(),
            PropertyValue::Double(d) => d.to_string(),
            PropertyValue::Boolean(b) => b.to_string(),
            PropertyValue::DateTime(dt) => {
                let unix_nanos = dt.timestamp_nanos_opt().unwrap_or(0);
                (unix_nanos / 100 + WINDOWS_EPOCH_OFFSET).to_string()
            },
        }
    }

    fn parse(vt_name: &str, text: &str) -> Result<Self> {
        let invalid = |e: &dyn std::fmt::Display| {
            OpcError::XmlError(format!("invalid vt:{} value '{}': {}", vt_name, text, e))
        };
        let text = text.trim_matches(|c: char| c.is_ascii_whitespace() && vt_name != "lpwstr");
        Ok(match vt_name {
            "lpwstr" | "lpstr" | "bstr" => PropertyValue::String(text.to_string()),
            "i4" | "int" => PropertyValue::Integer(text.parse().map_err(|e| invalid(&e))?),
            "i8" => PropertyValue::Long(text.parse().map_err(|e| invalid(&e))?),
            "r4" => PropertyValue::Float(text.parse().map_err(|e| invalid(&e))?),
            "r8" => PropertyValue::Double(text.parse().map_err(|e| invalid(&e))?),
            "bool" => match text.to_ascii_lowercase().as_str() {
                "true" | "1" => PropertyValue::Boolean(true),
                "false" | "0" => PropertyValue::Boolean(false),
                _ => return Err(invalid(&"expected true/false")),
            },
            "filetime" => {
                let filetime: i64 = text.parse().map_err(|e| invalid(&e))?;
                let unix_nanos = (filetime - WINDOWS_EPOCH_OFFSET) * 100;
                DateTime::from_timestamp(
                    unix_nanos.div_euclid(1_000_000_000),
                    unix_nanos.rem_euclid(1_000_000_000) as u32,
                )
                .map(PropertyValue::DateTime)
                .ok_or_else(|| invalid(&"out of range"))?
            },
            other => {
                return Err(OpcError::XmlError(format!(
                    "unsupported custom property type vt:{}",
                    other
                )));
            },
        })
    }
}

#[derive(Debug, Clone)]
struct CustomProperty {
    value: PropertyValue,
    pid: i32,
}

/// The custom properties of a package.
#[derive(Debug, Clone)]
pub struct CustomProperties {
    properties: HashMap<String, CustomProperty>,
    next_pid: i32,
}

impl Default for CustomProperties {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomProperties {
    pub fn new() -> Self {
        Self {
            properties: HashMap::new(),
            next_pid: FIRST_PID,
        }
    }

    /// Insert or replace a property, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: PropertyValue) -> Option<PropertyValue> {
        let name = name.into();
        let pid = match self.properties.get(&name) {
            Some(existing) => existing.pid,
            None => {
                let pid = self.next_pid;
                self.next_pid += 1;
                pid
            },
        };
        self.properties
            .insert(name, CustomProperty { value, pid })
            .map(|p| p.value)
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name).map(|p| &p.value)
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        self.properties.remove(name).map(|p| p.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Properties in `pid` order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        let mut sorted: Vec<_> = self.properties.iter().collect();
        sorted.sort_by_key(|(_, p)| p.pid);
        sorted
            .into_iter()
            .map(|(name, prop)| (name.as_str(), &prop.value))
    }
}

impl XmlTree for CustomProperties {
    fn to_xml(&self) -> Result<Vec<u8>> {
        let mut xml = String::with_capacity(256 + self.properties.len() * 160);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<Properties xmlns="{}" xmlns:vt="{}">"#,
            CUSTOM_PROPERTIES_NS,
            namespace::DOC_PROPS_VTYPES
        ));

        let mut sorted: Vec<_> = self.properties.iter().collect();
        sorted.sort_by_key(|(_, p)| p.pid);
        for (name, prop) in sorted {
            let vt = prop.value.vt_name();
            xml.push_str(&format!(
                r#"<property fmtid="{}" pid="{}" name="{}"><vt:{vt}>{}</vt:{vt}></property>"#,
                FORMAT_ID,
                prop.pid,
                escape_xml(name),
                escape_xml(&prop.value.to_text()),
                vt = vt
            ));
        }

        xml.push_str("</Properties>");
        Ok(xml.into_bytes())
    }

    fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        let mut props = CustomProperties::new();
        let mut max_pid = FIRST_PID - 1;

        // (name, pid) of the open <property>, then (vt name, text) of its value
        let mut property: Option<(String, i32)> = None;
        let mut value: Option<(String, String)> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"property" => {
                    let mut name = None;
                    let mut pid = None;
                    for attr in e.attributes() {
                        let attr = attr?;
                        match attr.key.as_ref() {
                            b"name" => name = Some(attr.unescape_value()?.into_owned()),
                            b"pid" => pid = attr.unescape_value()?.trim().parse::<i32>().ok(),
                            _ => {},
                        }
                    }
                    property = name.zip(pid);
                },
                Ok(Event::Start(ref e)) if property.is_some() => {
                    let vt = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    value = Some((vt, String::new()));
                },
                Ok(Event::Text(ref t)) => {
                    if let Some((_, text)) = value.as_mut() {
                        text.push_str(&t.decode().map_err(|e| OpcError::XmlError(e.to_string()))?);
                    }
                },
                Ok(Event::GeneralRef(ref r)) => {
                    if let Some((_, text)) = value.as_mut() {
                        text.push_str(&general_ref_text(r));
                    }
                },
                Ok(Event::End(ref e)) if e.local_name().as_ref() == b"property" => {
                    if let (Some((name, pid)), Some((vt, text))) = (property.take(), value.take()) {
                        let value = PropertyValue::parse(&vt, &text)?;
                        max_pid = max_pid.max(pid);
                        props.properties.insert(name, CustomProperty { value, pid });
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(OpcError::XmlError(format!("custom properties: {}", e))),
                _ => {},
            }
            buf.clear();
        }

        props.next_pid = max_pid + 1;
        Ok(props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_allocation_and_replace() {
        let mut props = CustomProperties::new();
        assert!(props.set("A", PropertyValue::Integer(1)).is_none());
        props.set("B", PropertyValue::Boolean(true));
        assert_eq!(props.set("A", PropertyValue::Integer(2)), Some(PropertyValue::Integer(1)));

        let xml = String::from_utf8(props.to_xml().unwrap()).unwrap();
        assert!(xml.contains(r#"pid="2" name="A"><vt:i4>2</vt:i4>"#));
        assert!(xml.contains(r#"pid="3" name="B"><vt:bool>true</vt:bool>"#));
    }

    #[test]
    fn test_parse_continues_pid_sequence() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/custom-properties" xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes">
  <property fmtid="{D5CDD505-2E9C-101B-9397-08002B2CF9AE}" pid="5" name="Client">
    <vt:lpwstr>Smith &amp; Sons</vt:lpwstr>
  </property>
  <property fmtid="{D5CDD505-2E9C-101B-9397-08002B2CF9AE}" pid="2" name="Budget">
    <vt:r8>12345.5</vt:r8>
  </property>
</Properties>"#;
        let mut props = CustomProperties::from_xml(xml).unwrap();
        assert_eq!(props.get("Client"), Some(&PropertyValue::String("Smith & Sons".to_string())));
        assert_eq!(props.get("Budget"), Some(&PropertyValue::Double(12345.5)));

        props.set("New", PropertyValue::Long(7));
        let names: Vec<_> = props.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["Budget", "Client", "New"]);
    }

    #[test]
    fn test_filetime_round_trip() {
        let when = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let mut props = CustomProperties::new();
        props.set("Reviewed", PropertyValue::DateTime(when));
        let again = CustomProperties::from_xml(&props.to_xml().unwrap()).unwrap();
        assert_eq!(again.get("Reviewed"), Some(&PropertyValue::DateTime(when)));
    }

    #[test]
    fn test_bad_value_is_an_error() {
        let xml = br#"<Properties xmlns:vt="urn:vt"><property pid="2" name="X"><vt:i4>twelve</vt:i4></property></Properties>"#;
        assert!(CustomProperties::from_xml(xml).is_err());
    }
}
