//! OOXML marshal conventions applied to part XML on save.

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::ooxml::opc::error::{OpcError, Result};

/// Re-serialize an XML document, turning every `<a ...></a>` with no content into `<a .../>`.
///
/// Everything else (text, whitespace, comments, processing instructions, CDATA, the
/// declaration) passes through unchanged.
///
/// ```
/// use kumquat::ooxml::opc::marshal::collapse_empty_elements;
/// let out = collapse_empty_elements(br#"<w:p><w:pPr></w:pPr><w:r> </w:r></w:p>"#).unwrap();
/// assert_eq!(out, br#"<w:p><w:pPr/><w:r> </w:r></w:p>"#);
/// ```
pub fn collapse_empty_elements(xml: &[u8]) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut buf = Vec::new();
    let mut pending: Option<BytesStart<'static>> = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| OpcError::XmlError(format!("marshal: {}", e)))?;

        if let Some(start) = pending.take() {
            let collapsed = matches!(event, Event::End(_));
            let held = if collapsed {
                Event::Empty(start)
            } else {
                Event::Start(start)
            };
            writer
                .write_event(held)
                .map_err(|e| OpcError::XmlError(e.to_string()))?;
            if collapsed {
                drop(event);
                buf.clear();
                continue;
            }
        }

        match event {
            Event::Eof => break,
            Event::Start(e) => pending = Some(e.into_owned()),
            other => writer
                .write_event(other)
                .map_err(|e| OpcError::XmlError(e.to_string()))?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_declaration_and_text() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<root a="1 &amp; 2"><empty x="y"></empty><t>R&amp;D</t><!-- c --></root>"#;
        let out = collapse_empty_elements(xml).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#));
        assert!(out.contains(r#"<empty x="y"/>"#));
        assert!(out.contains("<t>R&amp;D</t>"));
        assert!(out.contains("<!-- c -->"));
        assert!(out.contains(r#"a="1 &amp; 2""#));
    }

    #[test]
    fn test_nested_empty_elements() {
        let out = collapse_empty_elements(b"<a><b></b><c><d></d></c></a>").unwrap();
        assert_eq!(out, b"<a><b/><c><d/></c></a>");
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(collapse_empty_elements(b"<a><b></a>").is_err());
    }
}
