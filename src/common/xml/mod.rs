//! XML text helpers shared by every part writer.

mod escape;

pub use escape::{escape_xml, unescape_xml};

use quick_xml::events::BytesRef;

/// Text an entity or character reference event stands for.
///
/// Character references resolve to their character; the five predefined entities to their
/// text. Anything else is returned as the literal `&name;`.
pub fn general_ref_text(reference: &BytesRef<'_>) -> String {
    if let Ok(Some(ch)) = reference.resolve_char_ref() {
        return ch.to_string();
    }
    let name = String::from_utf8_lossy(reference.as_ref());
    unescape_xml(&format!("&{};", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::Reader;
    use quick_xml::events::Event;

    #[test]
    fn test_general_ref_text() {
        let mut reader = Reader::from_str("<t>a&amp;b&#65;&custom;</t>");
        let mut out = String::new();
        loop {
            match reader.read_event().unwrap() {
                Event::Text(t) => out.push_str(&t.decode().unwrap()),
                Event::GeneralRef(r) => out.push_str(&general_ref_text(&r)),
                Event::Eof => break,
                _ => {},
            }
        }
        assert_eq!(out, "a&bA&custom;");
    }
}
