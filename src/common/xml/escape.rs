//! Entity escaping for text and attribute values written into package XML.

use aho_corasick::{AhoCorasick, MatchKind};
use once_cell::sync::Lazy;

const SPECIAL: [&str; 5] = ["&", "<", ">", "\"", "'"];
const ENTITIES: [&str; 5] = ["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"];

static ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(SPECIAL)
        .expect("static escape patterns are valid")
});

// LeftmostLongest so "&amp;lt;" decodes to "&lt;" rather than "<"
static UNESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(ENTITIES)
        .expect("static entity patterns are valid")
});

/// Escape the five predefined XML entities.
///
/// ```
/// use kumquat::common::xml::escape_xml;
/// assert_eq!(escape_xml("Tom & \"Jerry\""), "Tom &amp; &quot;Jerry&quot;");
/// ```
#[inline]
pub fn escape_xml(s: &str) -> String {
    ESCAPER.replace_all(s, &ENTITIES)
}

/// Reverse [`escape_xml`]. Unknown or incomplete entities are left untouched.
///
/// ```
/// use kumquat::common::xml::unescape_xml;
/// assert_eq!(unescape_xml("&lt;w:t&gt;"), "<w:t>");
/// assert_eq!(unescape_xml("&nbsp;"), "&nbsp;");
/// ```
#[inline]
pub fn unescape_xml(s: &str) -> String {
    UNESCAPER.replace_all(s, &SPECIAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_round_trips_through_unescape() {
        let raw = r#"<a href="x">Q&A 'quoted'</a>"#;
        let escaped = escape_xml(raw);
        assert!(!escaped.contains('<'));
        assert_eq!(unescape_xml(&escaped), raw);
    }

    #[test]
    fn test_unescape_does_not_double_decode() {
        assert_eq!(unescape_xml("&amp;lt;"), "&lt;");
    }
}
