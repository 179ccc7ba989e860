//! Closed vocabulary over the part kinds the engine routes.
//!
//! Relationship-type URIs are mapped onto [`PartKind`] once, when a `.rels` part is read.
//! Everything after that dispatches on the enum; URIs the engine does not recognise land in
//! [`PartKind::Unknown`] and are carried through untouched.

use std::borrow::Cow;

use crate::ooxml::opc::constants::{content_type as ct, relationship_ns, relationship_type as rt};

/// Which of the three OOXML vocabularies a package uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocType {
    Document,
    Spreadsheet,
    Presentation,
}

impl DocType {
    /// Top-level directory holding the format's parts.
    pub fn dir(self) -> &'static str {
        match self {
            DocType::Document => "word",
            DocType::Spreadsheet => "xl",
            DocType::Presentation => "ppt",
        }
    }

    /// Canonical part name of the main part.
    pub fn main_partname(self) -> &'static str {
        match self {
            DocType::Document => "/word/document.xml",
            DocType::Spreadsheet => "/xl/workbook.xml",
            DocType::Presentation => "/ppt/presentation.xml",
        }
    }

    pub fn main_content_type(self) -> &'static str {
        match self {
            DocType::Document => ct::WML_DOCUMENT_MAIN,
            DocType::Spreadsheet => ct::SML_SHEET_MAIN,
            DocType::Presentation => ct::PML_PRESENTATION_MAIN,
        }
    }

    /// Content type of the `styles` part, which differs between vocabularies.
    pub fn styles_content_type(self) -> Option<&'static str> {
        match self {
            DocType::Document => Some(ct::WML_STYLES),
            DocType::Spreadsheet => Some(ct::SML_STYLES),
            DocType::Presentation => None,
        }
    }
}

/// Strict vs Transitional conformance class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Conformance {
    #[default]
    Transitional,
    Strict,
}

/// Every relationship kind the engine understands, plus a passthrough variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PartKind {
    CoreProperties,
    ExtendedProperties,
    CustomProperties,
    Thumbnail,
    OfficeDocument,

    Styles,
    Theme,
    Image,
    Hyperlink,

    Numbering,
    Settings,
    WebSettings,
    FontTable,
    Footnotes,
    Endnotes,
    Comments,
    Header,
    Footer,

    Worksheet,
    SharedStrings,

    SlideMaster,
    SlideLayout,
    Slide,
    PresProps,
    ViewProps,
    TableStyles,

    /// Any other relationship type, kept verbatim.
    Unknown(String),
}

// (kind, transitional short name, strict short name)
const SHORT_NAMES: &[(PartKind, &str, &str)] = &[
    (PartKind::ExtendedProperties, "extended-properties", "extendedProperties"),
    (PartKind::CustomProperties, "custom-properties", "customProperties"),
    (PartKind::OfficeDocument, "officeDocument", "officeDocument"),
    (PartKind::Styles, "styles", "styles"),
    (PartKind::Theme, "theme", "theme"),
    (PartKind::Image, "image", "image"),
    (PartKind::Hyperlink, "hyperlink", "hyperlink"),
    (PartKind::Numbering, "numbering", "numbering"),
    (PartKind::Settings, "settings", "settings"),
    (PartKind::WebSettings, "webSettings", "webSettings"),
    (PartKind::FontTable, "fontTable", "fontTable"),
    (PartKind::Footnotes, "footnotes", "footnotes"),
    (PartKind::Endnotes, "endnotes", "endnotes"),
    (PartKind::Comments, "comments", "comments"),
    (PartKind::Header, "header", "header"),
    (PartKind::Footer, "footer", "footer"),
    (PartKind::Worksheet, "worksheet", "worksheet"),
    (PartKind::SharedStrings, "sharedStrings", "sharedStrings"),
    (PartKind::SlideMaster, "slideMaster", "slideMaster"),
    (PartKind::SlideLayout, "slideLayout", "slideLayout"),
    (PartKind::Slide, "slide", "slide"),
    (PartKind::PresProps, "presProps", "presProps"),
    (PartKind::ViewProps, "viewProps", "viewProps"),
    (PartKind::TableStyles, "tableStyles", "tableStyles"),
];

// Some producers emit the core-properties URI under the officeDocument tree.
const CORE_PROPERTIES_ALT: &str =
    "http://schemas.openxmlformats.org/officedocument/2006/relationships/metadata/core-properties";

impl PartKind {
    /// Classify a relationship type URI. Transitional and Strict URIs of the same kind map to
    /// the same variant.
    pub fn from_reltype(reltype: &str) -> PartKind {
        if reltype.eq_ignore_ascii_case(rt::CORE_PROPERTIES)
            || reltype.eq_ignore_ascii_case(CORE_PROPERTIES_ALT)
        {
            return PartKind::CoreProperties;
        }
        if reltype == rt::THUMBNAIL {
            return PartKind::Thumbnail;
        }

        let (short, strict) = if let Some(short) = reltype.strip_prefix(relationship_ns::TRANSITIONAL)
        {
            (short, false)
        } else if let Some(short) = reltype.strip_prefix(relationship_ns::STRICT) {
            (short, true)
        } else {
            return PartKind::Unknown(reltype.to_string());
        };

        SHORT_NAMES
            .iter()
            .find(|(_, transitional, strict_name)| {
                if strict {
                    short == *strict_name
                } else {
                    short == *transitional
                }
            })
            .map(|(kind, _, _)| kind.clone())
            .unwrap_or_else(|| PartKind::Unknown(reltype.to_string()))
    }

    /// The relationship type URI for this kind in the given conformance class.
    pub fn reltype(&self, conformance: Conformance) -> Cow<'_, str> {
        match self {
            PartKind::CoreProperties => Cow::Borrowed(rt::CORE_PROPERTIES),
            PartKind::Thumbnail => Cow::Borrowed(rt::THUMBNAIL),
            PartKind::Unknown(uri) => Cow::Borrowed(uri.as_str()),
            kind => {
                let Some((_, transitional, strict)) = SHORT_NAMES.iter().find(|(k, _, _)| k == kind)
                else {
                    return Cow::Borrowed("");
                };
                match conformance {
                    Conformance::Transitional => {
                        Cow::Owned(format!("{}{}", relationship_ns::TRANSITIONAL, transitional))
                    },
                    Conformance::Strict => {
                        Cow::Owned(format!("{}{}", relationship_ns::STRICT, strict))
                    },
                }
            },
        }
    }

    /// Whether a URI uses the Strict officeDocument namespace.
    pub fn is_strict_reltype(reltype: &str) -> bool {
        reltype.starts_with(relationship_ns::STRICT)
    }

    /// Map a content type back onto the kind of part that carries it.
    ///
    /// Any `image/*` type is an [`PartKind::Image`]; the three main-part content types are
    /// [`PartKind::OfficeDocument`].
    pub fn from_content_type(content_type: &str) -> PartKind {
        if content_type
            .get(..6)
            .is_some_and(|p| p.eq_ignore_ascii_case("image/"))
        {
            return PartKind::Image;
        }
        match content_type {
            ct::OPC_CORE_PROPERTIES => PartKind::CoreProperties,
            ct::OFC_EXTENDED_PROPERTIES => PartKind::ExtendedProperties,
            ct::OFC_CUSTOM_PROPERTIES => PartKind::CustomProperties,
            ct::OFC_THEME => PartKind::Theme,
            ct::WML_DOCUMENT_MAIN | ct::SML_SHEET_MAIN | ct::PML_PRESENTATION_MAIN => {
                PartKind::OfficeDocument
            },
            ct::WML_STYLES | ct::SML_STYLES => PartKind::Styles,
            ct::WML_NUMBERING => PartKind::Numbering,
            ct::WML_SETTINGS => PartKind::Settings,
            ct::WML_WEB_SETTINGS => PartKind::WebSettings,
            ct::WML_FONT_TABLE => PartKind::FontTable,
            ct::WML_FOOTNOTES => PartKind::Footnotes,
            ct::WML_ENDNOTES => PartKind::Endnotes,
            ct::WML_COMMENTS => PartKind::Comments,
            ct::WML_HEADER => PartKind::Header,
            ct::WML_FOOTER => PartKind::Footer,
            ct::SML_WORKSHEET => PartKind::Worksheet,
            ct::SML_SHARED_STRINGS => PartKind::SharedStrings,
            ct::PML_SLIDE_MASTER => PartKind::SlideMaster,
            ct::PML_SLIDE_LAYOUT => PartKind::SlideLayout,
            ct::PML_SLIDE => PartKind::Slide,
            ct::PML_PRES_PROPS => PartKind::PresProps,
            ct::PML_VIEW_PROPS => PartKind::ViewProps,
            ct::PML_TABLE_STYLES => PartKind::TableStyles,
            other => PartKind::Unknown(other.to_string()),
        }
    }

    /// Canonical content type of a part of this kind, where it does not depend on the
    /// document type or on the payload.
    pub fn content_type(&self) -> Option<&'static str> {
        Some(match self {
            PartKind::CoreProperties => ct::OPC_CORE_PROPERTIES,
            PartKind::ExtendedProperties => ct::OFC_EXTENDED_PROPERTIES,
            PartKind::CustomProperties => ct::OFC_CUSTOM_PROPERTIES,
            PartKind::Theme => ct::OFC_THEME,
            PartKind::Numbering => ct::WML_NUMBERING,
            PartKind::Settings => ct::WML_SETTINGS,
            PartKind::WebSettings => ct::WML_WEB_SETTINGS,
            PartKind::FontTable => ct::WML_FONT_TABLE,
            PartKind::Footnotes => ct::WML_FOOTNOTES,
            PartKind::Endnotes => ct::WML_ENDNOTES,
            PartKind::Comments => ct::WML_COMMENTS,
            PartKind::Header => ct::WML_HEADER,
            PartKind::Footer => ct::WML_FOOTER,
            PartKind::Worksheet => ct::SML_WORKSHEET,
            PartKind::SharedStrings => ct::SML_SHARED_STRINGS,
            PartKind::SlideMaster => ct::PML_SLIDE_MASTER,
            PartKind::SlideLayout => ct::PML_SLIDE_LAYOUT,
            PartKind::Slide => ct::PML_SLIDE,
            PartKind::PresProps => ct::PML_PRES_PROPS,
            PartKind::ViewProps => ct::PML_VIEW_PROPS,
            PartKind::TableStyles => ct::PML_TABLE_STYLES,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitional_and_strict_map_to_same_kind() {
        assert_eq!(PartKind::from_reltype(rt::HEADER), PartKind::Header);
        assert_eq!(
            PartKind::from_reltype("http://purl.oclc.org/ooxml/officeDocument/relationships/header"),
            PartKind::Header
        );
        assert_eq!(
            PartKind::from_reltype(
                "http://purl.oclc.org/ooxml/officeDocument/relationships/extendedProperties"
            ),
            PartKind::ExtendedProperties
        );
        assert_eq!(PartKind::from_reltype(CORE_PROPERTIES_ALT), PartKind::CoreProperties);
    }

    #[test]
    fn test_unknown_reltype_is_kept_verbatim() {
        let uri = "http://schemas.microsoft.com/office/2011/relationships/people";
        let kind = PartKind::from_reltype(uri);
        assert_eq!(kind, PartKind::Unknown(uri.to_string()));
        assert_eq!(kind.reltype(Conformance::Strict), uri);
    }

    #[test]
    fn test_reltype_round_trips_in_both_classes() {
        for kind in [PartKind::Footer, PartKind::Worksheet, PartKind::ExtendedProperties] {
            for conformance in [Conformance::Transitional, Conformance::Strict] {
                let uri = kind.reltype(conformance);
                assert_eq!(PartKind::from_reltype(&uri), kind);
            }
        }
        assert_eq!(PartKind::Styles.reltype(Conformance::Transitional), rt::STYLES);
    }

    #[test]
    fn test_from_content_type() {
        assert_eq!(PartKind::from_content_type("image/png"), PartKind::Image);
        assert_eq!(PartKind::from_content_type(ct::SML_STYLES), PartKind::Styles);
        assert_eq!(
            PartKind::from_content_type(ct::PML_PRESENTATION_MAIN),
            PartKind::OfficeDocument
        );
        assert!(matches!(
            PartKind::from_content_type("application/x-unknown"),
            PartKind::Unknown(_)
        ));
    }
}
