//! Deterministic part naming.
//!
//! A part's file name is a pure function of the document type, its content type and its
//! 1-based creation index. The same function is used when a part is first created and when
//! its name is re-derived after a read, so relationship targets stay stable across round
//! trips.

use crate::ooxml::common::ImageFormat;
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::kind::{DocType, PartKind};
use crate::ooxml::opc::packuri::PackURI;

/// Package-relative file name (no leading slash) of the `index`-th part of `content_type`.
///
/// ```
/// use kumquat::ooxml::opc::constants::content_type as ct;
/// use kumquat::ooxml::opc::kind::DocType;
/// use kumquat::ooxml::opc::naming::absolute_filename;
///
/// assert_eq!(absolute_filename(DocType::Document, ct::WML_HEADER, 7).unwrap(), "word/header7.xml");
/// assert_eq!(
///     absolute_filename(DocType::Spreadsheet, ct::SML_WORKSHEET, 3).unwrap(),
///     "xl/worksheets/sheet3.xml"
/// );
/// assert_eq!(absolute_filename(DocType::Document, "image/png", 12).unwrap(), "word/media/image12.png");
/// ```
pub fn absolute_filename(doc_type: DocType, content_type: &str, index: usize) -> Result<String> {
    let dir = doc_type.dir();
    let kind = PartKind::from_content_type(content_type);
    let name = match kind {
        PartKind::CoreProperties => "docProps/core.xml".to_string(),
        PartKind::ExtendedProperties => "docProps/app.xml".to_string(),
        PartKind::CustomProperties => "docProps/custom.xml".to_string(),
        PartKind::OfficeDocument => doc_type.main_partname()[1..].to_string(),
        PartKind::Styles => format!("{}/styles.xml", dir),
        PartKind::Theme => format!("{}/theme/theme{}.xml", dir, index),
        PartKind::Image => {
            let format = ImageFormat::from_content_type(content_type).ok_or_else(|| {
                OpcError::InvalidPackUri(format!("no file extension for '{}'", content_type))
            })?;
            format!("{}/media/image{}.{}", dir, index, format.extension())
        },

        PartKind::Numbering => "word/numbering.xml".to_string(),
        PartKind::Settings => "word/settings.xml".to_string(),
        PartKind::WebSettings => "word/webSettings.xml".to_string(),
        PartKind::FontTable => "word/fontTable.xml".to_string(),
        PartKind::Footnotes => "word/footnotes.xml".to_string(),
        PartKind::Endnotes => "word/endnotes.xml".to_string(),
        PartKind::Comments => "word/comments.xml".to_string(),
        PartKind::Header => format!("word/header{}.xml", index),
        PartKind::Footer => format!("word/footer{}.xml", index),

        PartKind::Worksheet => format!("xl/worksheets/sheet{}.xml", index),
        PartKind::SharedStrings => "xl/sharedStrings.xml".to_string(),

        PartKind::SlideMaster => format!("ppt/slideMasters/slideMaster{}.xml", index),
        PartKind::SlideLayout => format!("ppt/slideLayouts/slideLayout{}.xml", index),
        PartKind::Slide => format!("ppt/slides/slide{}.xml", index),
        PartKind::PresProps => "ppt/presProps.xml".to_string(),
        PartKind::ViewProps => "ppt/viewProps.xml".to_string(),
        PartKind::TableStyles => "ppt/tableStyles.xml".to_string(),

        PartKind::Thumbnail | PartKind::Hyperlink | PartKind::Unknown(_) => {
            return Err(OpcError::InvalidPackUri(format!(
                "no canonical file name for content type '{}'",
                content_type
            )));
        },
    };
    Ok(name)
}

/// Canonical part name (`/`-prefixed) of the `index`-th part of `content_type`.
pub fn partname(doc_type: DocType, content_type: &str, index: usize) -> Result<PackURI> {
    PackURI::new(format!("/{}", absolute_filename(doc_type, content_type, index)?))
}

/// The file name a relationship from a `source_content_type` part should target.
///
/// An empty source content type means the package itself, in which case the result equals
/// [`absolute_filename`].
pub fn relative_filename(
    doc_type: DocType,
    source_content_type: &str,
    content_type: &str,
    index: usize,
) -> Result<String> {
    let target = partname(doc_type, content_type, index)?;
    if source_content_type.is_empty() {
        return Ok(target.membername().to_string());
    }
    let source = partname(doc_type, source_content_type, 1)?;
    Ok(target.relative_ref(source.base_uri()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::opc::constants::content_type as ct;

    #[test]
    fn test_names_are_deterministic() {
        let first = absolute_filename(DocType::Document, "image/jpeg", 4).unwrap();
        let second = absolute_filename(DocType::Document, "image/jpeg", 4).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "word/media/image4.jpeg");
    }

    #[test]
    fn test_relative_to_source_part() {
        assert_eq!(
            relative_filename(DocType::Document, ct::WML_DOCUMENT_MAIN, ct::WML_FOOTER, 2).unwrap(),
            "footer2.xml"
        );
        assert_eq!(
            relative_filename(DocType::Presentation, ct::PML_SLIDE, ct::PML_SLIDE_LAYOUT, 1)
                .unwrap(),
            "../slideLayouts/slideLayout1.xml"
        );
        assert_eq!(
            relative_filename(DocType::Spreadsheet, "", ct::OFC_EXTENDED_PROPERTIES, 1).unwrap(),
            "docProps/app.xml"
        );
        assert_eq!(
            relative_filename(DocType::Document, ct::WML_DOCUMENT_MAIN, "image/png", 3).unwrap(),
            "media/image3.png"
        );
    }

    #[test]
    fn test_unknown_content_type_is_an_error() {
        assert!(matches!(
            absolute_filename(DocType::Document, "application/x-foo", 1),
            Err(OpcError::InvalidPackUri(_))
        ));
        assert!(absolute_filename(DocType::Document, "image/x-custom", 1).is_err());
    }
}
