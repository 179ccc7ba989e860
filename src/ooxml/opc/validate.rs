//! Structural checks run on demand (or, logged only, on save).
//!
//! None of these are enforced by read or save: a package with dangling targets or duplicate
//! bookmarks still round-trips. Callers who want strictness call `validate()` on the root.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::ooxml::opc::error::Result;
use crate::ooxml::opc::package::OpcPackage;
use crate::ooxml::opc::packuri::PackURI;
use crate::ooxml::opc::part::XmlPart;
use crate::ooxml::opc::rel::Relationships;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Part the problem was found in (`/` for the package).
    pub part: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.part, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, part: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            part: part.into(),
            message: message.into(),
        });
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    #[inline]
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation issue(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  {}", issue)?;
        }
        Ok(())
    }
}

/// Check `parts` (the root's own XML parts) together with the package's shared parts.
///
/// `wordprocessing` enables the bookmark checks.
pub fn validate_package(
    package: &OpcPackage,
    parts: &[&XmlPart],
    wordprocessing: bool,
) -> Result<ValidationReport> {
    let mut report = ValidationReport::new();
    let content_types = package.prepared_content_types(parts)?;

    let shared = package
        .themes()
        .iter()
        .chain(package.custom_properties_part())
        .chain(package.core_properties_part())
        .chain(package.app_properties_part());
    let all_parts: Vec<&XmlPart> = parts.iter().copied().chain(shared).collect();

    let mut written: HashSet<String> = all_parts
        .iter()
        .map(|part| part.partname().as_str().to_ascii_lowercase())
        .collect();
    for index in 0..package.images().len() {
        written.insert(package.image_partname(index)?.as_str().to_ascii_lowercase());
    }
    if let Some(thumbnail) = package.thumbnail() {
        written.insert(thumbnail.partname()?.as_str().to_ascii_lowercase());
    }
    for extra in package.extras() {
        written.insert(PackURI::from_member(&extra.zip_path).as_str().to_ascii_lowercase());
    }

    check_targets("/", package.rels(), &written, &mut report);
    for part in &all_parts {
        let name = part.partname().as_str();
        check_targets(name, part.rels(), &written, &mut report);

        for r_id in part.relationship_refs()? {
            if part.rels().get(&r_id).is_none() {
                report.push(name, format!("reference to undefined relationship {}", r_id));
            }
        }
        if content_types.resolve(part.partname()).is_none() {
            report.push(name, "no content type");
        }
    }

    if wordprocessing {
        check_bookmarks(parts, &mut report)?;
    }
    Ok(report)
}

fn check_targets(
    source: &str,
    rels: &Relationships,
    written: &HashSet<String>,
    report: &mut ValidationReport,
) {
    for rel in rels.iter().filter(|rel| !rel.is_external()) {
        match rel.target_partname() {
            Ok(target) if written.contains(&target.as_str().to_ascii_lowercase()) => {},
            Ok(target) => report.push(
                source,
                format!("{} points at missing part {}", rel.r_id(), target),
            ),
            Err(e) => report.push(source, format!("{}: {}", rel.r_id(), e)),
        }
    }
}

/// `w:bookmarkStart` ids and names must be unique across the document's story parts.
fn check_bookmarks(parts: &[&XmlPart], report: &mut ValidationReport) -> Result<()> {
    let mut ids: HashMap<String, String> = HashMap::new();
    let mut names: HashMap<String, String> = HashMap::new();

    for part in parts {
        let part_name = part.partname().as_str();
        for attrs in part.find_elements_with_attrs("bookmarkStart")? {
            for (key, value) in &attrs {
                let seen = match key.rsplit(':').next() {
                    Some("id") => &mut ids,
                    Some("name") => &mut names,
                    _ => continue,
                };
                if let Some(first) = seen.insert(value.clone(), part_name.to_string()) {
                    report.push(
                        part_name,
                        format!("duplicate bookmark {} {:?} (first in {})", key, value, first),
                    );
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::config::PackageConfig;
    use crate::ooxml::opc::constants::content_type as ct;
    use crate::ooxml::opc::kind::DocType;

    fn main_part(xml: &str) -> XmlPart {
        XmlPart::new(
            PackURI::new("/word/document.xml").unwrap(),
            ct::WML_DOCUMENT_MAIN,
            xml.as_bytes().to_vec(),
        )
        .unwrap()
    }

    #[test]
    fn test_clean_package_has_no_issues() {
        let package = OpcPackage::new(DocType::Document, PackageConfig::default()).unwrap();
        let main = main_part(r#"<w:document xmlns:w="urn:w"><w:body/></w:document>"#);
        let report = validate_package(&package, &[&main], true).unwrap();
        assert!(report.is_empty(), "{}", report);
    }

    #[test]
    fn test_dangling_target_and_undefined_reference() {
        let package = OpcPackage::new(DocType::Document, PackageConfig::default()).unwrap();
        let mut main = main_part(
            r#"<w:document xmlns:w="urn:w" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:hdr r:id="rId9"/></w:document>"#,
        );
        main.relate_to("header1.xml", "urn:some-rel");

        let report = validate_package(&package, &[&main], false).unwrap();
        let messages: Vec<_> = report.issues().iter().map(|i| i.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("missing part /word/header1.xml")));
        assert!(messages.iter().any(|m| m.contains("undefined relationship rId9")));
        assert!(report.issues().iter().all(|i| i.part == "/word/document.xml"));
    }

    #[test]
    fn test_duplicate_bookmarks_across_parts() {
        let package = OpcPackage::new(DocType::Document, PackageConfig::default()).unwrap();
        let main = main_part(
            r#"<w:document xmlns:w="urn:w"><w:bookmarkStart w:id="0" w:name="a"/><w:bookmarkStart w:id="1" w:name="b"/></w:document>"#,
        );
        let header = XmlPart::new(
            PackURI::new("/word/header1.xml").unwrap(),
            ct::WML_HEADER,
            br#"<w:hdr xmlns:w="urn:w"><w:bookmarkStart w:id="1" w:name="c"/></w:hdr>"#.to_vec(),
        )
        .unwrap();

        let report = validate_package(&package, &[&main, &header], true).unwrap();
        assert_eq!(report.issues().len(), 1);
        assert_eq!(report.issues()[0].part, "/word/header1.xml");

        let relaxed = validate_package(&package, &[&main, &header], false).unwrap();
        assert!(relaxed.is_empty());
    }
}
