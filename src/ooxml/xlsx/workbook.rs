//! The SpreadsheetML root object.

use std::io::{Seek, Write};
use std::path::Path;

use tracing::{debug, info_span, warn};

use crate::common::xml::escape_xml;
use crate::ooxml::config::PackageConfig;
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::constants::{content_type as ct, namespace};
use crate::ooxml::opc::decode::{DecodeContext, DecodeHost, Owner, Slot};
use crate::ooxml::opc::kind::{DocType, PartKind};
use crate::ooxml::opc::naming;
use crate::ooxml::opc::package::{OpcPackage, drop_relationships, ensure_relationship, ensure_single_relationship};
use crate::ooxml::opc::packuri::PackURI;
use crate::ooxml::opc::part::XmlPart;
use crate::ooxml::opc::pkgwriter::PackageWriter;
use crate::ooxml::opc::rel::{Relationship, Relationships};
use crate::ooxml::opc::validate::validate_package;
use crate::ooxml::root::{self, Source};

const WORKBOOK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets/></workbook>"#;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#;

const WORKSHEET_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheetData/></worksheet>"#;

const MAIN_FAMILIES: &[&str] = &["spreadsheetml", "ms-excel"];

/// Characters Excel refuses in a sheet name.
const FORBIDDEN_IN_SHEET_NAME: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// An Excel workbook (`.xlsx`, `.xlsm`, `.xltx`).
///
/// Worksheets are kept in relationship discovery order and renamed `sheet1.xml`,
/// `sheet2.xml`, ... accordingly.
#[derive(Debug)]
pub struct Workbook {
    package: OpcPackage,
    main: XmlPart,
    styles: Option<XmlPart>,
    shared_strings: Option<XmlPart>,
    worksheets: Vec<XmlPart>,
}

struct WorkbookParts {
    package: OpcPackage,
    main: Option<XmlPart>,
    styles: Option<XmlPart>,
    shared_strings: Option<XmlPart>,
    worksheets: Vec<XmlPart>,
}

impl WorkbookParts {
    fn new(config: PackageConfig) -> Self {
        Self {
            package: OpcPackage::for_reading(DocType::Spreadsheet, config),
            main: None,
            styles: None,
            shared_strings: None,
            worksheets: Vec::new(),
        }
    }

    fn into_workbook(self) -> Result<Workbook> {
        let main = root::require_main(self.main, DocType::Spreadsheet, MAIN_FAMILIES)?;
        debug!(
            worksheets = self.worksheets.len(),
            extras = self.package.extras().len(),
            "workbook loaded"
        );
        Ok(Workbook {
            package: self.package,
            main,
            styles: self.styles,
            shared_strings: self.shared_strings,
            worksheets: self.worksheets,
        })
    }
}

impl DecodeHost for WorkbookParts {
    fn doc_type(&self) -> DocType {
        DocType::Spreadsheet
    }

    fn on_relationship(
        &mut self,
        ctx: &mut DecodeContext<'_>,
        owner: &Owner,
        rel: &Relationship,
        target: &PackURI,
    ) -> crate::ooxml::opc::error::Result<Option<PackURI>> {
        let kind = rel.kind();
        if let Some(routed) = OpcPackage::route_shared(ctx, owner, &kind, target)? {
            return Ok(Some(routed));
        }
        match (owner, &kind) {
            (Owner::Package, PartKind::OfficeDocument) => ctx.route(kind, target),
            (
                Owner::Part(Slot {
                    kind: PartKind::OfficeDocument,
                    ..
                }),
                PartKind::Worksheet | PartKind::Styles | PartKind::SharedStrings,
            ) => ctx.route(kind, target),
            (_, PartKind::Unknown(reltype)) => {
                warn!(reltype = %reltype, target = %target, "unknown relationship type, part kept verbatim");
                Ok(None)
            },
            _ => {
                debug!(kind = ?kind, target = %target, "relationship not modelled, part kept verbatim");
                Ok(None)
            },
        }
    }

    fn attach_part(&mut self, slot: &Slot, part: XmlPart) -> crate::ooxml::opc::error::Result<()> {
        let Some(part) = self.package.attach_shared(slot, part) else {
            return Ok(());
        };
        match slot.kind {
            PartKind::OfficeDocument => self.main = Some(part),
            PartKind::Styles => self.styles = Some(part),
            PartKind::SharedStrings => self.shared_strings = Some(part),
            PartKind::Worksheet => self.worksheets.push(part),
            ref kind => debug!(kind = ?kind, "routed part has no home in a workbook"),
        }
        Ok(())
    }

    fn attach_rels(&mut self, owner: &Owner, rels: Relationships) -> crate::ooxml::opc::error::Result<()> {
        let slot = match owner {
            Owner::Package => {
                *self.package.rels_mut() = rels;
                return Ok(());
            },
            Owner::Part(slot) => slot,
        };
        let Some(rels) = self.package.attach_shared_rels(slot, rels) else {
            return Ok(());
        };
        let part = match slot.kind {
            PartKind::OfficeDocument => self.main.as_mut(),
            PartKind::Styles => self.styles.as_mut(),
            PartKind::SharedStrings => self.shared_strings.as_mut(),
            PartKind::Worksheet => self.worksheets.get_mut(slot.index - 1),
            _ => None,
        };
        if let Some(part) = part {
            part.set_rels(rels);
        }
        Ok(())
    }

    fn package(&mut self) -> &mut OpcPackage {
        &mut self.package
    }
}

impl Workbook {
    /// A new workbook with default styles and one empty sheet named `Sheet1`.
    pub fn new() -> Result<Self> {
        Self::with_config(PackageConfig::default())
    }

    pub fn with_config(config: PackageConfig) -> Result<Self> {
        let package = OpcPackage::new(DocType::Spreadsheet, config)?;
        let main = XmlPart::new(
            PackURI::new(DocType::Spreadsheet.main_partname())?,
            ct::SML_SHEET_MAIN,
            WORKBOOK_XML.as_bytes().to_vec(),
        )?;
        let mut workbook = Self {
            package,
            main,
            styles: None,
            shared_strings: None,
            worksheets: Vec::new(),
        };
        workbook.set_styles(Some(STYLES_XML.as_bytes().to_vec()))?;
        workbook.add_sheet("Sheet1")?;
        workbook.sync_main_rels();
        Ok(workbook)
    }

    pub fn read(data: &[u8]) -> Result<Self> {
        Self::read_with(data, PackageConfig::default())
    }

    pub fn read_with(data: &[u8], config: PackageConfig) -> Result<Self> {
        let mut parts = WorkbookParts::new(config.clone());
        root::load(Source::Bytes(data), &mut parts, &config)?;
        parts.into_workbook()
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, PackageConfig::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, config: PackageConfig) -> Result<Self> {
        let mut parts = WorkbookParts::new(config.clone());
        root::load(Source::Path(path.as_ref()), &mut parts, &config)?;
        parts.into_workbook()
    }

    #[inline]
    pub fn package(&self) -> &OpcPackage {
        &self.package
    }

    #[inline]
    pub fn package_mut(&mut self) -> &mut OpcPackage {
        &mut self.package
    }

    /// `xl/workbook.xml`.
    #[inline]
    pub fn main(&self) -> &XmlPart {
        &self.main
    }

    #[inline]
    pub fn main_mut(&mut self) -> &mut XmlPart {
        &mut self.main
    }

    #[inline]
    pub fn styles(&self) -> Option<&XmlPart> {
        self.styles.as_ref()
    }

    /// Replace the stylesheet, or remove it with `None`.
    pub fn set_styles(&mut self, xml: Option<Vec<u8>>) -> Result<()> {
        root::replace_single(&mut self.styles, DocType::Spreadsheet, ct::SML_STYLES, xml)
    }

    #[inline]
    pub fn shared_strings(&self) -> Option<&XmlPart> {
        self.shared_strings.as_ref()
    }

    /// Replace the shared string table, or remove it with `None`.
    pub fn set_shared_strings(&mut self, xml: Option<Vec<u8>>) -> Result<()> {
        root::replace_single(
            &mut self.shared_strings,
            DocType::Spreadsheet,
            ct::SML_SHARED_STRINGS,
            xml,
        )
    }

    #[inline]
    pub fn worksheets(&self) -> &[XmlPart] {
        &self.worksheets
    }

    pub fn worksheet_mut(&mut self, index: usize) -> Option<&mut XmlPart> {
        self.worksheets.get_mut(index)
    }

    /// Sheet names in workbook order, as listed in `<sheets>`.
    pub fn sheet_names(&self) -> Result<Vec<String>> {
        Ok(self
            .main
            .find_elements_with_attrs("sheet")?
            .into_iter()
            .filter_map(|attrs| {
                attrs
                    .into_iter()
                    .find(|(key, _)| key == "name")
                    .map(|(_, value)| value)
            })
            .collect())
    }

    /// Add an empty worksheet as `xl/worksheets/sheet{N}.xml` and list it in the workbook.
    /// Returns the rId relating it from the workbook part.
    pub fn add_sheet(&mut self, name: &str) -> Result<String> {
        self.check_sheet_name(name)?;

        let index = self.worksheets.len() + 1;
        let partname = naming::partname(DocType::Spreadsheet, ct::SML_WORKSHEET, index)?;
        let sheet = XmlPart::new(partname, ct::SML_WORKSHEET, WORKSHEET_XML.as_bytes().to_vec())?;

        let mut main = self.main.clone();
        let r_id = self.package.add_auto_relationship(
            main.rels_mut(),
            ct::SML_SHEET_MAIN,
            index,
            ct::SML_WORKSHEET,
        )?;
        let sheet_id = self.next_sheet_id()?;
        let root = main.root_name()?;
        let prefix = root.split_once(':').map(|(p, _)| format!("{}:", p)).unwrap_or_default();
        let entry = format!(
            r#"<{p}sheet xmlns:r="{}" name="{}" sheetId="{}" r:id="{}"/>"#,
            namespace::OFC_RELATIONSHIPS,
            escape_xml(name),
            sheet_id,
            r_id,
            p = prefix
        );
        main.append_child("sheets", &entry)?;

        self.main = main;
        self.worksheets.push(sheet);
        Ok(r_id)
    }

    fn check_sheet_name(&self, name: &str) -> Result<()> {
        let length = name.chars().count();
        if length == 0 || length > 31 {
            return Err(OoxmlError::Other(format!(
                "sheet name {:?} must be 1 to 31 characters",
                name
            )));
        }
        if name.contains(FORBIDDEN_IN_SHEET_NAME) || name.starts_with('\'') || name.ends_with('\'') {
            return Err(OoxmlError::Other(format!("invalid sheet name {:?}", name)));
        }
        let lower = name.to_lowercase();
        if self.sheet_names()?.iter().any(|n| n.to_lowercase() == lower) {
            return Err(OoxmlError::Other(format!("duplicate sheet name {:?}", name)));
        }
        Ok(())
    }

    fn next_sheet_id(&self) -> Result<u32> {
        let max = self
            .main
            .find_elements_with_attrs("sheet")?
            .iter()
            .flat_map(|attrs| attrs.iter())
            .filter(|(key, _)| key == "sheetId")
            .filter_map(|(_, value)| atoi_simd::parse::<u32>(value.as_bytes()).ok())
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    fn parts(&self) -> Vec<&XmlPart> {
        let mut parts = vec![&self.main];
        parts.extend(self.styles.iter().chain(self.shared_strings.iter()));
        parts.extend(self.worksheets.iter());
        parts
    }

    fn sync_main_rels(&mut self) {
        for (kind, present) in [
            (PartKind::Styles, &self.styles),
            (PartKind::SharedStrings, &self.shared_strings),
        ] {
            match present {
                Some(part) => {
                    let reltype = self.package.reltype(&kind);
                    ensure_single_relationship(self.main.rels_mut(), &kind, &reltype, part.partname());
                },
                None => {
                    drop_relationships(self.main.rels_mut(), &kind, self.package.extras());
                },
            }
        }
        let reltype = self.package.reltype(&PartKind::Worksheet);
        for sheet in &self.worksheets {
            ensure_relationship(self.main.rels_mut(), &PartKind::Worksheet, &reltype, sheet.partname());
        }
        let reltype = self.package.reltype(&PartKind::Theme);
        for theme in self.package.themes() {
            ensure_relationship(self.main.rels_mut(), &PartKind::Theme, &reltype, theme.partname());
        }
    }

    pub fn validate(&self) -> Result<()> {
        root::into_result(validate_package(&self.package, &self.parts(), false)?)
    }

    /// Write the package to `sink` and hand it back.
    pub fn save<W: Write + Seek>(&mut self, sink: W) -> Result<W> {
        let config = self.package.config().clone();
        config.in_scope(|| {
            let _span = info_span!("save", doc_type = ?DocType::Spreadsheet).entered();
            self.sync_main_rels();
            self.package.sync_root_rels()?;
            let content_types = self.package.prepared_content_types(&self.parts())?;
            self.package.set_content_types(content_types);

            let settings = &self.package.config().settings;
            if settings.validate_on_save {
                root::log_validation(&validate_package(&self.package, &self.parts(), false)?);
            }

            let mut writer = PackageWriter::new(sink, settings.compression);
            self.package.write_prologue(&mut writer)?;
            writer.write_xml_part(&self.main)?;
            for part in self.styles.iter().chain(self.shared_strings.iter()) {
                writer.write_xml_part(part)?;
            }
            self.package.write_themes(&mut writer)?;
            for sheet in &self.worksheets {
                writer.write_xml_part(sheet)?;
            }
            self.package.write_epilogue(&mut writer)?;
            Ok(writer.finish()?)
        })
    }

    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        root::save_to_path(path.as_ref(), |file| self.save(file))
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        root::save_to_vec(|buffer| self.save(buffer))
    }

    pub fn close(self) -> Result<()> {
        Ok(self.package.close()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::config::Compression;
    use crate::ooxml::opc::constants::relationship_type as rt;
    use crate::ooxml::opc::phys_pkg::{PhysPkgReader, PhysPkgWriter};

    fn member(bytes: &[u8], name: &str) -> Option<Vec<u8>> {
        let phys = PhysPkgReader::from_bytes(bytes).unwrap();
        phys.position(name).map(|i| phys.entry(i).data.clone())
    }

    fn archive(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = PhysPkgWriter::in_memory(Compression::Stored);
        for (name, data) in members {
            writer.write(name, data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_new_workbook() {
        let mut workbook = Workbook::new().unwrap();
        assert_eq!(workbook.sheet_names().unwrap(), ["Sheet1"]);
        let bytes = workbook.to_bytes().unwrap();

        assert!(member(&bytes, "xl/worksheets/sheet1.xml").is_some());
        assert!(member(&bytes, "xl/sharedStrings.xml").is_none());
        let rels = String::from_utf8(member(&bytes, "xl/_rels/workbook.xml.rels").unwrap()).unwrap();
        assert!(rels.contains(r#"Target="worksheets/sheet1.xml""#));
        assert!(rels.contains(r#"Target="styles.xml""#));
        assert!(workbook.validate().is_ok());
    }

    #[test]
    fn test_add_sheet_lists_it_in_workbook() {
        let mut workbook = Workbook::new().unwrap();
        let r_id = workbook.add_sheet("Q3 & Q4").unwrap();

        let sheets = workbook.main().find_elements_with_attrs("sheet").unwrap();
        assert_eq!(sheets.len(), 2);
        assert!(sheets[1].contains(&("name".to_string(), "Q3 & Q4".to_string())));
        assert!(sheets[1].contains(&("sheetId".to_string(), "2".to_string())));
        assert!(sheets[1].contains(&("r:id".to_string(), r_id.clone())));
        let rel = workbook.main().rels().get(&r_id).unwrap();
        assert_eq!(rel.reltype(), rt::WORKSHEET);
        assert_eq!(rel.target_ref(), "worksheets/sheet2.xml");
    }

    #[test]
    fn test_sheet_names_are_checked() {
        let mut workbook = Workbook::new().unwrap();
        assert!(workbook.add_sheet("sheet1").is_err());
        assert!(workbook.add_sheet("a/b").is_err());
        assert!(workbook.add_sheet("").is_err());
        assert!(workbook.add_sheet(&"x".repeat(32)).is_err());
        assert_eq!(workbook.worksheets().len(), 1);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");

        let mut workbook = Workbook::new().unwrap();
        workbook.add_sheet("Data").unwrap();
        workbook
            .set_shared_strings(Some(
                br#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="0" uniqueCount="0"/>"#
                    .to_vec(),
            ))
            .unwrap();
        workbook.save_to_file(&path).unwrap();

        let again = Workbook::open(&path).unwrap();
        assert_eq!(again.worksheets().len(), 2);
        assert!(again.shared_strings().is_some());
        assert_eq!(again.sheet_names().unwrap(), ["Sheet1", "Data"]);
        assert_eq!(
            again.main().rels().iter().filter(|r| r.reltype() == rt::SHARED_STRINGS).count(),
            1
        );
        again.close().unwrap();
    }

    #[test]
    fn test_document_is_not_a_workbook() {
        let mut doc = crate::ooxml::docx::Document::new().unwrap();
        let bytes = doc.to_bytes().unwrap();
        assert!(matches!(
            Workbook::read(&bytes),
            Err(OoxmlError::InvalidContentType { .. })
        ));
    }

    #[test]
    fn test_sheets_renamed_on_read_keep_links_between_them() {
        let content_types = format!(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="{}"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="{s}"/><Override PartName="/xl/worksheets/sheet2.xml" ContentType="{s}"/></Types>"#,
            ct::SML_SHEET_MAIN,
            s = ct::SML_WORKSHEET
        );
        let root_rels = format!(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{}" Target="xl/workbook.xml"/></Relationships>"#,
            rt::OFFICE_DOCUMENT
        );
        let book_rels = format!(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{w}" Target="worksheets/sheet2.xml"/><Relationship Id="rId2" Type="{w}" Target="worksheets/sheet1.xml"/></Relationships>"#,
            w = rt::WORKSHEET
        );
        let sheet1_rels = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://example.com/relationships/source" Target="sheet2.xml"/></Relationships>"#;
        let bytes = archive(&[
            ("[Content_Types].xml", content_types.as_bytes()),
            ("_rels/.rels", root_rels.as_bytes()),
            (
                "xl/workbook.xml",
                br#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="B" sheetId="2" r:id="rId1"/><sheet name="A" sheetId="1" r:id="rId2"/></sheets></workbook>"#,
            ),
            ("xl/_rels/workbook.xml.rels", book_rels.as_bytes()),
            ("xl/worksheets/sheet1.xml", b"<worksheet>a</worksheet>"),
            ("xl/worksheets/_rels/sheet1.xml.rels", sheet1_rels.as_bytes()),
            ("xl/worksheets/sheet2.xml", b"<worksheet>b</worksheet>"),
        ]);

        let mut workbook = Workbook::read(&bytes).unwrap();
        let sheets = workbook.worksheets();
        assert_eq!(sheets[0].partname().as_str(), "/xl/worksheets/sheet1.xml");
        assert_eq!(sheets[0].blob(), b"<worksheet>b</worksheet>");
        assert_eq!(sheets[1].partname().as_str(), "/xl/worksheets/sheet2.xml");
        assert_eq!(sheets[1].blob(), b"<worksheet>a</worksheet>");
        assert_eq!(workbook.main().rels().get("rId1").unwrap().target_ref(), "worksheets/sheet1.xml");
        assert_eq!(workbook.main().rels().get("rId2").unwrap().target_ref(), "worksheets/sheet2.xml");

        // sheet "A" still points at sheet "B", which now lives in sheet1.xml
        let link = sheets[1].rels().get("rId1").unwrap();
        assert_eq!(link.target_partname().unwrap().as_str(), "/xl/worksheets/sheet1.xml");

        let out = workbook.to_bytes().unwrap();
        let saved = String::from_utf8(member(&out, "xl/worksheets/_rels/sheet2.xml.rels").unwrap()).unwrap();
        assert!(saved.contains(r#"Target="sheet1.xml""#));
        assert!(member(&out, "xl/worksheets/_rels/sheet1.xml.rels").is_none());
    }

    #[test]
    fn test_failed_add_sheet_changes_nothing() {
        let mut workbook = Workbook::new().unwrap();
        workbook
            .main_mut()
            .set_blob(br#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"/>"#.to_vec())
            .unwrap();
        let rels_before = workbook.main().rels().len();

        assert!(workbook.add_sheet("Data").is_err());
        assert_eq!(workbook.worksheets().len(), 1);
        assert_eq!(workbook.main().rels().len(), rels_before);
    }
}
