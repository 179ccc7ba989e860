//! The WordprocessingML root object.

use std::io::{Seek, Write};
use std::path::Path;

use tracing::{debug, info_span, warn};

use crate::ooxml::config::{PackageConfig, PolicyVerdict};
use crate::ooxml::docx::watermark::Watermark;
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

const DOCUMENT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body><w:p/><w:sectPr><w:pgSz w:w="12240" w:h="15840"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="720" w:footer="720" w:gutter="0"/></w:sectPr></w:body></w:document>"#;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri" w:cs="Calibri"/><w:sz w:val="22"/><w:szCs w:val="22"/></w:rPr></w:rPrDefault><w:pPrDefault/></w:docDefaults></w:styles>"#;

const SETTINGS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:settings xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:defaultTabStop w:val="720"/><w:compat/></w:settings>"#;

const HEADER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:hdr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:p><w:pPr><w:pStyle w:val="Header"/></w:pPr></w:p></w:hdr>"#;

const FOOTER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:ftr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:p><w:pPr><w:pStyle w:val="Footer"/></w:pPr></w:p></w:ftr>"#;

/// Content types accepted for `word/document.xml` (documents, templates, macro-enabled).
const MAIN_FAMILIES: &[&str] = &["wordprocessingml", "ms-word"];

/// Single-instance parts owned by the main document part.
const SINGLE_KINDS: [PartKind; 7] = [
    PartKind::Styles,
    PartKind::Numbering,
    PartKind::Settings,
    PartKind::WebSettings,
    PartKind::FontTable,
    PartKind::Footnotes,
    PartKind::Endnotes,
];

fn single_content_type(kind: &PartKind) -> Option<&'static str> {
    Some(match kind {
        PartKind::Styles => ct::WML_STYLES,
        PartKind::Numbering => ct::WML_NUMBERING,
        PartKind::Settings => ct::WML_SETTINGS,
        PartKind::WebSettings => ct::WML_WEB_SETTINGS,
        PartKind::FontTable => ct::WML_FONT_TABLE,
        PartKind::Footnotes => ct::WML_FOOTNOTES,
        PartKind::Endnotes => ct::WML_ENDNOTES,
        _ => return None,
    })
}

/// A Word document (`.docx`, `.docm`, `.dotx`).
///
/// The document owns `word/document.xml`, the optional single-instance parts it relates to,
/// and its headers and footers in discovery order. Each part keeps its own relationship
/// table; headers are referenced from section properties by relationship id.
///
/// # Examples
///
/// ```no_run
/// use kumquat::ooxml::docx::Document;
///
/// let mut doc = Document::open("report.docx")?;
/// let r_id = doc.add_header()?;
/// println!("new header related as {}", r_id);
/// doc.save_to_file("report-out.docx")?;
/// doc.close()?;
/// # Ok::<(), kumquat::ooxml::OoxmlError>(())
/// ```
#[derive(Debug)]
pub struct Document {
    package: OpcPackage,
    main: XmlPart,
    styles: Option<XmlPart>,
    numbering: Option<XmlPart>,
    settings: Option<XmlPart>,
    web_settings: Option<XmlPart>,
    font_table: Option<XmlPart>,
    footnotes: Option<XmlPart>,
    endnotes: Option<XmlPart>,
    headers: Vec<XmlPart>,
    footers: Vec<XmlPart>,
}

/// Decode target for a document being read. The main part is optional until the pass ends.
struct DocumentParts {
    package: OpcPackage,
    main: Option<XmlPart>,
    singles: [Option<XmlPart>; 7],
    headers: Vec<XmlPart>,
    footers: Vec<XmlPart>,
}

impl DocumentParts {
    fn new(config: PackageConfig) -> Self {
        Self {
            package: OpcPackage::for_reading(DocType::Document, config),
            main: None,
            singles: Default::default(),
            headers: Vec::new(),
            footers: Vec::new(),
        }
    }

    fn part_mut(&mut self, slot: &Slot) -> Option<&mut XmlPart> {
        match &slot.kind {
            PartKind::OfficeDocument => self.main.as_mut(),
            PartKind::Header => self.headers.get_mut(slot.index - 1),
            PartKind::Footer => self.footers.get_mut(slot.index - 1),
            kind => {
                let i = SINGLE_KINDS.iter().position(|k| k == kind)?;
                self.singles[i].as_mut()
            },
        }
    }

    fn into_document(self) -> Result<Document> {
        let main = root::require_main(self.main, DocType::Document, MAIN_FAMILIES)?;
        let [styles, numbering, settings, web_settings, font_table, footnotes, endnotes] =
            self.singles;
        debug!(
            headers = self.headers.len(),
            footers = self.footers.len(),
            images = self.package.images().len(),
            extras = self.package.extras().len(),
            "document loaded"
        );
        Ok(Document {
            package: self.package,
            main,
            styles,
            numbering,
            settings,
            web_settings,
            font_table,
            footnotes,
            endnotes,
            headers: self.headers,
            footers: self.footers,
        })
    }
}

impl DecodeHost for DocumentParts {
    fn doc_type(&self) -> DocType {
        DocType::Document
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
                PartKind::Header | PartKind::Footer,
            ) => ctx.route(kind, target),
            (
                Owner::Part(Slot {
                    kind: PartKind::OfficeDocument,
                    ..
                }),
                k,
            ) if SINGLE_KINDS.contains(k) => ctx.route(kind, target),
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
        match &slot.kind {
            PartKind::OfficeDocument => self.main = Some(part),
            PartKind::Header => self.headers.push(part),
            PartKind::Footer => self.footers.push(part),
            kind => match SINGLE_KINDS.iter().position(|k| k == kind) {
                Some(i) => self.singles[i] = Some(part),
                None => debug!(kind = ?kind, "routed part has no home in a document"),
            },
        }
        Ok(())
    }

    fn attach_rels(&mut self, owner: &Owner, rels: Relationships) -> crate::ooxml::opc::error::Result<()> {
        match owner {
            Owner::Package => *self.package.rels_mut() = rels,
            Owner::Part(slot) => {
                if let Some(rels) = self.package.attach_shared_rels(slot, rels)
                    && let Some(part) = self.part_mut(slot)
                {
                    part.set_rels(rels);
                }
            },
        }
        Ok(())
    }

    fn package(&mut self) -> &mut OpcPackage {
        &mut self.package
    }
}

/// What a watermarked save changed, so it can be put back.
struct WatermarkUndo {
    main_xml: Vec<u8>,
    main_rels: Relationships,
    headers: usize,
    patched: Option<(usize, Vec<u8>)>,
}

impl Document {
    /// A new, empty document with default styles and settings.
    pub fn new() -> Result<Self> {
        Self::with_config(PackageConfig::default())
    }

    pub fn with_config(config: PackageConfig) -> Result<Self> {
        let package = OpcPackage::new(DocType::Document, config)?;
        let main = XmlPart::new(
            PackURI::new(DocType::Document.main_partname())?,
            ct::WML_DOCUMENT_MAIN,
            DOCUMENT_XML.as_bytes().to_vec(),
        )?;
        let mut document = Self {
            package,
            main,
            styles: None,
            numbering: None,
            settings: None,
            web_settings: None,
            font_table: None,
            footnotes: None,
            endnotes: None,
            headers: Vec::new(),
            footers: Vec::new(),
        };
        document.set_part(PartKind::Styles, Some(STYLES_XML.as_bytes().to_vec()))?;
        document.set_part(PartKind::Settings, Some(SETTINGS_XML.as_bytes().to_vec()))?;
        document.sync_main_rels();
        Ok(document)
    }

    /// Read a document from memory.
    pub fn read(data: &[u8]) -> Result<Self> {
        Self::read_with(data, PackageConfig::default())
    }

    pub fn read_with(data: &[u8], config: PackageConfig) -> Result<Self> {
        let mut parts = DocumentParts::new(config.clone());
        root::load(Source::Bytes(data), &mut parts, &config)?;
        parts.into_document()
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, PackageConfig::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, config: PackageConfig) -> Result<Self> {
        let mut parts = DocumentParts::new(config.clone());
        root::load(Source::Path(path.as_ref()), &mut parts, &config)?;
        parts.into_document()
    }

    #[inline]
    pub fn package(&self) -> &OpcPackage {
        &self.package
    }

    #[inline]
    pub fn package_mut(&mut self) -> &mut OpcPackage {
        &mut self.package
    }

    /// `word/document.xml`.
    #[inline]
    pub fn main(&self) -> &XmlPart {
        &self.main
    }

    #[inline]
    pub fn main_mut(&mut self) -> &mut XmlPart {
        &mut self.main
    }

    fn single(&self, kind: &PartKind) -> Option<&Option<XmlPart>> {
        Some(match kind {
            PartKind::Styles => &self.styles,
            PartKind::Numbering => &self.numbering,
            PartKind::Settings => &self.settings,
            PartKind::WebSettings => &self.web_settings,
            PartKind::FontTable => &self.font_table,
            PartKind::Footnotes => &self.footnotes,
            PartKind::Endnotes => &self.endnotes,
            _ => return None,
        })
    }

    fn single_mut(&mut self, kind: &PartKind) -> Option<&mut Option<XmlPart>> {
        Some(match kind {
            PartKind::Styles => &mut self.styles,
            PartKind::Numbering => &mut self.numbering,
            PartKind::Settings => &mut self.settings,
            PartKind::WebSettings => &mut self.web_settings,
            PartKind::FontTable => &mut self.font_table,
            PartKind::Footnotes => &mut self.footnotes,
            PartKind::Endnotes => &mut self.endnotes,
            _ => return None,
        })
    }

    /// One of the single-instance parts: styles, numbering, settings, web settings, font
    /// table, footnotes or endnotes.
    pub fn part(&self, kind: &PartKind) -> Option<&XmlPart> {
        self.single(kind)?.as_ref()
    }

    pub fn part_mut(&mut self, kind: &PartKind) -> Option<&mut XmlPart> {
        self.single_mut(kind)?.as_mut()
    }

    /// Replace a single-instance part's XML, creating the part if needed. `None` removes
    /// the part; its relationship and content-type override go with it on save.
    pub fn set_part(&mut self, kind: PartKind, xml: Option<Vec<u8>>) -> Result<()> {
        let content_type = single_content_type(&kind).ok_or_else(|| {
            OoxmlError::Other(format!("{:?} is not a single-instance document part", kind))
        })?;
        let Some(slot) = self.single_mut(&kind) else {
            return Ok(());
        };
        root::replace_single(slot, DocType::Document, content_type, xml)
    }

    #[inline]
    pub fn styles(&self) -> Option<&XmlPart> {
        self.styles.as_ref()
    }

    #[inline]
    pub fn numbering(&self) -> Option<&XmlPart> {
        self.numbering.as_ref()
    }

    #[inline]
    pub fn settings(&self) -> Option<&XmlPart> {
        self.settings.as_ref()
    }

    #[inline]
    pub fn headers(&self) -> &[XmlPart] {
        &self.headers
    }

    pub fn header_mut(&mut self, index: usize) -> Option<&mut XmlPart> {
        self.headers.get_mut(index)
    }

    #[inline]
    pub fn footers(&self) -> &[XmlPart] {
        &self.footers
    }

    pub fn footer_mut(&mut self, index: usize) -> Option<&mut XmlPart> {
        self.footers.get_mut(index)
    }

    /// Add an empty header as `word/header{N}.xml` and return the rId relating it from the
    /// main part, for use in a `w:headerReference`.
    pub fn add_header(&mut self) -> Result<String> {
        let index = self.headers.len() + 1;
        self.headers
            .push(Self::new_story(ct::WML_HEADER, index, HEADER_XML)?);
        let r_id = self.package.add_auto_relationship(
            self.main.rels_mut(),
            ct::WML_DOCUMENT_MAIN,
            index,
            ct::WML_HEADER,
        )?;
        Ok(r_id)
    }

    /// Add an empty footer as `word/footer{N}.xml` and return its rId.
    pub fn add_footer(&mut self) -> Result<String> {
        let index = self.footers.len() + 1;
        self.footers
            .push(Self::new_story(ct::WML_FOOTER, index, FOOTER_XML)?);
        let r_id = self.package.add_auto_relationship(
            self.main.rels_mut(),
            ct::WML_DOCUMENT_MAIN,
            index,
            ct::WML_FOOTER,
        )?;
        Ok(r_id)
    }

    fn new_story(content_type: &str, index: usize, xml: &str) -> Result<XmlPart> {
        let partname = naming::partname(DocType::Document, content_type, index)?;
        Ok(XmlPart::new(partname, content_type, xml.as_bytes().to_vec())?)
    }

    /// rId of the `n`-th (0-based) header relationship of the main part.
    pub fn header_rel_id(&self, n: usize) -> Option<&str> {
        let reltype = self.package.reltype(&PartKind::Header);
        self.main.rels().find_rid_for_n(n, &reltype)
    }

    /// rId of the `n`-th (0-based) footer relationship of the main part.
    pub fn footer_rel_id(&self, n: usize) -> Option<&str> {
        let reltype = self.package.reltype(&PartKind::Footer);
        self.main.rels().find_rid_for_n(n, &reltype)
    }

    /// Add a media part and relate it from the main part. Returns the rId for `r:embed`.
    pub fn add_image(&mut self, data: Vec<u8>) -> Result<String> {
        let partname = self.package.add_image(data)?;
        let target_ref = partname.relative_ref(self.main.partname().base_uri());
        let reltype = self.package.reltype(&PartKind::Image);
        Ok(self.main.relate_to(&target_ref, &reltype))
    }

    /// Every XML part the document writes, in write order (themes and properties excluded).
    fn parts(&self) -> Vec<&XmlPart> {
        let mut parts = vec![&self.main];
        parts.extend([&self.numbering, &self.styles, &self.settings].into_iter().flatten());
        parts.extend(self.headers.iter().chain(&self.footers));
        parts.extend(
            [&self.endnotes, &self.footnotes, &self.font_table, &self.web_settings]
                .into_iter()
                .flatten(),
        );
        parts
    }

    /// Bring the main part's relationships in line with the parts that exist.
    fn sync_main_rels(&mut self) {
        for kind in &SINGLE_KINDS {
            let reltype = self.package.reltype(kind);
            let present = match kind {
                PartKind::Styles => &self.styles,
                PartKind::Numbering => &self.numbering,
                PartKind::Settings => &self.settings,
                PartKind::WebSettings => &self.web_settings,
                PartKind::FontTable => &self.font_table,
                PartKind::Footnotes => &self.footnotes,
                _ => &self.endnotes,
            };
            match present {
                Some(part) => {
                    ensure_single_relationship(self.main.rels_mut(), kind, &reltype, part.partname());
                },
                None => {
                    drop_relationships(self.main.rels_mut(), kind, self.package.extras());
                },
            }
        }

        for (kind, stories) in [
            (PartKind::Header, &self.headers),
            (PartKind::Footer, &self.footers),
        ] {
            let reltype = self.package.reltype(&kind);
            for story in stories {
                ensure_relationship(self.main.rels_mut(), &kind, &reltype, story.partname());
            }
        }
        let reltype = self.package.reltype(&PartKind::Theme);
        for theme in self.package.themes() {
            ensure_relationship(self.main.rels_mut(), &PartKind::Theme, &reltype, theme.partname());
        }
    }

    /// Run the structural checks; any finding is an [`OoxmlError::Validation`].
    pub fn validate(&self) -> Result<()> {
        root::into_result(validate_package(&self.package, &self.parts(), true)?)
    }

    /// Write the package to `sink` and hand it back.
    ///
    /// The save policy is consulted first; a watermark verdict adds a watermark header to this
    /// save only. The document is left as it was.
    pub fn save<W: Write + Seek>(&mut self, sink: W) -> Result<W> {
        let config = self.package.config().clone();
        config.in_scope(|| {
            let _span = info_span!("save", doc_type = ?DocType::Document).entered();
            match config.policy.evaluate() {
                PolicyVerdict::Allow => self.write_package(sink),
                PolicyVerdict::Watermark(text) => {
                    debug!(text = %text, "save policy requested a watermark");
                    let undo = self.apply_watermark(&Watermark::text(text))?;
                    let written = self.write_package(sink);
                    let restored = self.undo_watermark(undo);
                    let sink = written?;
                    restored?;
                    Ok(sink)
                },
            }
        })
    }

    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        root::save_to_path(path.as_ref(), |file| self.save(file))
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        root::save_to_vec(|buffer| self.save(buffer))
    }

    /// Release the staging directory holding extra files.
    pub fn close(self) -> Result<()> {
        Ok(self.package.close()?)
    }

    fn write_package<W: Write + Seek>(&mut self, sink: W) -> Result<W> {
        self.sync_main_rels();
        self.package.sync_root_rels()?;
        let content_types = self.package.prepared_content_types(&self.parts())?;
        self.package.set_content_types(content_types);

        let settings = &self.package.config().settings;
        if settings.validate_on_save {
            root::log_validation(&validate_package(&self.package, &self.parts(), true)?);
        }

        let mut writer = PackageWriter::new(sink, settings.compression);
        self.package.write_prologue(&mut writer)?;
        writer.write_xml_part(&self.main)?;
        for part in [&self.numbering, &self.styles, &self.settings].into_iter().flatten() {
            writer.write_xml_part(part)?;
        }
        self.package.write_themes(&mut writer)?;
        for part in self.headers.iter().chain(&self.footers) {
            writer.write_xml_part(part)?;
        }
        for part in [&self.endnotes, &self.footnotes, &self.font_table, &self.web_settings]
            .into_iter()
            .flatten()
        {
            writer.write_xml_part(part)?;
        }
        self.package.write_epilogue(&mut writer)?;
        Ok(writer.finish()?)
    }

    /// Put the watermark into the default header of the last section, creating that header
    /// when the section has none.
    ///
    /// The edits are made on copies and committed only once all of them succeeded, so an
    /// error leaves the document untouched.
    fn apply_watermark(&mut self, watermark: &Watermark) -> Result<WatermarkUndo> {
        let mut undo = WatermarkUndo {
            main_xml: self.main.blob().to_vec(),
            main_rels: self.main.rels().clone(),
            headers: self.headers.len(),
            patched: None,
        };

        if let Some(index) = self.default_header_index()? {
            let mut header = self.headers[index].clone();
            header.append_child("hdr", &watermark.to_paragraph_xml(index + 1))?;
            let original = std::mem::replace(&mut self.headers[index], header);
            undo.patched = Some((index, original.blob().to_vec()));
            return Ok(undo);
        }

        let index = self.headers.len() + 1;
        let partname = naming::partname(DocType::Document, ct::WML_HEADER, index)?;
        let header = XmlPart::new(
            partname,
            ct::WML_HEADER,
            watermark.to_header_xml(index).into_bytes(),
        )?;
        let mut main = self.main.clone();
        let r_id = self.package.add_auto_relationship(
            main.rels_mut(),
            ct::WML_DOCUMENT_MAIN,
            index,
            ct::WML_HEADER,
        )?;
        let reference = format!(
            r#"<w:headerReference xmlns:w="{}" xmlns:r="{}" w:type="default" r:id="{}"/>"#,
            namespace::WML_MAIN,
            namespace::OFC_RELATIONSHIPS,
            r_id
        );
        if main.find_elements_with_attrs("sectPr")?.is_empty() {
            main.append_child(
                "body",
                &format!(r#"<w:sectPr xmlns:w="{}">{}</w:sectPr>"#, namespace::WML_MAIN, reference),
            )?;
        } else {
            main.insert_first_child("sectPr", &reference)?;
        }

        self.main = main;
        self.headers.push(header);
        Ok(undo)
    }

    /// Position in `headers` of the last section's default header, if it has one.
    fn default_header_index(&self) -> Result<Option<usize>> {
        let references = self.main.find_elements_with_attrs("headerReference")?;
        let Some(r_id) = references.iter().rev().find_map(|attrs| {
            let is_default = attrs
                .iter()
                .any(|(k, v)| k.rsplit(':').next() == Some("type") && v == "default");
            is_default
                .then(|| {
                    attrs
                        .iter()
                        .find(|(k, _)| k.ends_with(":id"))
                        .map(|(_, v)| v.clone())
                })
                .flatten()
        }) else {
            return Ok(None);
        };
        let Some(target) = self
            .main
            .rels()
            .get(&r_id)
            .and_then(|rel| rel.target_partname().ok())
        else {
            return Ok(None);
        };
        Ok(self
            .headers
            .iter()
            .position(|h| h.partname().eq_ignore_case(target.as_str())))
    }

    fn undo_watermark(&mut self, undo: WatermarkUndo) -> Result<()> {
        self.headers.truncate(undo.headers);
        if let Some((index, xml)) = undo.patched
            && let Some(header) = self.headers.get_mut(index)
        {
            header.set_blob(xml)?;
        }
        self.main.set_blob(undo.main_xml)?;
        self.main.set_rels(undo.main_rels);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::config::{PackageSettings, SavePolicy};
    use crate::ooxml::opc::constants::relationship_type as rt;
    use crate::ooxml::opc::kind::Conformance;
    use crate::ooxml::opc::phys_pkg::PhysPkgReader;
    use std::io::{Cursor, Write as _};
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn archive(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in members {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn member_names(bytes: &[u8]) -> Vec<String> {
        PhysPkgReader::from_bytes(bytes)
            .unwrap()
            .entries()
            .iter()
            .map(|e| e.name.clone())
            .collect()
    }

    fn member(bytes: &[u8], name: &str) -> Vec<u8> {
        let phys = PhysPkgReader::from_bytes(bytes).unwrap();
        phys.entry(phys.position(name).unwrap()).data.clone()
    }

    #[derive(Debug)]
    struct Unlicensed;

    impl SavePolicy for Unlicensed {
        fn evaluate(&self) -> PolicyVerdict {
            PolicyVerdict::Watermark("UNLICENSED".to_string())
        }
    }

    #[test]
    fn test_new_document_write_order() {
        let mut doc = Document::new().unwrap();
        let bytes = doc.to_bytes().unwrap();
        assert_eq!(
            member_names(&bytes),
            [
                "_rels/.rels",
                "docProps/app.xml",
                "docProps/core.xml",
                "word/document.xml",
                "word/_rels/document.xml.rels",
                "word/styles.xml",
                "word/settings.xml",
                "[Content_Types].xml",
            ]
        );
    }

    #[test]
    fn test_round_trip_preserves_parts() {
        let mut doc = Document::new().unwrap();
        doc.add_header().unwrap();
        doc.add_footer().unwrap();
        let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec();
        let r_id = doc.add_image(png.clone()).unwrap();
        let bytes = doc.to_bytes().unwrap();

        let mut again = Document::read(&bytes).unwrap();
        assert_eq!(again.headers().len(), 1);
        assert_eq!(again.footers().len(), 1);
        assert!(again.styles().is_some());
        assert_eq!(again.package().images()[0].data, png);
        assert_eq!(
            again.main().rels().get(&r_id).unwrap().target_ref(),
            "media/image1.png"
        );

        let rewritten = again.to_bytes().unwrap();
        assert_eq!(member_names(&rewritten), member_names(&bytes));
        assert_eq!(
            member(&rewritten, "word/_rels/document.xml.rels"),
            member(&bytes, "word/_rels/document.xml.rels")
        );
        assert_eq!(
            member(&rewritten, "[Content_Types].xml"),
            member(&bytes, "[Content_Types].xml")
        );
    }

    #[test]
    fn test_five_headers() {
        let mut doc = Document::new().unwrap();
        let ids: Vec<String> = (0..5).map(|_| doc.add_header().unwrap()).collect();
        let bytes = doc.to_bytes().unwrap();

        let names = member_names(&bytes);
        let content_types = String::from_utf8(member(&bytes, "[Content_Types].xml")).unwrap();
        for n in 1..=5 {
            assert!(names.contains(&format!("word/header{}.xml", n)));
            assert!(content_types.contains(&format!(
                r#"<Override PartName="/word/header{}.xml" ContentType="{}"/>"#,
                n,
                ct::WML_HEADER
            )));
            let rel = doc.main().rels().get(&ids[n - 1]).unwrap();
            assert_eq!(rel.reltype(), rt::HEADER);
            assert_eq!(rel.target_ref(), format!("header{}.xml", n));
        }
        assert_eq!(doc.header_rel_id(4), Some(ids[4].as_str()));
        assert_eq!(doc.header_rel_id(5), None);
    }

    #[test]
    fn test_removed_part_leaves_no_trace() {
        let mut doc = Document::new().unwrap();
        doc.set_part(PartKind::Settings, None).unwrap();
        let bytes = doc.to_bytes().unwrap();

        assert!(!member_names(&bytes).contains(&"word/settings.xml".to_string()));
        let content_types = String::from_utf8(member(&bytes, "[Content_Types].xml")).unwrap();
        assert!(!content_types.contains("/word/settings.xml"));
        assert!(!doc.main().rels().iter().any(|r| r.reltype() == rt::SETTINGS));
        assert!(doc.set_part(PartKind::Header, None).is_err());
    }

    #[test]
    fn test_headers_renamed_in_discovery_order_and_extras_kept() {
        let content_types = format!(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="{}"/><Override PartName="/word/hdrB.xml" ContentType="{h}"/><Override PartName="/word/hdrA.xml" ContentType="{h}"/></Types>"#,
            ct::WML_DOCUMENT_MAIN,
            h = ct::WML_HEADER
        );
        let root_rels = format!(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{}" Target="word/document.xml"/></Relationships>"#,
            rt::OFFICE_DOCUMENT
        );
        let doc_rels = format!(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId7" Type="{h}" Target="hdrB.xml"/><Relationship Id="rId3" Type="{h}" Target="hdrA.xml"/></Relationships>"#,
            h = rt::HEADER
        );
        let bytes = archive(&[
            ("word/hdrA.xml", b"<w:hdr>a</w:hdr>"),
            ("[Content_Types].xml", content_types.as_bytes()),
            ("_rels/.rels", root_rels.as_bytes()),
            ("word/document.xml", b"<w:document><w:body/></w:document>"),
            ("word/_rels/document.xml.rels", doc_rels.as_bytes()),
            ("word/hdrB.xml", b"<w:hdr>b</w:hdr>"),
            ("customXml/item1.xml", b"<opaque>\x01</opaque>"),
        ]);

        let mut doc = Document::read(&bytes).unwrap();
        assert_eq!(doc.headers()[0].blob(), b"<w:hdr>b</w:hdr>");
        assert_eq!(doc.headers()[0].partname().as_str(), "/word/header1.xml");
        assert_eq!(doc.header_rel_id(0), Some("rId7"));
        assert_eq!(doc.main().rels().get("rId3").unwrap().target_ref(), "header2.xml");
        assert!(doc.package().staging_path().is_some());

        let out = doc.to_bytes().unwrap();
        assert_eq!(member(&out, "customXml/item1.xml"), b"<opaque>\x01</opaque>");
        let names = member_names(&out);
        assert!(names.contains(&"word/header2.xml".to_string()));
        assert!(!names.contains(&"word/hdrA.xml".to_string()));
        let registry = String::from_utf8(member(&out, "[Content_Types].xml")).unwrap();
        assert!(!registry.contains("hdrA"));
        doc.close().unwrap();
    }

    #[test]
    fn test_strict_document_keeps_strict_relationships() {
        let strict = |kind: PartKind| kind.reltype(Conformance::Strict).into_owned();
        let content_types = format!(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="{}"/><Override PartName="/word/styles.xml" ContentType="{}"/></Types>"#,
            ct::WML_DOCUMENT_MAIN,
            ct::WML_STYLES
        );
        let root_rels = format!(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{}" Target="word/document.xml"/></Relationships>"#,
            strict(PartKind::OfficeDocument)
        );
        let doc_rels = format!(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{}" Target="styles.xml"/></Relationships>"#,
            strict(PartKind::Styles)
        );
        let bytes = archive(&[
            ("[Content_Types].xml", content_types.as_bytes()),
            ("_rels/.rels", root_rels.as_bytes()),
            (
                "word/document.xml",
                br#"<w:document xmlns:w="http://purl.oclc.org/ooxml/wordprocessingml/main" w:conformance="strict"><w:body/></w:document>"#,
            ),
            ("word/_rels/document.xml.rels", doc_rels.as_bytes()),
            ("word/styles.xml", br#"<w:styles xmlns:w="http://purl.oclc.org/ooxml/wordprocessingml/main"/>"#),
        ]);

        let mut doc = Document::read(&bytes).unwrap();
        assert_eq!(doc.package().conformance(), Conformance::Strict);
        let r_id = doc.add_header().unwrap();
        let out = doc.to_bytes().unwrap();

        let root = String::from_utf8(member(&out, "_rels/.rels")).unwrap();
        assert!(root.contains(&strict(PartKind::OfficeDocument)));
        let again = Document::read(&out).unwrap();
        let rels = again.main().rels();
        assert_eq!(rels.get("rId1").unwrap().reltype(), strict(PartKind::Styles));
        assert_eq!(rels.get(&r_id).unwrap().reltype(), strict(PartKind::Header));
        assert!(rels.iter().all(|r| !r.reltype().starts_with(rt::HEADER)));
        assert!(again.styles().is_some());
        assert_eq!(again.headers().len(), 1);
    }

    #[test]
    fn test_workbook_is_not_a_document() {
        let mut workbook = crate::ooxml::xlsx::Workbook::new().unwrap();
        let bytes = workbook.to_bytes().unwrap();
        // the main part is found through the officeDocument relationship, then rejected
        assert!(matches!(
            Document::read(&bytes),
            Err(OoxmlError::InvalidContentType { .. })
        ));
    }

    #[test]
    fn test_watermark_policy_adds_header_for_one_save() {
        let config = PackageConfig::default().with_policy(Unlicensed);
        let mut doc = Document::with_config(config).unwrap();
        let before = doc.main().blob().to_vec();

        let bytes = doc.to_bytes().unwrap();
        let header = String::from_utf8(member(&bytes, "word/header1.xml")).unwrap();
        assert!(header.contains("UNLICENSED"));
        let main = String::from_utf8(member(&bytes, "word/document.xml")).unwrap();
        assert!(main.contains(r#"w:type="default""#));

        assert_eq!(doc.main().blob(), before.as_slice());
        assert!(doc.headers().is_empty());
        assert!(doc.main().rels().iter().all(|r| r.reltype() != rt::HEADER));
    }

    #[test]
    fn test_failed_watermark_save_leaves_document_unchanged() {
        let config = PackageConfig::default().with_policy(Unlicensed);
        let mut doc = Document::with_config(config).unwrap();
        // nowhere to put a section break
        let bare = format!(r#"<w:document xmlns:w="{}"/>"#, namespace::WML_MAIN);
        doc.main_mut().set_blob(bare.clone().into_bytes()).unwrap();
        let rels_before = doc.main().rels().len();

        for _ in 0..2 {
            assert!(doc.to_bytes().is_err());
            assert!(doc.headers().is_empty());
            assert_eq!(doc.main().rels().len(), rels_before);
            assert_eq!(doc.main().blob(), bare.as_bytes());
        }
    }

    #[test]
    fn test_watermark_goes_into_existing_default_header() {
        let config = PackageConfig::default().with_policy(Unlicensed);
        let mut doc = Document::with_config(config).unwrap();
        let r_id = doc.add_header().unwrap();
        doc.main_mut()
            .insert_first_child(
                "sectPr",
                &format!(
                    r#"<w:headerReference w:type="default" r:id="{}"/>"#,
                    r_id
                ),
            )
            .unwrap();
        let before = doc.headers()[0].blob().to_vec();

        let bytes = doc.to_bytes().unwrap();
        assert!(!member_names(&bytes).contains(&"word/header2.xml".to_string()));
        let header = String::from_utf8(member(&bytes, "word/header1.xml")).unwrap();
        assert!(header.contains("PowerPlusWaterMarkObject1"));
        assert_eq!(doc.headers()[0].blob(), before.as_slice());
    }

    #[test]
    fn test_validate_reports_duplicate_bookmarks() {
        let mut doc = Document::new().unwrap();
        doc.main_mut()
            .append_child(
                "body",
                r#"<w:p><w:bookmarkStart w:id="0" w:name="x"/><w:bookmarkStart w:id="0" w:name="y"/></w:p>"#,
            )
            .unwrap();
        match doc.validate() {
            Err(OoxmlError::Validation(report)) => assert_eq!(report.issues().len(), 1),
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_on_save_only_logs() {
        let settings = PackageSettings {
            validate_on_save: true,
            ..PackageSettings::default()
        };
        let mut doc = Document::with_config(PackageConfig::default().with_settings(settings)).unwrap();
        doc.main_mut()
            .rels_mut()
            .add_relationship("urn:dangling", "nowhere.xml");
        assert!(doc.to_bytes().is_ok());
        assert!(doc.validate().is_err());
    }
}
