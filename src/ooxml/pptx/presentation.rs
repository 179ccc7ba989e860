//! The PresentationML root object.

use std::io::{Seek, Write};
use std::path::Path;

use tracing::{debug, info_span, warn};

use crate::ooxml::common::Theme;
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
use crate::ooxml::pptx::template;
use crate::ooxml::root::{self, Source};

const MAIN_FAMILIES: &[&str] = &["presentationml", "ms-powerpoint"];

/// Slide ids below 256 are reserved.
const FIRST_SLIDE_ID: u32 = 256;

const PROPERTY_KINDS: [PartKind; 3] = [PartKind::PresProps, PartKind::ViewProps, PartKind::TableStyles];

/// A PowerPoint presentation (`.pptx`, `.pptm`, `.potx`).
///
/// Masters, layouts and slides are each kept in discovery order. Layouts are reached through
/// their masters, so a layout shared by several slides is held once.
#[derive(Debug)]
pub struct Presentation {
    package: OpcPackage,
    main: XmlPart,
    masters: Vec<XmlPart>,
    layouts: Vec<XmlPart>,
    slides: Vec<XmlPart>,
    pres_props: Option<XmlPart>,
    view_props: Option<XmlPart>,
    table_styles: Option<XmlPart>,
}

struct PresentationParts {
    package: OpcPackage,
    main: Option<XmlPart>,
    masters: Vec<XmlPart>,
    layouts: Vec<XmlPart>,
    slides: Vec<XmlPart>,
    props: [Option<XmlPart>; 3],
}

impl PresentationParts {
    fn new(config: PackageConfig) -> Self {
        Self {
            package: OpcPackage::for_reading(DocType::Presentation, config),
            main: None,
            masters: Vec::new(),
            layouts: Vec::new(),
            slides: Vec::new(),
            props: Default::default(),
        }
    }

    fn into_presentation(self) -> Result<Presentation> {
        let main = root::require_main(self.main, DocType::Presentation, MAIN_FAMILIES)?;
        let [pres_props, view_props, table_styles] = self.props;
        debug!(
            masters = self.masters.len(),
            layouts = self.layouts.len(),
            slides = self.slides.len(),
            extras = self.package.extras().len(),
            "presentation loaded"
        );
        Ok(Presentation {
            package: self.package,
            main,
            masters: self.masters,
            layouts: self.layouts,
            slides: self.slides,
            pres_props,
            view_props,
            table_styles,
        })
    }
}

impl DecodeHost for PresentationParts {
    fn doc_type(&self) -> DocType {
        DocType::Presentation
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
        let source = match owner {
            Owner::Package => None,
            Owner::Part(slot) => Some(&slot.kind),
        };
        match (source, &kind) {
            (None, PartKind::OfficeDocument)
            | (
                Some(PartKind::OfficeDocument),
                PartKind::SlideMaster
                | PartKind::Slide
                | PartKind::PresProps
                | PartKind::ViewProps
                | PartKind::TableStyles,
            )
            | (Some(PartKind::SlideMaster), PartKind::SlideLayout)
            | (Some(PartKind::SlideLayout), PartKind::SlideMaster)
            | (Some(PartKind::Slide), PartKind::SlideLayout) => ctx.route(kind, target),
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
            PartKind::SlideMaster => self.masters.push(part),
            PartKind::SlideLayout => self.layouts.push(part),
            PartKind::Slide => self.slides.push(part),
            kind => match PROPERTY_KINDS.iter().position(|k| k == kind) {
                Some(i) => self.props[i] = Some(part),
                None => debug!(kind = ?kind, "routed part has no home in a presentation"),
            },
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
        let part = match &slot.kind {
            PartKind::OfficeDocument => self.main.as_mut(),
            PartKind::SlideMaster => self.masters.get_mut(slot.index - 1),
            PartKind::SlideLayout => self.layouts.get_mut(slot.index - 1),
            PartKind::Slide => self.slides.get_mut(slot.index - 1),
            kind => PROPERTY_KINDS
                .iter()
                .position(|k| k == kind)
                .and_then(|i| self.props[i].as_mut()),
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

/// A part built together with the relationship table its XML refers to.
fn part_with_rels(
    content_type: &str,
    index: usize,
    build: impl FnOnce(&mut Relationships) -> Result<String>,
) -> Result<XmlPart> {
    let partname = naming::partname(DocType::Presentation, content_type, index)?;
    let mut rels = Relationships::new(partname.base_uri());
    let xml = build(&mut rels)?;
    let mut part = XmlPart::new(partname, content_type, xml.into_bytes())?;
    part.set_rels(rels);
    Ok(part)
}

impl Presentation {
    /// A new presentation with one slide master, one blank layout, the Office theme and no
    /// slides.
    pub fn new() -> Result<Self> {
        Self::with_config(PackageConfig::default())
    }

    pub fn with_config(config: PackageConfig) -> Result<Self> {
        let mut package = OpcPackage::new(DocType::Presentation, config)?;
        let theme = package.add_theme(Theme::office().to_xml().into_bytes())?;
        let theme_reltype = package.reltype(&PartKind::Theme);

        let layout = part_with_rels(ct::PML_SLIDE_LAYOUT, 1, |rels| {
            package.add_auto_relationship(rels, ct::PML_SLIDE_LAYOUT, 1, ct::PML_SLIDE_MASTER)?;
            Ok(template::slide_layout_xml())
        })?;
        let master = part_with_rels(ct::PML_SLIDE_MASTER, 1, |rels| {
            let layout_r_id =
                package.add_auto_relationship(rels, ct::PML_SLIDE_MASTER, 1, ct::PML_SLIDE_LAYOUT)?;
            ensure_relationship(rels, &PartKind::Theme, &theme_reltype, &theme);
            Ok(template::slide_master_xml(&layout_r_id))
        })?;
        let main = part_with_rels(ct::PML_PRESENTATION_MAIN, 1, |rels| {
            let master_r_id = package.add_auto_relationship(
                rels,
                ct::PML_PRESENTATION_MAIN,
                1,
                ct::PML_SLIDE_MASTER,
            )?;
            ensure_relationship(rels, &PartKind::Theme, &theme_reltype, &theme);
            Ok(template::presentation_xml(&master_r_id))
        })?;

        let mut presentation = Self {
            package,
            main,
            masters: vec![master],
            layouts: vec![layout],
            slides: Vec::new(),
            pres_props: None,
            view_props: None,
            table_styles: None,
        };
        presentation.set_part(PartKind::PresProps, Some(template::pres_props_xml().into_bytes()))?;
        presentation.set_part(PartKind::ViewProps, Some(template::view_props_xml().into_bytes()))?;
        presentation.set_part(
            PartKind::TableStyles,
            Some(template::table_styles_xml().into_bytes()),
        )?;
        presentation.sync_main_rels();
        Ok(presentation)
    }

    pub fn read(data: &[u8]) -> Result<Self> {
        Self::read_with(data, PackageConfig::default())
    }

    pub fn read_with(data: &[u8], config: PackageConfig) -> Result<Self> {
        let mut parts = PresentationParts::new(config.clone());
        root::load(Source::Bytes(data), &mut parts, &config)?;
        parts.into_presentation()
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, PackageConfig::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, config: PackageConfig) -> Result<Self> {
        let mut parts = PresentationParts::new(config.clone());
        root::load(Source::Path(path.as_ref()), &mut parts, &config)?;
        parts.into_presentation()
    }

    #[inline]
    pub fn package(&self) -> &OpcPackage {
        &self.package
    }

    #[inline]
    pub fn package_mut(&mut self) -> &mut OpcPackage {
        &mut self.package
    }

    /// `ppt/presentation.xml`.
    #[inline]
    pub fn main(&self) -> &XmlPart {
        &self.main
    }

    #[inline]
    pub fn main_mut(&mut self) -> &mut XmlPart {
        &mut self.main
    }

    #[inline]
    pub fn slide_masters(&self) -> &[XmlPart] {
        &self.masters
    }

    #[inline]
    pub fn slide_layouts(&self) -> &[XmlPart] {
        &self.layouts
    }

    #[inline]
    pub fn slides(&self) -> &[XmlPart] {
        &self.slides
    }

    pub fn slide_mut(&mut self, index: usize) -> Option<&mut XmlPart> {
        self.slides.get_mut(index)
    }

    fn single_mut(&mut self, kind: &PartKind) -> Option<&mut Option<XmlPart>> {
        Some(match kind {
            PartKind::PresProps => &mut self.pres_props,
            PartKind::ViewProps => &mut self.view_props,
            PartKind::TableStyles => &mut self.table_styles,
            _ => return None,
        })
    }

    /// presProps, viewProps or tableStyles.
    pub fn part(&self, kind: &PartKind) -> Option<&XmlPart> {
        match kind {
            PartKind::PresProps => self.pres_props.as_ref(),
            PartKind::ViewProps => self.view_props.as_ref(),
            PartKind::TableStyles => self.table_styles.as_ref(),
            _ => None,
        }
    }

    /// Replace presProps, viewProps or tableStyles, or remove it with `None`.
    pub fn set_part(&mut self, kind: PartKind, xml: Option<Vec<u8>>) -> Result<()> {
        let content_type = kind
            .content_type()
            .filter(|_| PROPERTY_KINDS.contains(&kind))
            .ok_or_else(|| {
                OoxmlError::Other(format!("{:?} is not a single-instance presentation part", kind))
            })?;
        let Some(slot) = self.single_mut(&kind) else {
            return Ok(());
        };
        root::replace_single(slot, DocType::Presentation, content_type, xml)
    }

    /// Add an empty slide as `ppt/slides/slide{N}.xml`, based on the first layout, and list it
    /// in `p:sldIdLst`. Returns the rId relating it from the presentation part.
    pub fn add_slide(&mut self) -> Result<String> {
        let layout = self
            .layouts
            .first()
            .ok_or_else(|| OoxmlError::Other("presentation has no slide layout".to_string()))?
            .partname()
            .clone();
        let layout_reltype = self.package.reltype(&PartKind::SlideLayout);

        let index = self.slides.len() + 1;
        let slide = part_with_rels(ct::PML_SLIDE, index, |rels| {
            ensure_relationship(rels, &PartKind::SlideLayout, &layout_reltype, &layout);
            Ok(template::slide_xml())
        })?;

        let mut main = self.main.clone();
        let r_id = self.package.add_auto_relationship(
            main.rels_mut(),
            ct::PML_PRESENTATION_MAIN,
            index,
            ct::PML_SLIDE,
        )?;
        let slide_id = self.next_slide_id()?;
        let root = main.root_name()?;
        let prefix = root.split_once(':').map(|(p, _)| format!("{}:", p)).unwrap_or_default();
        let entry = format!(
            r#"<{p}sldId xmlns:r="{}" id="{}" r:id="{}"/>"#,
            namespace::OFC_RELATIONSHIPS,
            slide_id,
            r_id,
            p = prefix
        );
        if !main.find_elements_with_attrs("sldIdLst")?.is_empty() {
            main.append_child("sldIdLst", &entry)?;
        } else {
            let list = format!("<{p}sldIdLst>{}</{p}sldIdLst>", entry, p = prefix);
            if main.find_elements_with_attrs("sldSz")?.is_empty() {
                main.append_child("presentation", &list)?;
            } else {
                main.insert_before("sldSz", &list)?;
            }
        }

        self.main = main;
        self.slides.push(slide);
        Ok(r_id)
    }

    fn next_slide_id(&self) -> Result<u32> {
        let max = self
            .main
            .find_elements_with_attrs("sldId")?
            .iter()
            .flat_map(|attrs| attrs.iter())
            .filter(|(key, _)| key == "id")
            .filter_map(|(_, value)| atoi_simd::parse::<u32>(value.as_bytes()).ok())
            .max();
        Ok(max.map_or(FIRST_SLIDE_ID, |id| (id + 1).max(FIRST_SLIDE_ID)))
    }

    fn parts(&self) -> Vec<&XmlPart> {
        let mut parts = vec![&self.main];
        parts.extend(self.masters.iter().chain(&self.layouts).chain(&self.slides));
        parts.extend(
            [&self.pres_props, &self.view_props, &self.table_styles]
                .into_iter()
                .flatten(),
        );
        parts
    }

    fn sync_main_rels(&mut self) {
        for (kind, present) in PROPERTY_KINDS
            .iter()
            .zip([&self.pres_props, &self.view_props, &self.table_styles])
        {
            match present {
                Some(part) => {
                    let reltype = self.package.reltype(kind);
                    ensure_single_relationship(self.main.rels_mut(), kind, &reltype, part.partname());
                },
                None => {
                    drop_relationships(self.main.rels_mut(), kind, self.package.extras());
                },
            }
        }
        for (kind, parts) in [(PartKind::SlideMaster, &self.masters), (PartKind::Slide, &self.slides)] {
            let reltype = self.package.reltype(&kind);
            for part in parts {
                ensure_relationship(self.main.rels_mut(), &kind, &reltype, part.partname());
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        root::into_result(validate_package(&self.package, &self.parts(), false)?)
    }

    /// Write the package to `sink` and hand it back.
    pub fn save<W: Write + Seek>(&mut self, sink: W) -> Result<W> {
        let config = self.package.config().clone();
        config.in_scope(|| {
            let _span = info_span!("save", doc_type = ?DocType::Presentation).entered();
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
            for part in self.masters.iter().chain(&self.layouts) {
                writer.write_xml_part(part)?;
            }
            self.package.write_themes(&mut writer)?;
            for part in self.slides.iter().chain(
                [&self.pres_props, &self.view_props, &self.table_styles]
                    .into_iter()
                    .flatten(),
            ) {
                writer.write_xml_part(part)?;
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

    fn archive(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = PhysPkgWriter::in_memory(Compression::Stored);
        for (name, data) in members {
            writer.write(name, data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn names(bytes: &[u8]) -> Vec<String> {
        PhysPkgReader::from_bytes(bytes)
            .unwrap()
            .entries()
            .iter()
            .map(|e| e.name.clone())
            .collect()
    }

    #[test]
    fn test_new_presentation_parts() {
        let mut pres = Presentation::new().unwrap();
        let bytes = pres.to_bytes().unwrap();
        let names = names(&bytes);
        for expected in [
            "ppt/presentation.xml",
            "ppt/slideMasters/slideMaster1.xml",
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            "ppt/slideLayouts/slideLayout1.xml",
            "ppt/theme/theme1.xml",
            "ppt/presProps.xml",
            "ppt/viewProps.xml",
            "ppt/tableStyles.xml",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }
        assert_eq!(
            pres.slide_layouts()[0].rels().iter().next().unwrap().target_ref(),
            "../slideMasters/slideMaster1.xml"
        );
        assert!(pres.validate().is_ok());
    }

    #[test]
    fn test_add_slides() {
        let mut pres = Presentation::new().unwrap();
        let first = pres.add_slide().unwrap();
        let second = pres.add_slide().unwrap();

        let ids = pres.main().find_elements_with_attrs("sldId").unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids[0].contains(&("id".to_string(), "256".to_string())));
        assert!(ids[1].contains(&("id".to_string(), "257".to_string())));
        assert!(ids[1].contains(&("r:id".to_string(), second.clone())));
        assert_ne!(first, second);

        let rel = pres.main().rels().get(&second).unwrap();
        assert_eq!(rel.reltype(), rt::SLIDE);
        assert_eq!(rel.target_ref(), "slides/slide2.xml");
        let layout_rel = pres.slides()[1].rels().iter().next().unwrap();
        assert_eq!(layout_rel.target_ref(), "../slideLayouts/slideLayout1.xml");

        // sldIdLst sits before sldSz
        let xml = std::str::from_utf8(pres.main().blob()).unwrap();
        assert!(xml.find("sldIdLst").unwrap() < xml.find("sldSz").unwrap());
    }

    #[test]
    fn test_round_trip_keeps_shared_layout_once() {
        let mut pres = Presentation::new().unwrap();
        pres.add_slide().unwrap();
        pres.add_slide().unwrap();
        let bytes = pres.to_bytes().unwrap();

        let mut again = Presentation::read(&bytes).unwrap();
        assert_eq!(again.slides().len(), 2);
        assert_eq!(again.slide_layouts().len(), 1);
        assert_eq!(again.slide_masters().len(), 1);
        assert_eq!(again.package().themes().len(), 1);
        assert!(again.part(&PartKind::TableStyles).is_some());
        assert_eq!(names(&again.to_bytes().unwrap()), names(&bytes));
    }

    #[test]
    fn test_removing_view_props() {
        let mut pres = Presentation::new().unwrap();
        pres.set_part(PartKind::ViewProps, None).unwrap();
        let bytes = pres.to_bytes().unwrap();
        assert!(!names(&bytes).iter().any(|n| n == "ppt/viewProps.xml"));
        assert!(pres.main().rels().iter().all(|r| r.reltype() != rt::VIEW_PROPS));
        assert!(pres.set_part(PartKind::Slide, None).is_err());
    }

    #[test]
    fn test_slide_link_follows_renamed_slides() {
        let content_types = format!(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="{}"/><Override PartName="/ppt/slides/slide1.xml" ContentType="{s}"/><Override PartName="/ppt/slides/slide2.xml" ContentType="{s}"/></Types>"#,
            ct::PML_PRESENTATION_MAIN,
            s = ct::PML_SLIDE
        );
        let root_rels = format!(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{}" Target="ppt/presentation.xml"/></Relationships>"#,
            rt::OFFICE_DOCUMENT
        );
        let pres_rels = format!(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{s}" Target="slides/slide2.xml"/><Relationship Id="rId2" Type="{s}" Target="slides/slide1.xml"/></Relationships>"#,
            s = rt::SLIDE
        );
        // slide1 jumps to slide2
        let slide1_rels = format!(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{}" Target="slide2.xml"/></Relationships>"#,
            rt::SLIDE
        );
        let bytes = archive(&[
            ("[Content_Types].xml", content_types.as_bytes()),
            ("_rels/.rels", root_rels.as_bytes()),
            (
                "ppt/presentation.xml",
                br#"<p:presentation xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"/>"#,
            ),
            ("ppt/_rels/presentation.xml.rels", pres_rels.as_bytes()),
            ("ppt/slides/slide1.xml", b"<p:sld>one</p:sld>"),
            ("ppt/slides/_rels/slide1.xml.rels", slide1_rels.as_bytes()),
            ("ppt/slides/slide2.xml", b"<p:sld>two</p:sld>"),
        ]);

        let mut pres = Presentation::read(&bytes).unwrap();
        let one = &pres.slides()[1];
        assert_eq!(one.blob(), b"<p:sld>one</p:sld>");
        assert_eq!(one.partname().as_str(), "/ppt/slides/slide2.xml");
        let link = one.rels().get("rId1").unwrap();
        assert_eq!(link.target_partname().unwrap().as_str(), "/ppt/slides/slide1.xml");
        assert_eq!(pres.slides()[0].blob(), b"<p:sld>two</p:sld>");

        let out = pres.to_bytes().unwrap();
        let names = names(&out);
        assert!(names.iter().any(|n| n == "ppt/slides/_rels/slide2.xml.rels"));
        assert!(!names.iter().any(|n| n == "ppt/slides/_rels/slide1.xml.rels"));
        let again = Presentation::read(&out).unwrap();
        assert_eq!(again.slides()[0].blob(), b"<p:sld>two</p:sld>");
        assert_eq!(
            again.slides()[1].rels().get("rId1").unwrap().target_ref(),
            "slide1.xml"
        );
    }

    #[test]
    fn test_failed_add_slide_changes_nothing() {
        let mut pres = Presentation::new().unwrap();
        // no sldIdLst, sldSz or presentation element to hold the new entry
        pres.main_mut()
            .set_blob(br#"<p:notes xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"/>"#.to_vec())
            .unwrap();
        let rels_before = pres.main().rels().len();

        assert!(pres.add_slide().is_err());
        assert!(pres.slides().is_empty());
        assert_eq!(pres.main().rels().len(), rels_before);
    }
}
