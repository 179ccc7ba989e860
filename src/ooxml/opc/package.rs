//! State shared by every root object: the package-level relationship table, the content-type
//! registry, document properties, thumbnail, themes, media and the extra files carried
//! through untouched.

use std::collections::{HashMap, HashSet};
use std::io::{Seek, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::ooxml::common::{AppProperties, CoreProperties, ImageFormat};
use crate::ooxml::config::PackageConfig;
use crate::ooxml::custom_properties::CustomProperties;
use crate::ooxml::opc::constants::content_type as ct;
use crate::ooxml::opc::content_types::ContentTypes;
use crate::ooxml::opc::decode::Slot;
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::kind::{Conformance, DocType, PartKind};
use crate::ooxml::opc::naming;
use crate::ooxml::opc::packuri::{PACKAGE_URI, PackURI};
use crate::ooxml::opc::part::{ExtraFile, ImagePart, Thumbnail, XmlPart, XmlTree};
use crate::ooxml::opc::phys_pkg::PhysPkgReader;
use crate::ooxml::opc::pkgwriter::PackageWriter;
use crate::ooxml::opc::rel::Relationships;
use crate::ooxml::opc::staging::StagingDir;

/// Return the rId of the internal relationship of `kind` pointing at `target`, adding one
/// when there is none.
pub(crate) fn ensure_relationship(
    rels: &mut Relationships,
    kind: &PartKind,
    reltype: &str,
    target: &PackURI,
) -> String {
    let existing = rels.iter().find(|rel| {
        !rel.is_external()
            && rel.kind() == *kind
            && rel
                .target_partname()
                .is_ok_and(|t| t.eq_ignore_case(target.as_str()))
    });
    if let Some(rel) = existing {
        return rel.r_id().to_string();
    }
    let target_ref = target.relative_ref(rels.base_uri());
    rels.add_relationship(reltype, &target_ref).r_id().to_string()
}

/// Like [`ensure_relationship`] for kinds a source has at most one of: an existing
/// relationship of the kind is retargeted instead of a second one being added.
pub(crate) fn ensure_single_relationship(
    rels: &mut Relationships,
    kind: &PartKind,
    reltype: &str,
    target: &PackURI,
) -> String {
    let existing = rels
        .iter()
        .find(|rel| !rel.is_external() && rel.kind() == *kind)
        .map(|rel| rel.r_id().to_string());
    match existing {
        Some(r_id) => {
            let target_ref = target.relative_ref(rels.base_uri());
            if let Some(rel) = rels.get_mut(&r_id)
                && !rel
                    .target_partname()
                    .is_ok_and(|t| t.eq_ignore_case(target.as_str()))
            {
                rel.set_target_ref(target_ref);
            }
            r_id
        },
        None => ensure_relationship(rels, kind, reltype, target),
    }
}

/// Remove every internal relationship of a kind, except those pointing at an extra file:
/// a part that could not be decoded is still referenced by its owner.
pub(crate) fn drop_relationships(
    rels: &mut Relationships,
    kind: &PartKind,
    extras: &[ExtraFile],
) -> usize {
    rels.remove_where(|rel| {
        !rel.is_external()
            && rel.kind() == *kind
            && !rel.target_partname().is_ok_and(|target| {
                extras
                    .iter()
                    .any(|extra| target.eq_ignore_case(PackURI::from_member(&extra.zip_path).as_str()))
            })
    })
}

/// Shared root state of an OOXML package.
#[derive(Debug)]
pub struct OpcPackage {
    doc_type: DocType,
    conformance: Conformance,
    rels: Relationships,
    content_types: ContentTypes,
    core_props: Option<XmlPart>,
    app_props: Option<XmlPart>,
    custom_props: Option<XmlPart>,
    thumbnail: Option<Thumbnail>,
    themes: Vec<XmlPart>,
    images: Vec<ImagePart>,
    extras: Vec<ExtraFile>,
    staging: Option<StagingDir>,
    config: PackageConfig,
}

impl OpcPackage {
    /// State for a brand-new package: content types for the main part, core properties
    /// stamped now, app properties from the configured application name and version.
    pub fn new(doc_type: DocType, config: PackageConfig) -> Result<Self> {
        let mut package = Self::for_reading(doc_type, config);
        package.content_types = ContentTypes::for_new(doc_type);

        let core = CoreProperties::stamped_now();
        package.core_props = Some(XmlPart::from_tree(
            naming::partname(doc_type, ct::OPC_CORE_PROPERTIES, 1)?,
            ct::OPC_CORE_PROPERTIES,
            &core,
        )?);
        let app = AppProperties::from_settings(&package.config.settings);
        package.app_props = Some(XmlPart::from_tree(
            naming::partname(doc_type, ct::OFC_EXTENDED_PROPERTIES, 1)?,
            ct::OFC_EXTENDED_PROPERTIES,
            &app,
        )?);

        for content_type in [
            doc_type.main_content_type(),
            ct::OPC_CORE_PROPERTIES,
            ct::OFC_EXTENDED_PROPERTIES,
        ] {
            package
                .rels
                .add_auto_relationship(doc_type, "", 1, content_type)?;
        }
        Ok(package)
    }

    /// Empty state for the decode pass to fill in.
    pub(crate) fn for_reading(doc_type: DocType, config: PackageConfig) -> Self {
        Self {
            doc_type,
            conformance: Conformance::default(),
            rels: Relationships::new(PACKAGE_URI),
            content_types: ContentTypes::new(),
            core_props: None,
            app_props: None,
            custom_props: None,
            thumbnail: None,
            themes: Vec::new(),
            images: Vec::new(),
            extras: Vec::new(),
            staging: None,
            config,
        }
    }

    #[inline]
    pub fn doc_type(&self) -> DocType {
        self.doc_type
    }

    #[inline]
    pub fn conformance(&self) -> Conformance {
        self.conformance
    }

    pub(crate) fn set_conformance(&mut self, conformance: Conformance) {
        self.conformance = conformance;
    }

    #[inline]
    pub fn config(&self) -> &PackageConfig {
        &self.config
    }

    /// Package-level relationships (`_rels/.rels`).
    #[inline]
    pub fn rels(&self) -> &Relationships {
        &self.rels
    }

    #[inline]
    pub fn rels_mut(&mut self) -> &mut Relationships {
        &mut self.rels
    }

    #[inline]
    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    #[inline]
    pub fn content_types_mut(&mut self) -> &mut ContentTypes {
        &mut self.content_types
    }

    pub(crate) fn set_content_types(&mut self, content_types: ContentTypes) {
        self.content_types = content_types;
    }

    /// Relationship type URI for new relationships of `kind`, in this package's conformance class.
    pub fn reltype(&self, kind: &PartKind) -> String {
        kind.reltype(self.conformance).into_owned()
    }

    /// Add a relationship whose target is the canonical name of the `index`-th part of
    /// `content_type`, relative to a source part of `source_content_type`.
    pub fn add_auto_relationship(
        &self,
        rels: &mut Relationships,
        source_content_type: &str,
        index: usize,
        content_type: &str,
    ) -> Result<String> {
        let r_id = rels
            .add_auto_relationship(self.doc_type, source_content_type, index, content_type)?
            .r_id()
            .to_string();
        if self.conformance == Conformance::Strict
            && let Some(rel) = rels.get_mut(&r_id)
        {
            let strict = rel.kind().reltype(Conformance::Strict).into_owned();
            rel.set_reltype(strict);
        }
        Ok(r_id)
    }

    pub fn core_properties(&self) -> Result<Option<CoreProperties>> {
        self.core_props.as_ref().map(XmlPart::parse).transpose()
    }

    pub fn set_core_properties(&mut self, props: &CoreProperties) -> Result<()> {
        Self::store_tree(&mut self.core_props, self.doc_type, ct::OPC_CORE_PROPERTIES, props)
    }

    pub fn app_properties(&self) -> Result<Option<AppProperties>> {
        self.app_props.as_ref().map(XmlPart::parse).transpose()
    }

    pub fn set_app_properties(&mut self, props: &AppProperties) -> Result<()> {
        Self::store_tree(&mut self.app_props, self.doc_type, ct::OFC_EXTENDED_PROPERTIES, props)
    }

    /// Custom properties, if the package has a `docProps/custom.xml`.
    pub fn custom_properties(&self) -> Result<Option<CustomProperties>> {
        self.custom_props.as_ref().map(XmlPart::parse).transpose()
    }

    /// Create or replace `docProps/custom.xml`.
    pub fn set_custom_properties(&mut self, props: &CustomProperties) -> Result<()> {
        Self::store_tree(&mut self.custom_props, self.doc_type, ct::OFC_CUSTOM_PROPERTIES, props)
    }

    /// Drop `docProps/custom.xml`; its relationship and override go with it on save.
    pub fn remove_custom_properties(&mut self) -> bool {
        self.custom_props.take().is_some()
    }

    /// The raw `docProps/core.xml` part.
    pub fn core_properties_part(&self) -> Option<&XmlPart> {
        self.core_props.as_ref()
    }

    pub fn app_properties_part(&self) -> Option<&XmlPart> {
        self.app_props.as_ref()
    }

    pub fn custom_properties_part(&self) -> Option<&XmlPart> {
        self.custom_props.as_ref()
    }

    fn store_tree<T: XmlTree>(
        slot: &mut Option<XmlPart>,
        doc_type: DocType,
        content_type: &str,
        tree: &T,
    ) -> Result<()> {
        match slot {
            Some(part) => part.set_blob(tree.to_xml()?),
            None => {
                let partname = naming::partname(doc_type, content_type, 1)?;
                *slot = Some(XmlPart::from_tree(partname, content_type, tree)?);
                Ok(())
            },
        }
    }

    #[inline]
    pub fn thumbnail(&self) -> Option<&Thumbnail> {
        self.thumbnail.as_ref()
    }

    pub fn set_thumbnail(&mut self, thumbnail: Option<Thumbnail>) {
        self.thumbnail = thumbnail;
    }

    pub(crate) fn attach_thumbnail(&mut self, thumbnail: Thumbnail) {
        self.thumbnail = Some(thumbnail);
    }

    #[inline]
    pub fn themes(&self) -> &[XmlPart] {
        &self.themes
    }

    pub fn theme_mut(&mut self, index: usize) -> Option<&mut XmlPart> {
        self.themes.get_mut(index)
    }

    /// Add a theme part under the next free `theme{N}.xml` name.
    pub fn add_theme(&mut self, xml: Vec<u8>) -> Result<PackURI> {
        let partname = naming::partname(self.doc_type, ct::OFC_THEME, self.themes.len() + 1)?;
        self.themes
            .push(XmlPart::new(partname.clone(), ct::OFC_THEME, xml)?);
        Ok(partname)
    }

    #[inline]
    pub fn images(&self) -> &[ImagePart] {
        &self.images
    }

    /// Part name of the image at `index` (0-based position in [`images`](Self::images)).
    pub fn image_partname(&self, index: usize) -> Result<PackURI> {
        let image = self
            .images
            .get(index)
            .ok_or_else(|| OpcError::PartNotFound(format!("image #{}", index + 1)))?;
        naming::partname(self.doc_type, image.format.mime_type(), index + 1)
    }

    /// Add a media part. The format is sniffed from the bytes.
    pub fn add_image(&mut self, data: Vec<u8>) -> Result<PackURI> {
        let image = ImagePart::from_bytes(data).ok_or_else(|| {
            OpcError::ContentTypeNotFound("image data in an unrecognised format".to_string())
        })?;
        self.images.push(image);
        self.image_partname(self.images.len() - 1)
    }

    pub(crate) fn attach_image(&mut self, image: ImagePart) {
        self.images.push(image);
    }

    /// Members carried through without being understood.
    #[inline]
    pub fn extras(&self) -> &[ExtraFile] {
        &self.extras
    }

    /// Directory the extra files are staged in, if any were found.
    pub fn staging_path(&self) -> Option<&Path> {
        self.staging.as_ref().map(StagingDir::path)
    }

    /// Take a routed properties or theme part. Returns the part back when it is not one of
    /// those.
    pub(crate) fn attach_shared(&mut self, slot: &Slot, part: XmlPart) -> Option<XmlPart> {
        match slot.kind {
            PartKind::CoreProperties => self.core_props = Some(part),
            PartKind::ExtendedProperties => self.app_props = Some(part),
            PartKind::CustomProperties => self.custom_props = Some(part),
            PartKind::Theme => self.themes.push(part),
            _ => return Some(part),
        }
        None
    }

    /// Relationship table of a shared part. Returns the table back when the slot is not shared.
    pub(crate) fn attach_shared_rels(
        &mut self,
        slot: &Slot,
        rels: Relationships,
    ) -> Option<Relationships> {
        let part = match slot.kind {
            PartKind::CoreProperties => self.core_props.as_mut(),
            PartKind::ExtendedProperties => self.app_props.as_mut(),
            PartKind::CustomProperties => self.custom_props.as_mut(),
            PartKind::Theme => self.themes.get_mut(slot.index - 1),
            _ => return Some(rels),
        };
        if let Some(part) = part {
            part.set_rels(rels);
        }
        None
    }

    /// Stage the members the decode pass left over.
    ///
    /// Left-over `.rels` parts are rewritten where they point at a part that was renamed,
    /// so the parts they belong to keep resolving.
    pub(crate) fn stage_extras(
        &mut self,
        phys: &PhysPkgReader,
        leftovers: &[usize],
        renamed: &HashMap<String, PackURI>,
    ) -> Result<()> {
        if leftovers.is_empty() {
            return Ok(());
        }
        let staging = match &mut self.staging {
            Some(staging) => staging,
            None => self
                .staging
                .insert(StagingDir::create(self.config.settings.staging_dir.as_deref())?),
        };

        for &position in leftovers {
            let entry = phys.entry(position);
            let rewritten = retarget_rels(&entry.name, &entry.data, renamed);
            let disk_path = staging.stage(rewritten.as_deref().unwrap_or(&entry.data))?;
            debug!(member = %entry.name, "kept as extra file");
            self.extras.push(ExtraFile {
                zip_path: entry.name.clone(),
                disk_path,
            });
        }
        Ok(())
    }

    fn xml_parts(&self) -> impl Iterator<Item = &XmlPart> {
        self.app_props
            .iter()
            .chain(self.core_props.iter())
            .chain(self.custom_props.iter())
            .chain(self.themes.iter())
    }

    /// Bring the package-level relationships in line with what will be written.
    pub(crate) fn sync_root_rels(&mut self) -> Result<()> {
        let main = PackURI::new(self.doc_type.main_partname())?;
        let reltype = self.reltype(&PartKind::OfficeDocument);
        ensure_single_relationship(&mut self.rels, &PartKind::OfficeDocument, &reltype, &main);

        let singles = [
            (PartKind::CoreProperties, self.core_props.as_ref().map(|p| p.partname().clone())),
            (PartKind::ExtendedProperties, self.app_props.as_ref().map(|p| p.partname().clone())),
            (PartKind::CustomProperties, self.custom_props.as_ref().map(|p| p.partname().clone())),
            (
                PartKind::Thumbnail,
                self.thumbnail.as_ref().map(Thumbnail::partname).transpose()?,
            ),
        ];
        for (kind, partname) in singles {
            match partname {
                Some(partname) => {
                    let reltype = self.reltype(&kind);
                    ensure_single_relationship(&mut self.rels, &kind, &reltype, &partname);
                },
                None => {
                    drop_relationships(&mut self.rels, &kind, &self.extras);
                },
            }
        }
        Ok(())
    }

    /// The registry as it must be written alongside `parts` plus the package's own parts.
    ///
    /// Overrides for parts that will not be written are dropped; every written XML part gets an
    /// override; every written media extension gets a default.
    pub fn prepared_content_types(&self, parts: &[&XmlPart]) -> Result<ContentTypes> {
        let mut content_types = self.content_types.clone();
        let xml_parts: Vec<&XmlPart> = self.xml_parts().chain(parts.iter().copied()).collect();

        let mut written: HashSet<String> = xml_parts
            .iter()
            .map(|part| part.partname().as_str().to_ascii_lowercase())
            .collect();
        for index in 0..self.images.len() {
            written.insert(self.image_partname(index)?.as_str().to_ascii_lowercase());
        }
        if let Some(thumbnail) = &self.thumbnail {
            written.insert(thumbnail.partname()?.as_str().to_ascii_lowercase());
        }
        for extra in &self.extras {
            written.insert(PackURI::from_member(&extra.zip_path).as_str().to_ascii_lowercase());
        }

        let stale: Vec<String> = content_types
            .overrides()
            .iter()
            .filter(|entry| !written.contains(&entry.part_name.to_ascii_lowercase()))
            .map(|entry| entry.part_name.clone())
            .collect();
        for part_name in stale {
            debug!(part_name, "dropping override for part that is not written");
            content_types.remove_override(&part_name);
        }

        content_types.ensure_default("rels", ct::OPC_RELATIONSHIPS);
        if !content_types.has_default("xml") {
            content_types.add_default("xml", ct::XML);
        }
        for part in &xml_parts {
            content_types.ensure_override(part.partname().as_str(), part.content_type());
        }
        for image in &self.images {
            content_types.ensure_default(image.format.extension(), image.format.mime_type());
        }
        if let Some(thumbnail) = &self.thumbnail {
            let partname = thumbnail.partname()?;
            if content_types.resolve(&partname) != Some(thumbnail.content_type()) {
                content_types.ensure_default(thumbnail.extension(), thumbnail.content_type());
            }
        }
        Ok(content_types)
    }

    /// Root relationships, properties and thumbnail.
    pub(crate) fn write_prologue<W: Write + Seek>(&self, writer: &mut PackageWriter<W>) -> Result<()> {
        writer.write_rels(&PackURI::from_member(""), &self.rels)?;
        for part in self
            .app_props
            .iter()
            .chain(self.core_props.iter())
            .chain(self.custom_props.iter())
        {
            writer.write_xml_part(part)?;
        }
        if let Some(thumbnail) = &self.thumbnail {
            let blob = match thumbnail.encode() {
                Ok(blob) => blob,
                Err(e) => {
                    warn!(error = %e, "thumbnail could not be re-encoded, writing it as read");
                    thumbnail.raw().to_vec()
                },
            };
            writer.write_blob(&thumbnail.partname()?, &blob)?;
        }
        Ok(())
    }

    pub(crate) fn write_themes<W: Write + Seek>(&self, writer: &mut PackageWriter<W>) -> Result<()> {
        for theme in &self.themes {
            writer.write_xml_part(theme)?;
        }
        Ok(())
    }

    /// Media, the content-type registry, then the extra files.
    pub(crate) fn write_epilogue<W: Write + Seek>(&self, writer: &mut PackageWriter<W>) -> Result<()> {
        for (index, image) in self.images.iter().enumerate() {
            writer.write_blob(&self.image_partname(index)?, &image.data)?;
        }
        writer.write_content_types(&self.content_types)?;
        if let Some(staging) = &self.staging {
            for extra in &self.extras {
                writer.write_extra(extra, staging)?;
            }
        }
        Ok(())
    }

    /// Release the staging directory.
    pub fn close(self) -> Result<()> {
        match self.staging {
            Some(staging) => staging.close(),
            None => Ok(()),
        }
    }
}

/// A left-over `.rels` part re-serialized with targets moved to renamed parts, or `None` when
/// nothing it points at moved.
fn retarget_rels(member: &str, data: &[u8], renamed: &HashMap<String, PackURI>) -> Option<Vec<u8>> {
    if renamed.is_empty() || !member.to_ascii_lowercase().ends_with(".rels") {
        return None;
    }
    let source = PackURI::from_member(member).rels_source()?;
    let base_uri = source.base_uri().to_string();
    let mut rels = Relationships::from_xml(data, &base_uri).ok()?;

    let mut changed = false;
    for rel in rels.iter_mut().filter(|rel| !rel.is_external()) {
        let Ok(target) = rel.target_partname() else {
            continue;
        };
        if let Some(moved) = renamed.get(&target.as_str().to_ascii_lowercase()) {
            rel.set_target_ref(moved.relative_ref(&base_uri));
            changed = true;
        }
    }
    changed.then(|| rels.to_xml().into_bytes())
}
