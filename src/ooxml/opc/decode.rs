//! Part discovery on read.
//!
//! The decode pass starts from the two bootstrap members, `[Content_Types].xml` and
//! `_rels/.rels`, and follows relationships outward. Every `.rels` part read hands each of its
//! relationships to the [`DecodeHost`], which decides whether the target is wired into the
//! model. Routed targets are given their canonical name (numbered in discovery order per
//! kind) and the target's own `.rels` joins the queue. The loop ends when the queue is empty.
//! Only then are the relationship tables handed over, with every target that points at a
//! renamed part rewritten, whether the host routed that relationship or not. Members no pass
//! consumed are left for the caller to keep as extra files.

use std::collections::{HashMap, VecDeque};

use fixedbitset::FixedBitSet;
use tracing::{debug, warn};

use crate::ooxml::common::ImageFormat;
use crate::ooxml::opc::content_types::ContentTypes;
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::kind::{Conformance, DocType, PartKind};
use crate::ooxml::opc::naming;
use crate::ooxml::opc::package::OpcPackage;
use crate::ooxml::opc::packuri::{CONTENT_TYPES_URI, PackURI};
use crate::ooxml::opc::part::{ImagePart, Thumbnail, XmlPart};
use crate::ooxml::opc::phys_pkg::PhysPkgReader;
use crate::ooxml::opc::rel::{Relationship, Relationships};

/// A routed part: its kind and 1-based discovery index within that kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slot {
    pub kind: PartKind,
    pub index: usize,
}

/// The source of a relationship table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Owner {
    Package,
    Part(Slot),
}

/// Implemented by the root objects. Receives relationships as they are discovered and the
/// parts and tables routed for it.
pub trait DecodeHost {
    fn doc_type(&self) -> DocType;

    /// Decide what to do with one internal relationship of `owner`.
    ///
    /// Return the canonical part name from [`DecodeContext::route`] to wire the target in, or
    /// `None` to leave it alone. The relationship itself is retargeted after the pass, once
    /// every part has its final name.
    fn on_relationship(
        &mut self,
        ctx: &mut DecodeContext<'_>,
        owner: &Owner,
        rel: &Relationship,
        target: &PackURI,
    ) -> Result<Option<PackURI>>;

    /// Take ownership of a routed XML part.
    fn attach_part(&mut self, slot: &Slot, part: XmlPart) -> Result<()>;

    /// Take ownership of the relationship table of a routed part.
    fn attach_rels(&mut self, owner: &Owner, rels: Relationships) -> Result<()>;

    fn package(&mut self) -> &mut OpcPackage;
}

enum Payload {
    Xml(XmlPart),
    Image(ImagePart),
    Thumbnail(Thumbnail),
}

enum Pending {
    ContentTypes,
    Rels {
        original: PackURI,
        canonical: PackURI,
        owner: Owner,
    },
    Part {
        original: PackURI,
        position: usize,
        slot: Slot,
        payload: Payload,
    },
}

/// State visible to [`DecodeHost::on_relationship`].
pub struct DecodeContext<'a> {
    phys: &'a PhysPkgReader,
    doc_type: DocType,
    content_types: ContentTypes,
    // lowercased original part name -> canonical part name
    seen: HashMap<String, PackURI>,
    counts: HashMap<PartKind, usize>,
    queue: VecDeque<Pending>,
    strict: bool,
}

impl<'a> DecodeContext<'a> {
    fn new(phys: &'a PhysPkgReader, doc_type: DocType) -> Self {
        let mut queue = VecDeque::new();
        queue.push_back(Pending::ContentTypes);
        queue.push_back(Pending::Rels {
            original: PackURI::from_member(""),
            canonical: PackURI::from_member(""),
            owner: Owner::Package,
        });
        Self {
            phys,
            doc_type,
            content_types: ContentTypes::new(),
            seen: HashMap::new(),
            counts: HashMap::new(),
            queue,
            strict: false,
        }
    }

    #[inline]
    pub fn doc_type(&self) -> DocType {
        self.doc_type
    }

    /// The content-type registry read from the archive.
    #[inline]
    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    /// How many parts of a kind have been routed so far.
    pub fn count(&self, kind: &PartKind) -> usize {
        self.counts.get(kind).copied().unwrap_or(0)
    }

    fn naming_content_type(&self, kind: &PartKind) -> Option<&'static str> {
        match kind {
            PartKind::OfficeDocument => Some(self.doc_type.main_content_type()),
            PartKind::Styles => self.doc_type.styles_content_type(),
            other => other.content_type(),
        }
    }

    /// Register `target` as the next part of `kind` and return its canonical name.
    ///
    /// A target already routed returns the name it was given the first time. Targets that are
    /// missing from the archive, that cannot be named, or whose bytes cannot be decoded as the
    /// kind requires are not routed (`None`) and stay in the archive as extra files.
    pub fn route(&mut self, kind: PartKind, target: &PackURI) -> Result<Option<PackURI>> {
        let key = target.as_str().to_ascii_lowercase();
        if let Some(canonical) = self.seen.get(&key) {
            return Ok(Some(canonical.clone()));
        }
        let phys = self.phys;
        let Some(position) = phys.position(target.membername()) else {
            warn!(target = %target, kind = ?kind, "relationship target is missing from the archive");
            return Ok(None);
        };
        let data = &phys.entry(position).data;
        let declared = self.content_types.resolve(target).map(str::to_string);
        let index = self.count(&kind) + 1;

        let (canonical, payload) = match &kind {
            PartKind::Image => {
                let format = ImageFormat::detect_from_bytes(data)
                    .or_else(|| declared.as_deref().and_then(ImageFormat::from_content_type))
                    .or_else(|| ImageFormat::from_extension(target.ext()));
                let Some(format) = format else {
                    warn!(target = %target, "unrecognised image format, keeping the part verbatim");
                    return Ok(None);
                };
                let canonical = naming::partname(self.doc_type, format.mime_type(), index)?;
                let image = ImagePart {
                    format,
                    data: data.clone(),
                };
                (canonical, Payload::Image(image))
            },
            PartKind::Thumbnail => {
                if index > 1 {
                    warn!(target = %target, "second package thumbnail ignored");
                    return Ok(None);
                }
                let content_type = declared
                    .or_else(|| {
                        ImageFormat::from_extension(target.ext()).map(|f| f.mime_type().to_string())
                    })
                    .unwrap_or_else(|| ImageFormat::Png.mime_type().to_string());
                let thumbnail = Thumbnail::decode(target.ext(), &content_type, data.clone());
                (thumbnail.partname()?, Payload::Thumbnail(thumbnail))
            },
            kind => {
                let Some(naming_type) = self.naming_content_type(kind) else {
                    warn!(target = %target, kind = ?kind, "no canonical name for part, keeping it verbatim");
                    return Ok(None);
                };
                let canonical = naming::partname(self.doc_type, naming_type, index)?;
                if index > 1 && naming::partname(self.doc_type, naming_type, 1)? == canonical {
                    warn!(target = %target, kind = ?kind, "duplicate single-instance part, keeping it verbatim");
                    return Ok(None);
                }
                let content_type = declared.unwrap_or_else(|| naming_type.to_string());
                match XmlPart::new(canonical.clone(), content_type, data.clone()) {
                    Ok(part) => (canonical, Payload::Xml(part)),
                    Err(e) => {
                        warn!(target = %target, error = %e, "part is not well-formed XML, keeping it verbatim");
                        return Ok(None);
                    },
                }
            },
        };

        if canonical.as_str() != target.as_str() {
            debug!(from = %target, to = %canonical, "part renamed");
        }
        self.counts.insert(kind.clone(), index);
        self.seen.insert(key, canonical.clone());
        self.queue.push_back(Pending::Part {
            original: target.clone(),
            position,
            slot: Slot { kind, index },
            payload,
        });
        Ok(Some(canonical))
    }
}

/// Outcome of a decode pass.
#[derive(Debug)]
pub struct Decoded {
    pub content_types: ContentTypes,
    pub conformance: Conformance,
    /// Archive positions of members nothing consumed, in archive order.
    pub leftovers: Vec<usize>,
    /// Lowercased original part name -> new name, for every routed part that moved.
    pub renamed: HashMap<String, PackURI>,
}

/// A relationship table read during the pass, held back until every part has its name.
struct HeldRels {
    owner: Owner,
    rels: Relationships,
    // resolved target of each entry, `None` for external or unusable targets
    targets: Vec<Option<PackURI>>,
    canonical_base: String,
}

/// The fixed-point discovery loop over one archive.
pub struct DecodeMap<'a> {
    ctx: DecodeContext<'a>,
    consumed: FixedBitSet,
    held: Vec<HeldRels>,
}

impl<'a> DecodeMap<'a> {
    pub fn new(phys: &'a PhysPkgReader, doc_type: DocType) -> Self {
        Self {
            ctx: DecodeContext::new(phys, doc_type),
            consumed: FixedBitSet::with_capacity(phys.len()),
            held: Vec::new(),
        }
    }

    pub fn run<H: DecodeHost>(mut self, host: &mut H) -> Result<Decoded> {
        while let Some(pending) = self.ctx.queue.pop_front() {
            match pending {
                Pending::ContentTypes => self.decode_content_types()?,
                Pending::Rels {
                    original,
                    canonical,
                    owner,
                } => self.decode_rels(host, original, canonical, owner)?,
                Pending::Part {
                    original,
                    position,
                    slot,
                    payload,
                } => {
                    self.consumed.insert(position);
                    match payload {
                        Payload::Xml(part) => {
                            if slot.kind == PartKind::OfficeDocument && declares_strict(&part) {
                                self.ctx.strict = true;
                            }
                            let canonical = part.partname().clone();
                            host.attach_part(&slot, part)?;
                            self.ctx.queue.push_back(Pending::Rels {
                                original,
                                canonical,
                                owner: Owner::Part(slot),
                            });
                        },
                        Payload::Image(image) => host.package().attach_image(image),
                        Payload::Thumbnail(thumbnail) => host.package().attach_thumbnail(thumbnail),
                    }
                },
            }
        }

        for held in std::mem::take(&mut self.held) {
            self.attach_rels(host, held)?;
        }

        let leftovers: Vec<usize> = (0..self.ctx.phys.len())
            .filter(|i| !self.consumed.contains(*i))
            .collect();
        debug!(
            parts = self.consumed.count_ones(..),
            extras = leftovers.len(),
            "decode finished"
        );
        let renamed = self
            .ctx
            .seen
            .into_iter()
            .filter(|(original, canonical)| !canonical.eq_ignore_case(original))
            .collect();

        Ok(Decoded {
            content_types: self.ctx.content_types,
            conformance: if self.ctx.strict {
                Conformance::Strict
            } else {
                Conformance::Transitional
            },
            leftovers,
            renamed,
        })
    }

    fn decode_content_types(&mut self) -> Result<()> {
        let Some(position) = self.ctx.phys.position(CONTENT_TYPES_URI) else {
            return Err(OpcError::MissingBootstrapPart(CONTENT_TYPES_URI[1..].to_string()));
        };
        self.consumed.insert(position);
        self.ctx.content_types = ContentTypes::from_xml(&self.ctx.phys.entry(position).data)?;
        Ok(())
    }

    fn decode_rels<H: DecodeHost>(
        &mut self,
        host: &mut H,
        original: PackURI,
        canonical: PackURI,
        owner: Owner,
    ) -> Result<()> {
        let rels_uri = original.rels_uri();
        let Some(position) = self.ctx.phys.position(rels_uri.membername()) else {
            if owner == Owner::Package {
                return Err(OpcError::MissingBootstrapPart(rels_uri.membername().to_string()));
            }
            return Ok(());
        };

        let base_uri = original.base_uri().to_string();
        let rels = match Relationships::from_xml(&self.ctx.phys.entry(position).data, &base_uri) {
            Ok(rels) => rels,
            Err(e) if owner != Owner::Package => {
                warn!(part = %rels_uri, error = %e, "unreadable relationships part, keeping it verbatim");
                return Ok(());
            },
            Err(e) => return Err(e),
        };
        self.consumed.insert(position);

        let mut targets = Vec::with_capacity(rels.len());
        for rel in rels.iter() {
            if rel.is_external() {
                targets.push(None);
                continue;
            }
            let target = match rel.target_partname() {
                Ok(target) => target,
                Err(e) => {
                    warn!(r_id = rel.r_id(), error = %e, "skipping relationship with unusable target");
                    targets.push(None);
                    continue;
                },
            };
            if owner == Owner::Package
                && rel.kind() == PartKind::OfficeDocument
                && PartKind::is_strict_reltype(rel.reltype())
            {
                self.ctx.strict = true;
            }

            host.on_relationship(&mut self.ctx, &owner, rel, &target)?;
            targets.push(Some(target));
        }

        self.held.push(HeldRels {
            owner,
            rels,
            targets,
            canonical_base: canonical.base_uri().to_string(),
        });
        Ok(())
    }

    /// Point every entry at the final name of its target, move the table next to its
    /// (possibly renamed) source and hand it to the host.
    fn attach_rels<H: DecodeHost>(&self, host: &mut H, held: HeldRels) -> Result<()> {
        let HeldRels {
            owner,
            mut rels,
            targets,
            canonical_base,
        } = held;
        let base_uri = rels.base_uri().to_string();
        for (i, target) in targets.iter().enumerate() {
            let Some(target) = target else {
                continue;
            };
            if let Some(moved) = self.ctx.seen.get(&target.as_str().to_ascii_lowercase())
                && moved != target
                && let Some(entry) = rels.at_mut(i)
            {
                entry.set_target_ref(moved.relative_ref(&base_uri));
            }
        }
        if canonical_base != base_uri {
            rels.rebase(&canonical_base)?;
        }
        host.attach_rels(&owner, rels)
    }
}

fn declares_strict(main: &XmlPart) -> bool {
    ["w:conformance", "conformance"].iter().any(|name| {
        main.root_attribute(name)
            .ok()
            .flatten()
            .is_some_and(|v| v.eq_ignore_ascii_case("strict"))
    })
}

impl OpcPackage {
    /// Routing shared by all roots: document properties, thumbnail, themes and images.
    ///
    /// Returns `Ok(None)` for kinds it does not handle so the caller can fall through.
    pub(crate) fn route_shared(
        ctx: &mut DecodeContext<'_>,
        owner: &Owner,
        kind: &PartKind,
        target: &PackURI,
    ) -> Result<Option<PackURI>> {
        match (owner, kind) {
            (
                Owner::Package,
                PartKind::CoreProperties
                | PartKind::ExtendedProperties
                | PartKind::CustomProperties
                | PartKind::Thumbnail,
            ) => ctx.route(kind.clone(), target),
            (Owner::Part(_), PartKind::Theme | PartKind::Image) => ctx.route(kind.clone(), target),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::config::{Compression, PackageConfig};
    use crate::ooxml::opc::constants::{content_type as ct, relationship_type as rt};
    use crate::ooxml::opc::phys_pkg::PhysPkgWriter;

    // A host that routes headers and images from the main part and records what it got.
    struct Recorder {
        package: OpcPackage,
        parts: Vec<(Slot, String)>,
        rels: Vec<(Owner, Vec<String>)>,
    }

    impl DecodeHost for Recorder {
        fn doc_type(&self) -> DocType {
            DocType::Document
        }

        fn on_relationship(
            &mut self,
            ctx: &mut DecodeContext<'_>,
            owner: &Owner,
            rel: &Relationship,
            target: &PackURI,
        ) -> Result<Option<PackURI>> {
            let kind = rel.kind();
            match (owner, &kind) {
                (Owner::Package, PartKind::OfficeDocument) => ctx.route(kind, target),
                (Owner::Part(_), PartKind::Header) => ctx.route(kind, target),
                _ => OpcPackage::route_shared(ctx, owner, &kind, target),
            }
        }

        fn attach_part(&mut self, slot: &Slot, part: XmlPart) -> Result<()> {
            self.parts.push((slot.clone(), part.partname().to_string()));
            Ok(())
        }

        fn attach_rels(&mut self, owner: &Owner, rels: Relationships) -> Result<()> {
            let targets = rels.iter().map(|r| r.target_ref().to_string()).collect();
            self.rels.push((owner.clone(), targets));
            Ok(())
        }

        fn package(&mut self) -> &mut OpcPackage {
            &mut self.package
        }
    }

    fn archive(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = PhysPkgWriter::in_memory(Compression::Stored);
        for (name, data) in members {
            writer.write(name, data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn content_types() -> String {
        format!(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="{}"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/word/document.xml" ContentType="{}"/><Override PartName="/word/header2.xml" ContentType="{}"/><Override PartName="/word/header1.xml" ContentType="{}"/></Types>"#,
            ct::OPC_RELATIONSHIPS,
            ct::WML_DOCUMENT_MAIN,
            ct::WML_HEADER,
            ct::WML_HEADER
        )
    }

    fn rels(entries: &[(&str, &str, &str)]) -> String {
        let mut xml = String::from(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for (id, reltype, target) in entries {
            xml.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
                id, reltype, target
            ));
        }
        xml.push_str("</Relationships>");
        xml
    }

    fn recorder() -> Recorder {
        Recorder {
            package: OpcPackage::for_reading(DocType::Document, PackageConfig::default()),
            parts: Vec::new(),
            rels: Vec::new(),
        }
    }

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n0000";

    #[test]
    fn test_discovery_order_renames_parts() {
        let ct = content_types();
        let root = rels(&[("rId1", rt::OFFICE_DOCUMENT, "word/document.xml")]);
        let doc_rels = rels(&[
            ("rId1", rt::HEADER, "header2.xml"),
            ("rId2", rt::HEADER, "header1.xml"),
            ("rId3", rt::IMAGE, "media/pic.png"),
            ("rId4", rt::IMAGE, "../word/media/pic.png"),
        ]);
        let data = archive(&[
            ("[Content_Types].xml", ct.as_bytes()),
            ("_rels/.rels", root.as_bytes()),
            ("word/document.xml", b"<w:document/>"),
            ("word/_rels/document.xml.rels", doc_rels.as_bytes()),
            ("word/header1.xml", b"<w:hdr>one</w:hdr>"),
            ("word/header2.xml", b"<w:hdr>two</w:hdr>"),
            ("word/media/pic.png", PNG),
            ("customXml/item1.xml", b"<x/>"),
        ]);
        let phys = PhysPkgReader::from_bytes(&data).unwrap();
        let mut host = recorder();
        let decoded = DecodeMap::new(&phys, DocType::Document).run(&mut host).unwrap();

        let names: Vec<_> = host.parts.iter().map(|(_, name)| name.as_str()).collect();
        assert_eq!(names, ["/word/document.xml", "/word/header1.xml", "/word/header2.xml"]);
        assert_eq!(host.parts[2].0, Slot { kind: PartKind::Header, index: 2 });

        let (_, doc_targets) = &host.rels[1];
        assert_eq!(
            doc_targets,
            &["header1.xml", "header2.xml", "media/image1.png", "media/image1.png"]
        );
        assert_eq!(host.package.images().len(), 1);

        assert_eq!(decoded.leftovers.len(), 1);
        assert_eq!(phys.entry(decoded.leftovers[0]).name, "customXml/item1.xml");
        assert_eq!(
            decoded.renamed.get("/word/header2.xml").map(PackURI::as_str),
            Some("/word/header1.xml")
        );
        assert_eq!(decoded.conformance, Conformance::Transitional);
    }

    #[test]
    fn test_missing_bootstrap_parts() {
        let root = rels(&[]);
        let data = archive(&[("_rels/.rels", root.as_bytes())]);
        let phys = PhysPkgReader::from_bytes(&data).unwrap();
        let err = DecodeMap::new(&phys, DocType::Document).run(&mut recorder()).unwrap_err();
        assert!(matches!(err, OpcError::MissingBootstrapPart(ref p) if p == "[Content_Types].xml"));

        let ct = content_types();
        let data = archive(&[("[Content_Types].xml", ct.as_bytes())]);
        let phys = PhysPkgReader::from_bytes(&data).unwrap();
        let err = DecodeMap::new(&phys, DocType::Document).run(&mut recorder()).unwrap_err();
        assert!(matches!(err, OpcError::MissingBootstrapPart(ref p) if p == "_rels/.rels"));
    }

    #[test]
    fn test_unknown_and_dangling_targets_are_left_alone() {
        let ct = content_types();
        let root = rels(&[
            ("rId1", rt::OFFICE_DOCUMENT, "word/document.xml"),
            ("rId2", "http://example.com/relationships/custom", "custom/data.bin"),
        ]);
        let doc_rels = rels(&[("rId1", rt::HEADER, "header9.xml")]);
        let data = archive(&[
            ("[Content_Types].xml", ct.as_bytes()),
            ("_rels/.rels", root.as_bytes()),
            ("word/document.xml", b"<w:document/>"),
            ("word/_rels/document.xml.rels", doc_rels.as_bytes()),
            ("custom/data.bin", b"\x00\x01"),
        ]);
        let phys = PhysPkgReader::from_bytes(&data).unwrap();
        let mut host = recorder();
        let decoded = DecodeMap::new(&phys, DocType::Document).run(&mut host).unwrap();

        assert_eq!(host.parts.len(), 1);
        assert_eq!(host.rels[0].1, ["word/document.xml", "custom/data.bin"]);
        assert_eq!(host.rels[1].1, ["header9.xml"]);
        assert_eq!(decoded.leftovers.len(), 1);
    }

    #[test]
    fn test_unrouted_relationship_follows_renamed_target() {
        let ct = content_types();
        let root = rels(&[("rId1", rt::OFFICE_DOCUMENT, "word/document.xml")]);
        let doc_rels = rels(&[
            ("rId1", rt::HEADER, "header2.xml"),
            ("rId2", rt::HEADER, "header1.xml"),
        ]);
        // header1 links to header2 with a relationship nobody routes
        let header1_rels = rels(&[("rId1", "http://example.com/relationships/peer", "header2.xml")]);
        let data = archive(&[
            ("[Content_Types].xml", ct.as_bytes()),
            ("_rels/.rels", root.as_bytes()),
            ("word/document.xml", b"<w:document/>"),
            ("word/_rels/document.xml.rels", doc_rels.as_bytes()),
            ("word/header1.xml", b"<w:hdr>one</w:hdr>"),
            ("word/_rels/header1.xml.rels", header1_rels.as_bytes()),
            ("word/header2.xml", b"<w:hdr>two</w:hdr>"),
        ]);
        let phys = PhysPkgReader::from_bytes(&data).unwrap();
        let mut host = recorder();
        DecodeMap::new(&phys, DocType::Document).run(&mut host).unwrap();

        // the old header1 is now header2 and its link points at the old header2, now header1
        let moved = Owner::Part(Slot { kind: PartKind::Header, index: 2 });
        let (_, targets) = host.rels.iter().find(|(owner, _)| owner == &moved).unwrap();
        assert_eq!(targets, &["header1.xml"]);
    }

    #[test]
    fn test_strict_main_part_pins_conformance() {
        let ct = content_types();
        let root = rels(&[(
            "rId1",
            "http://purl.oclc.org/ooxml/officeDocument/relationships/officeDocument",
            "word/document.xml",
        )]);
        let data = archive(&[
            ("[Content_Types].xml", ct.as_bytes()),
            ("_rels/.rels", root.as_bytes()),
            ("word/document.xml", br#"<w:document xmlns:w="urn:w"/>"#),
        ]);
        let phys = PhysPkgReader::from_bytes(&data).unwrap();
        let decoded = DecodeMap::new(&phys, DocType::Document).run(&mut recorder()).unwrap();
        assert_eq!(decoded.conformance, Conformance::Strict);
    }

    #[test]
    fn test_malformed_routed_part_stays_verbatim() {
        let ct = content_types();
        let root = rels(&[("rId1", rt::OFFICE_DOCUMENT, "word/document.xml")]);
        let doc_rels = rels(&[("rId1", rt::HEADER, "header1.xml")]);
        let data = archive(&[
            ("[Content_Types].xml", ct.as_bytes()),
            ("_rels/.rels", root.as_bytes()),
            ("word/document.xml", b"<w:document/>"),
            ("word/_rels/document.xml.rels", doc_rels.as_bytes()),
            ("word/header1.xml", b"<w:hdr><w:p></w:hdr>"),
        ]);
        let phys = PhysPkgReader::from_bytes(&data).unwrap();
        let mut host = recorder();
        let decoded = DecodeMap::new(&phys, DocType::Document).run(&mut host).unwrap();
        assert_eq!(host.parts.len(), 1);
        assert_eq!(decoded.leftovers.len(), 1);
    }
}
