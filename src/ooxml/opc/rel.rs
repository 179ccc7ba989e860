//! Relationship tables.
//!
//! Every source part (and the package itself) owns an independent, ordered table of
//! `(Id, Type, Target)` entries serialized as a `.rels` part. Entries keep the order they
//! were read or added in. A new ID is the first `rIdN` not in use, probing upward from
//! `N = len + 1`.

use std::collections::BTreeSet;

use fixedbitset::FixedBitSet;
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::common::xml::escape_xml;
use crate::ooxml::opc::constants::{namespace, target_mode};
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::kind::{Conformance, DocType, PartKind};
use crate::ooxml::opc::naming;
use crate::ooxml::opc::packuri::PackURI;

// rId numbers below this live in the bitset, anything above in the sparse set
const DENSE_LIMIT: usize = 1 << 16;

/// A single relationship from a source part to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    r_id: String,
    reltype: String,
    target_ref: String,
    base_uri: String,
    is_external: bool,
}

impl Relationship {
    pub fn new(
        r_id: String,
        reltype: String,
        target_ref: String,
        base_uri: String,
        is_external: bool,
    ) -> Self {
        Self {
            r_id,
            reltype,
            target_ref,
            base_uri,
            is_external,
        }
    }

    #[inline]
    pub fn r_id(&self) -> &str {
        &self.r_id
    }

    #[inline]
    pub fn reltype(&self) -> &str {
        &self.reltype
    }

    /// Relative part reference for internal relationships, URL for external ones.
    #[inline]
    pub fn target_ref(&self) -> &str {
        &self.target_ref
    }

    /// Directory of the source part that `target_ref` is relative to.
    #[inline]
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    #[inline]
    pub fn is_external(&self) -> bool {
        self.is_external
    }

    pub fn target_mode(&self) -> &'static str {
        if self.is_external {
            target_mode::EXTERNAL
        } else {
            target_mode::INTERNAL
        }
    }

    /// The part kind this relationship points at.
    pub fn kind(&self) -> PartKind {
        PartKind::from_reltype(&self.reltype)
    }

    /// Absolute target partname. External relationships have none.
    pub fn target_partname(&self) -> Result<PackURI> {
        if self.is_external {
            return Err(OpcError::InvalidRelationship(format!(
                "{} is external and has no target partname",
                self.r_id
            )));
        }
        PackURI::from_rel_ref(&self.base_uri, &self.target_ref)
    }

    /// The `N` of an `rIdN` identifier.
    pub fn number(&self) -> Option<u32> {
        rid_number(&self.r_id)
    }

    pub(crate) fn set_target_ref(&mut self, target_ref: String) {
        self.target_ref = target_ref;
    }

    pub(crate) fn set_reltype(&mut self, reltype: String) {
        self.reltype = reltype;
    }
}

fn rid_number(r_id: &str) -> Option<u32> {
    let digits = r_id.strip_prefix("rId")?;
    if digits.is_empty() {
        return None;
    }
    atoi_simd::parse::<u32>(digits.as_bytes()).ok().filter(|n| *n > 0)
}

/// Ordered collection of relationships from a single source.
#[derive(Debug, Clone)]
pub struct Relationships {
    base_uri: String,
    rels: Vec<Relationship>,
    // bit N set when rIdN is in use
    used: FixedBitSet,
    sparse: BTreeSet<u32>,
}

impl Relationships {
    /// Create an empty table for a source part living in `base_uri`.
    pub fn new<S: Into<String>>(base_uri: S) -> Self {
        Self {
            base_uri: base_uri.into(),
            rels: Vec::new(),
            used: FixedBitSet::with_capacity(64),
            sparse: BTreeSet::new(),
        }
    }

    /// Parse a `.rels` part, keeping document order.
    pub fn from_xml(xml: &[u8], base_uri: &str) -> Result<Self> {
        let mut rels = Self::new(base_uri);
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let mut r_id = None;
                    let mut reltype = None;
                    let mut target_ref = None;
                    let mut is_external = false;

                    for attr in e.attributes() {
                        let attr = attr?;
                        match attr.key.as_ref() {
                            b"Id" => r_id = Some(attr.unescape_value()?.into_owned()),
                            b"Type" => reltype = Some(attr.unescape_value()?.into_owned()),
                            b"Target" => target_ref = Some(attr.unescape_value()?.into_owned()),
                            b"TargetMode" => {
                                is_external = attr.unescape_value()? == target_mode::EXTERNAL
                            },
                            _ => {},
                        }
                    }

                    match (r_id, reltype, target_ref) {
                        (Some(id), Some(rt), Some(tr)) => {
                            rels.push(Relationship::new(
                                id,
                                rt,
                                tr,
                                base_uri.to_string(),
                                is_external,
                            ));
                        },
                        _ => tracing::warn!(base_uri, "skipping incomplete <Relationship> entry"),
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(OpcError::XmlError(format!("Rels parse error: {}", e))),
                _ => {},
            }
            buf.clear();
        }

        Ok(rels)
    }

    /// Serialize as a `.rels` part, entries in table order.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(128 + self.rels.len() * 160);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<Relationships xmlns="{}">"#,
            namespace::OPC_RELATIONSHIPS
        ));

        for rel in &self.rels {
            let mode = if rel.is_external() {
                r#" TargetMode="External""#
            } else {
                ""
            };
            xml.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}"{}/>"#,
                escape_xml(rel.r_id()),
                escape_xml(rel.reltype()),
                escape_xml(rel.target_ref()),
                mode
            ));
        }

        xml.push_str("</Relationships>");
        xml
    }

    #[inline]
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    fn push(&mut self, rel: Relationship) {
        if let Some(n) = rel.number() {
            self.mark(n);
        }
        self.rels.push(rel);
    }

    fn mark(&mut self, n: u32) {
        let n = n as usize;
        if n < DENSE_LIMIT {
            if n >= self.used.len() {
                self.used.grow((n + 1).max(self.used.len() * 2).min(DENSE_LIMIT));
            }
            self.used.insert(n);
        } else {
            self.sparse.insert(n as u32);
        }
    }

    fn unmark(&mut self, n: u32) {
        // duplicate ids from malformed input keep the number reserved
        if self.rels.iter().any(|rel| rel.number() == Some(n)) {
            return;
        }
        if (n as usize) < DENSE_LIMIT {
            self.used.set(n as usize, false);
        } else {
            self.sparse.remove(&n);
        }
    }

    fn is_used(&self, n: u32) -> bool {
        if (n as usize) < DENSE_LIMIT {
            self.used.contains(n as usize)
        } else {
            self.sparse.contains(&n)
        }
    }

    /// First number at or above `len + 1` that no `rIdN` in the table uses.
    fn next_number(&self) -> u32 {
        let mut n = self.rels.len() as u32 + 1;
        while self.is_used(n) {
            n += 1;
        }
        n
    }

    /// The ID the next added relationship will receive.
    pub fn next_r_id(&self) -> String {
        format!("rId{}", self.next_number())
    }

    fn allocate(&mut self, reltype: &str, target_ref: &str, is_external: bool) -> &Relationship {
        let rel = Relationship::new(
            self.next_r_id(),
            reltype.to_string(),
            target_ref.to_string(),
            self.base_uri.clone(),
            is_external,
        );
        self.push(rel);
        &self.rels[self.rels.len() - 1]
    }

    /// Append an internal relationship under a freshly allocated ID.
    ///
    /// ```
    /// use kumquat::ooxml::opc::Relationships;
    /// let mut rels = Relationships::new("/word");
    /// let rel = rels.add_relationship("http://example.com/rel", "target.xml");
    /// assert_eq!(rel.r_id(), "rId1");
    /// ```
    pub fn add_relationship(&mut self, reltype: &str, target_ref: &str) -> &Relationship {
        self.allocate(reltype, target_ref, false)
    }

    /// Append an external relationship (hyperlinks, linked images).
    pub fn add_external(&mut self, reltype: &str, url: &str) -> &Relationship {
        self.allocate(reltype, url, true)
    }

    /// Append a relationship whose target is the canonical file name of the `index`-th part
    /// of `content_type`, relative to a source part of `source_content_type`
    /// (empty for the package itself).
    pub fn add_auto_relationship(
        &mut self,
        doc_type: DocType,
        source_content_type: &str,
        index: usize,
        content_type: &str,
    ) -> Result<&Relationship> {
        let target = naming::relative_filename(doc_type, source_content_type, content_type, index)?;
        let reltype = PartKind::from_content_type(content_type)
            .reltype(Conformance::Transitional)
            .into_owned();
        Ok(self.add_relationship(&reltype, &target))
    }

    #[inline]
    pub fn get(&self, r_id: &str) -> Option<&Relationship> {
        self.rels.iter().find(|rel| rel.r_id == r_id)
    }

    pub fn get_mut(&mut self, r_id: &str) -> Option<&mut Relationship> {
        self.rels.iter_mut().find(|rel| rel.r_id == r_id)
    }

    /// Position-based access, for tables whose ids may repeat.
    pub(crate) fn at_mut(&mut self, index: usize) -> Option<&mut Relationship> {
        self.rels.get_mut(index)
    }

    /// Return the internal relationship of `reltype` to `target_ref`, adding it if missing.
    pub fn get_or_add(&mut self, reltype: &str, target_ref: &str) -> &Relationship {
        match self.rels.iter().position(|rel| {
            rel.reltype == reltype && rel.target_ref == target_ref && !rel.is_external
        }) {
            Some(pos) => &self.rels[pos],
            None => self.add_relationship(reltype, target_ref),
        }
    }

    /// The single relationship of a type. Zero or several matches are errors.
    pub fn part_with_reltype(&self, reltype: &str) -> Result<&Relationship> {
        let mut matching = self.rels.iter().filter(|rel| rel.reltype == reltype);
        match (matching.next(), matching.next()) {
            (Some(rel), None) => Ok(rel),
            (None, _) => Err(OpcError::RelationshipNotFound(format!(
                "No relationship of type '{}'",
                reltype
            ))),
            (Some(_), Some(_)) => Err(OpcError::InvalidRelationship(format!(
                "Multiple relationships of type '{}'",
                reltype
            ))),
        }
    }

    /// ID of the `n`-th (0-based) relationship of a type, in table order.
    pub fn find_rid_for_n(&self, n: usize, reltype: &str) -> Option<&str> {
        self.rels
            .iter()
            .filter(|rel| rel.reltype == reltype)
            .nth(n)
            .map(Relationship::r_id)
    }

    /// Duplicate an existing relationship's type and target under a new ID.
    pub fn copy_relationship(&mut self, r_id: &str) -> Option<&Relationship> {
        let source = self.get(r_id)?.clone();
        Some(self.allocate(&source.reltype, &source.target_ref, source.is_external))
    }

    /// Remove by ID. Returns whether the relationship existed.
    pub fn remove(&mut self, r_id: &str) -> bool {
        let Some(pos) = self.rels.iter().position(|rel| rel.r_id == r_id) else {
            return false;
        };
        let removed = self.rels.remove(pos);
        if let Some(n) = removed.number() {
            self.unmark(n);
        }
        true
    }

    /// Remove every relationship matching `pred`, returning how many were removed.
    pub fn remove_where<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&Relationship) -> bool,
    {
        let doomed: Vec<String> = self
            .rels
            .iter()
            .filter(|rel| pred(rel))
            .map(|rel| rel.r_id.clone())
            .collect();
        doomed.iter().filter(|r_id| self.remove(r_id)).count()
    }

    /// Re-express every internal target relative to a new source directory.
    /// Targets that do not resolve to a part name are left as they are.
    pub fn rebase(&mut self, new_base_uri: &str) -> Result<()> {
        PackURI::new(new_base_uri)?;
        for rel in &mut self.rels {
            if !rel.is_external {
                match PackURI::from_rel_ref(&rel.base_uri, &rel.target_ref) {
                    Ok(target) => rel.target_ref = target.relative_ref(new_base_uri),
                    Err(_) => tracing::warn!(r_id = %rel.r_id, "cannot rebase unresolvable target"),
                }
            }
            rel.base_uri = new_base_uri.to_string();
        }
        self.base_uri = new_base_uri.to_string();
        Ok(())
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter()
    }

    #[inline]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Relationship> {
        self.rels.iter_mut()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }
}

impl Default for Relationships {
    fn default() -> Self {
        Self::new("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::opc::constants::{content_type as ct, relationship_type as rt};
    use proptest::prelude::*;

    fn table_with_ids(ids: &[u32]) -> Relationships {
        let mut rels = Relationships::new("/word");
        for id in ids {
            rels.push(Relationship::new(
                format!("rId{}", id),
                rt::HEADER.to_string(),
                format!("header{}.xml", id),
                "/word".to_string(),
                false,
            ));
        }
        rels
    }

    #[test]
    fn test_next_id_after_contiguous_block() {
        let mut rels = table_with_ids(&[2, 3, 4]);
        assert_eq!(rels.add_relationship(rt::STYLES, "a.xml").r_id(), "rId5");
        assert_eq!(rels.add_relationship(rt::STYLES, "b.xml").r_id(), "rId6");
    }

    #[test]
    fn test_next_id_skips_survivors_above_length() {
        let mut rels = table_with_ids(&[1, 3, 5, 7]);
        assert_eq!(rels.add_relationship(rt::FOOTER, "f.xml").r_id(), "rId6");
        assert_eq!(rels.add_relationship(rt::FOOTER, "f.xml").r_id(), "rId8");
    }

    #[test]
    fn test_remove_first_keeps_order() {
        let mut rels = Relationships::new("/word");
        let a = rels.add_relationship(rt::STYLES, "styles.xml").r_id().to_string();
        rels.add_relationship(rt::SETTINGS, "settings.xml");
        rels.add_relationship(rt::NUMBERING, "numbering.xml");

        assert!(rels.remove(&a));
        assert!(!rels.remove(&a));
        let left: Vec<_> = rels.iter().map(|r| r.target_ref()).collect();
        assert_eq!(left, ["settings.xml", "numbering.xml"]);
        assert!(rels.get("rId2").is_some());
        assert!(rels.get("rId3").is_some());
        assert_eq!(rels.next_r_id(), "rId4");
    }

    #[test]
    fn test_find_rid_for_n() {
        let mut rels = Relationships::new("/word");
        rels.add_relationship(rt::HEADER, "header1.xml");
        rels.add_relationship(rt::FOOTER, "footer1.xml");
        rels.add_relationship(rt::HEADER, "header2.xml");

        assert_eq!(rels.find_rid_for_n(0, rt::HEADER), Some("rId1"));
        assert_eq!(rels.find_rid_for_n(1, rt::HEADER), Some("rId3"));
        assert_eq!(rels.find_rid_for_n(2, rt::HEADER), None);
    }

    #[test]
    fn test_copy_relationship() {
        let mut rels = Relationships::new("/word");
        rels.add_relationship(rt::IMAGE, "media/image1.png");
        let copy = rels.copy_relationship("rId1").unwrap();
        assert_eq!(copy.r_id(), "rId2");
        assert_eq!(copy.target_ref(), "media/image1.png");
        assert!(rels.copy_relationship("rId9").is_none());
    }

    #[test]
    fn test_auto_relationship_is_deterministic() {
        let mut rels = Relationships::new("/word");
        let first = rels
            .add_auto_relationship(DocType::Document, "", 2, ct::PNG)
            .unwrap()
            .target_ref()
            .to_string();
        let second = rels
            .add_auto_relationship(DocType::Document, "", 2, ct::PNG)
            .unwrap()
            .target_ref()
            .to_string();
        assert_eq!(first, second);
        assert_eq!(first, "word/media/image2.png");

        let header = rels
            .add_auto_relationship(DocType::Document, ct::WML_DOCUMENT_MAIN, 1, ct::WML_HEADER)
            .unwrap();
        assert_eq!(header.target_ref(), "header1.xml");
        assert_eq!(header.reltype(), rt::HEADER);
    }

    #[test]
    fn test_get_or_add() {
        let mut rels = Relationships::new("/word");
        assert_eq!(rels.get_or_add("type1", "target1").r_id(), "rId1");
        assert_eq!(rels.get_or_add("type1", "target1").r_id(), "rId1");
        assert_eq!(rels.get_or_add("type1", "target2").r_id(), "rId2");
    }

    #[test]
    fn test_xml_round_trip_keeps_order_and_mode() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/?a=1&amp;b=2" TargetMode="External"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;
        let rels = Relationships::from_xml(xml, "/word").unwrap();
        let ids: Vec<_> = rels.iter().map(Relationship::r_id).collect();
        assert_eq!(ids, ["rId7", "rId2"]);
        assert!(rels.get("rId7").unwrap().is_external());
        assert_eq!(rels.next_r_id(), "rId3");

        let again = Relationships::from_xml(rels.to_xml().as_bytes(), "/word").unwrap();
        assert_eq!(again.get("rId7").unwrap().target_ref(), "https://example.com/?a=1&b=2");
        assert_eq!(again.get("rId2").unwrap().target_mode(), target_mode::INTERNAL);
        assert!(rels.to_xml().contains(r#"TargetMode="External""#));
    }

    #[test]
    fn test_rebase() {
        let mut rels = Relationships::new("/word/glossary");
        rels.add_relationship(rt::STYLES, "styles.xml");
        rels.add_external(rt::HYPERLINK, "https://example.com");
        rels.rebase("/word").unwrap();
        assert_eq!(rels.get("rId1").unwrap().target_ref(), "glossary/styles.xml");
        assert_eq!(rels.get("rId2").unwrap().target_ref(), "https://example.com");
        assert_eq!(
            rels.get("rId1").unwrap().target_partname().unwrap().as_str(),
            "/word/glossary/styles.xml"
        );
    }

    #[test]
    fn test_huge_ids_do_not_grow_bitset() {
        let mut rels = table_with_ids(&[1, 4_000_000]);
        assert_eq!(rels.add_relationship(rt::IMAGE, "x.png").r_id(), "rId3");
        assert!(rels.used.len() <= DENSE_LIMIT);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add,
        Preload(u32),
        Remove(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => Just(Op::Add),
            1 => (1u32..200).prop_map(Op::Preload),
            2 => any::<usize>().prop_map(Op::Remove),
        ]
    }

    // linear-scan reference over the ids currently in the table
    fn reference_next(ids: &[u32]) -> u32 {
        (ids.len() as u32 + 1..).find(|n| !ids.contains(n)).unwrap()
    }

    proptest! {
        #[test]
        fn prop_allocation_matches_linear_scan(ops in proptest::collection::vec(op(), 1..120)) {
            let mut rels = Relationships::new("/word");
            let mut model: Vec<u32> = Vec::new();

            for op in ops {
                match op {
                    Op::Add => {
                        let expected = reference_next(&model);
                        let got = rels.add_relationship(rt::IMAGE, "x.png").number();
                        prop_assert_eq!(got, Some(expected));
                        model.push(expected);
                    }
                    Op::Preload(n) => {
                        rels.push(Relationship::new(
                            format!("rId{}", n),
                            rt::IMAGE.to_string(),
                            "x.png".to_string(),
                            "/word".to_string(),
                            false,
                        ));
                        model.push(n);
                    }
                    Op::Remove(i) => {
                        if !model.is_empty() {
                            let victim = rels.iter().nth(i % rels.len()).unwrap().r_id().to_string();
                            prop_assert!(rels.remove(&victim));
                            let n = rid_number(&victim).unwrap();
                            let pos = model.iter().position(|m| *m == n).unwrap();
                            model.remove(pos);
                        }
                    }
                }
                prop_assert_eq!(rels.next_r_id(), format!("rId{}", reference_next(&model)));
            }
        }
    }
}
