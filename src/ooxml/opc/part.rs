//! Parts handed to and produced by the engine.
//!
//! XML parts are kept as their serialized bytes plus their own relationship table; the
//! engine only ever needs a handful of structural queries on them, which are answered by
//! streaming over the bytes with `quick-xml` and `memchr`. Typed trees (properties, custom
//! properties) implement [`XmlTree`] and are converted at the edges.

use std::path::PathBuf;

use memchr::memmem;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use smallvec::SmallVec;
use tracing::warn;

pub use crate::ooxml::common::ImageFormat;
use crate::ooxml::opc::constants::namespace;
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::PackURI;
use crate::ooxml::opc::rel::Relationships;

/// A typed tree that can be unmarshaled from and marshaled to part XML.
pub trait XmlTree: Sized {
    fn from_xml(xml: &[u8]) -> Result<Self>;
    fn to_xml(&self) -> Result<Vec<u8>>;
}

/// Attributes of one element, qualified name to unescaped value.
pub type Attributes = SmallVec<[(String, String); 4]>;

/// Call `f` for each start or empty element in document order until it returns `false`.
fn for_each_element<F>(xml: &[u8], mut f: F) -> Result<()>
where
    F: FnMut(&BytesStart<'_>) -> Result<bool>,
{
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if !f(e)? {
                    return Ok(());
                }
            },
            Ok(Event::Eof) => return Ok(()),
            Err(e) => {
                return Err(OpcError::XmlError(format!(
                    "XML parse error at byte {}: {}",
                    reader.error_position(),
                    e
                )));
            },
            _ => {},
        }
        buf.clear();
    }
}

fn collect_attributes(e: &BytesStart<'_>) -> Result<Attributes> {
    let mut attrs = Attributes::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        attrs.push((key, attr.unescape_value()?.into_owned()));
    }
    Ok(attrs)
}

/// Byte offsets of one element in serialized XML.
struct ElementSpan {
    qname: Vec<u8>,
    // `<` of the start tag
    start: usize,
    // `>` of the start tag
    gt: usize,
    // `</` of the end tag, `None` for an empty element
    close: Option<usize>,
}

// Last element with this local name in document order.
fn locate_last(xml: &[u8], local_name: &str) -> Result<Option<ElementSpan>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    // start offsets of the open elements
    let mut open: Vec<usize> = Vec::new();
    let mut last: Option<ElementSpan> = None;
    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if e.local_name().as_ref() == local_name.as_bytes() {
                    last = Some(ElementSpan {
                        qname: e.name().as_ref().to_vec(),
                        start: before,
                        gt: reader.buffer_position() as usize - 1,
                        close: None,
                    });
                }
                open.push(before);
            },
            Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == local_name.as_bytes() {
                    last = Some(ElementSpan {
                        qname: e.name().as_ref().to_vec(),
                        start: before,
                        gt: reader.buffer_position() as usize - 1,
                        close: None,
                    });
                }
            },
            Ok(Event::End(_)) => {
                if let Some(start) = open.pop()
                    && let Some(span) = last.as_mut()
                    && span.start == start
                {
                    span.close = Some(before);
                }
            },
            Ok(Event::Eof) => return Ok(last),
            Err(e) => {
                return Err(OpcError::XmlError(format!(
                    "XML parse error at byte {}: {}",
                    reader.error_position(),
                    e
                )));
            },
            _ => {},
        }
        buf.clear();
    }
}

/// An XML part with its own relationship table.
#[derive(Debug, Clone)]
pub struct XmlPart {
    partname: PackURI,
    content_type: String,
    xml: Vec<u8>,
    rels: Relationships,
}

impl XmlPart {
    /// Create a part from serialized XML. The XML must parse and contain a root element.
    pub fn new<S: Into<String>>(partname: PackURI, content_type: S, xml: Vec<u8>) -> Result<Self> {
        check_root(&xml, &partname)?;
        let rels = Relationships::new(partname.base_uri());
        Ok(Self {
            partname,
            content_type: content_type.into(),
            xml,
            rels,
        })
    }

    /// Create a part by marshaling a typed tree.
    pub fn from_tree<T: XmlTree, S: Into<String>>(
        partname: PackURI,
        content_type: S,
        tree: &T,
    ) -> Result<Self> {
        Self::new(partname, content_type, tree.to_xml()?)
    }

    /// Unmarshal the part into a typed tree.
    pub fn parse<T: XmlTree>(&self) -> Result<T> {
        T::from_xml(&self.xml)
    }

    #[inline]
    pub fn partname(&self) -> &PackURI {
        &self.partname
    }

    /// Move the part. Its relationship targets are rewritten to stay pointed at the same parts.
    pub fn set_partname(&mut self, partname: PackURI) -> Result<()> {
        if partname.base_uri() != self.partname.base_uri() {
            self.rels.rebase(partname.base_uri())?;
        }
        self.partname = partname;
        Ok(())
    }

    #[inline]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn set_content_type<S: Into<String>>(&mut self, content_type: S) {
        self.content_type = content_type.into();
    }

    #[inline]
    pub fn blob(&self) -> &[u8] {
        &self.xml
    }

    /// Replace the XML. Rejected when it does not parse.
    pub fn set_blob(&mut self, xml: Vec<u8>) -> Result<()> {
        check_root(&xml, &self.partname)?;
        self.xml = xml;
        Ok(())
    }

    #[inline]
    pub fn rels(&self) -> &Relationships {
        &self.rels
    }

    #[inline]
    pub fn rels_mut(&mut self) -> &mut Relationships {
        &mut self.rels
    }

    pub(crate) fn set_rels(&mut self, rels: Relationships) {
        self.rels = rels;
    }

    /// rId of the internal relationship to `target_ref`, adding it if needed.
    pub fn relate_to(&mut self, target_ref: &str, reltype: &str) -> String {
        self.rels.get_or_add(reltype, target_ref).r_id().to_string()
    }

    /// Qualified name of the root element.
    pub fn root_name(&self) -> Result<String> {
        let mut name = None;
        for_each_element(&self.xml, |e| {
            name = Some(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            Ok(false)
        })?;
        name.ok_or_else(|| OpcError::XmlError(format!("{} has no root element", self.partname)))
    }

    /// Value of an attribute (by qualified name) on the root element.
    pub fn root_attribute(&self, name: &str) -> Result<Option<String>> {
        let mut value = None;
        for_each_element(&self.xml, |e| {
            value = collect_attributes(e)?
                .into_iter()
                .find(|(key, _)| key == name)
                .map(|(_, v)| v);
            Ok(false)
        })?;
        Ok(value)
    }

    /// Attributes of every element with the given local name, in document order.
    pub fn find_elements_with_attrs(&self, local_name: &str) -> Result<Vec<Attributes>> {
        let mut results = Vec::new();
        for_each_element(&self.xml, |e| {
            if e.local_name().as_ref() == local_name.as_bytes() {
                results.push(collect_attributes(e)?);
            }
            Ok(true)
        })?;
        Ok(results)
    }

    /// Number of attribute values in the XML equal to `r_id`.
    pub fn rel_ref_count(&self, r_id: &str) -> usize {
        let double = format!("\"{}\"", r_id);
        let single = format!("'{}'", r_id);
        memmem::find_iter(&self.xml, double.as_bytes()).count()
            + memmem::find_iter(&self.xml, single.as_bytes()).count()
    }

    /// Every attribute value in a relationships namespace (`r:id`, `r:embed`, `r:link`, ...).
    pub fn relationship_refs(&self) -> Result<Vec<String>> {
        let mut prefixes: SmallVec<[Vec<u8>; 2]> = SmallVec::new();
        let mut refs = Vec::new();
        for_each_element(&self.xml, |e| {
            let attrs = collect_attributes(e)?;
            for (key, value) in &attrs {
                if let Some(prefix) = key.strip_prefix("xmlns:") {
                    if value == namespace::OFC_RELATIONSHIPS
                        || value == namespace::OFC_RELATIONSHIPS_STRICT
                    {
                        prefixes.push(prefix.as_bytes().to_vec());
                    }
                }
            }
            for (key, value) in attrs {
                if let Some((prefix, _)) = key.split_once(':') {
                    if prefix != "xmlns" && prefixes.iter().any(|p| p == prefix.as_bytes()) {
                        refs.push(value);
                    }
                }
            }
            Ok(true)
        })?;
        Ok(refs)
    }

    /// Insert `fragment` as the last child of the last element named `parent_local_name`.
    /// A self-closing parent is expanded.
    pub fn append_child(&mut self, parent_local_name: &str, fragment: &str) -> Result<()> {
        let span = self.locate(parent_local_name)?;
        let mut out = Vec::with_capacity(self.xml.len() + fragment.len() + span.qname.len() + 3);
        match span.close {
            Some(close) => {
                out.extend_from_slice(&self.xml[..close]);
                out.extend_from_slice(fragment.as_bytes());
                out.extend_from_slice(&self.xml[close..]);
            },
            None => self.expand_empty(&span, fragment, &mut out),
        }
        self.set_blob(out)
    }

    /// Insert `fragment` as the first child of the last element named `parent_local_name`.
    pub fn insert_first_child(&mut self, parent_local_name: &str, fragment: &str) -> Result<()> {
        let span = self.locate(parent_local_name)?;
        let mut out = Vec::with_capacity(self.xml.len() + fragment.len() + span.qname.len() + 3);
        match span.close {
            Some(_) => {
                out.extend_from_slice(&self.xml[..=span.gt]);
                out.extend_from_slice(fragment.as_bytes());
                out.extend_from_slice(&self.xml[span.gt + 1..]);
            },
            None => self.expand_empty(&span, fragment, &mut out),
        }
        self.set_blob(out)
    }

    /// Insert `fragment` immediately before the last element named `sibling_local_name`.
    pub fn insert_before(&mut self, sibling_local_name: &str, fragment: &str) -> Result<()> {
        let span = self.locate(sibling_local_name)?;
        let mut out = Vec::with_capacity(self.xml.len() + fragment.len());
        out.extend_from_slice(&self.xml[..span.start]);
        out.extend_from_slice(fragment.as_bytes());
        out.extend_from_slice(&self.xml[span.start..]);
        self.set_blob(out)
    }

    // `<a .../>` becomes `<a ...>fragment</a>`.
    fn expand_empty(&self, span: &ElementSpan, fragment: &str, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.xml[..span.gt - 1]);
        out.push(b'>');
        out.extend_from_slice(fragment.as_bytes());
        out.extend_from_slice(b"</");
        out.extend_from_slice(&span.qname);
        out.push(b'>');
        out.extend_from_slice(&self.xml[span.gt + 1..]);
    }

    fn locate(&self, local_name: &str) -> Result<ElementSpan> {
        locate_last(&self.xml, local_name)?.ok_or_else(|| {
            OpcError::PartNotFound(format!("<{}> in {}", local_name, self.partname))
        })
    }
}

fn check_root(xml: &[u8], partname: &PackURI) -> Result<()> {
    let mut seen = false;
    for_each_element(xml, |_| {
        seen = true;
        Ok(true)
    })?;
    if seen {
        Ok(())
    } else {
        Err(OpcError::XmlError(format!("{} has no root element", partname)))
    }
}

/// A media part. Its file name is derived from its position in the owning list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePart {
    pub format: ImageFormat,
    pub data: Vec<u8>,
}

impl ImagePart {
    /// Sniff the format from the bytes.
    pub fn from_bytes(data: Vec<u8>) -> Option<Self> {
        let format = ImageFormat::detect_from_bytes(&data)?;
        Some(Self { format, data })
    }
}

/// The package thumbnail (`docProps/thumbnail.*`).
///
/// With the `thumbnails` feature the image is decoded on read and re-encoded on save.
/// Thumbnails that cannot be decoded (or whose format has no encoder) are written back verbatim.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    extension: String,
    content_type: String,
    data: Vec<u8>,
    #[cfg(feature = "thumbnails")]
    image: Option<image::DynamicImage>,
}

impl Thumbnail {
    pub fn decode(extension: &str, content_type: &str, data: Vec<u8>) -> Self {
        #[cfg(feature = "thumbnails")]
        let image = match image::load_from_memory(&data) {
            Ok(img) => Some(img),
            Err(e) => {
                warn!(error = %e, "thumbnail could not be decoded, keeping raw bytes");
                None
            },
        };
        #[cfg(not(feature = "thumbnails"))]
        warn!("thumbnail decoding disabled, keeping raw bytes");

        Self {
            extension: extension.to_ascii_lowercase(),
            content_type: content_type.to_string(),
            data,
            #[cfg(feature = "thumbnails")]
            image,
        }
    }

    /// A PNG thumbnail from an already encoded image.
    pub fn from_png(data: Vec<u8>) -> Self {
        Self::decode("png", ImageFormat::Png.mime_type(), data)
    }

    pub fn partname(&self) -> Result<PackURI> {
        PackURI::new(format!("/docProps/thumbnail.{}", self.extension))
    }

    #[inline]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    #[inline]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Bytes as read.
    #[inline]
    pub fn raw(&self) -> &[u8] {
        &self.data
    }

    /// Whether the image was decoded.
    pub fn is_decoded(&self) -> bool {
        #[cfg(feature = "thumbnails")]
        {
            self.image.is_some()
        }
        #[cfg(not(feature = "thumbnails"))]
        {
            false
        }
    }

    /// Bytes to write.
    pub fn encode(&self) -> Result<Vec<u8>> {
        #[cfg(feature = "thumbnails")]
        if let Some(img) = &self.image {
            let target = match ImageFormat::from_extension(&self.extension) {
                Some(ImageFormat::Png) => Some(image::ImageFormat::Png),
                Some(ImageFormat::Jpeg) => Some(image::ImageFormat::Jpeg),
                Some(ImageFormat::Gif) => Some(image::ImageFormat::Gif),
                Some(ImageFormat::Bmp) => Some(image::ImageFormat::Bmp),
                Some(ImageFormat::Tiff) => Some(image::ImageFormat::Tiff),
                _ => None,
            };
            if let Some(format) = target {
                let mut buffer = std::io::Cursor::new(Vec::new());
                // the JPEG encoder has no alpha channel
                if format == image::ImageFormat::Jpeg {
                    image::DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut buffer, format)?;
                } else {
                    img.write_to(&mut buffer, format)?;
                }
                return Ok(buffer.into_inner());
            }
        }
        Ok(self.data.clone())
    }
}

/// An archive member nothing in the model claimed, staged on disk for byte-exact rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraFile {
    /// Member name as found in the archive.
    pub zip_path: String,
    pub disk_path: PathBuf,
}
