//! DrawingML theme parts (`theme/theme{N}.xml`).
//!
//! Themes carry the color scheme, font pair and effect styles shared by every part of a
//! package. New presentations need one; documents and workbooks may add one through
//! [`OpcPackage::add_theme`](crate::ooxml::opc::OpcPackage::add_theme).
use crate::common::xml::escape_xml;
use crate::ooxml::opc::constants::namespace;

/// A theme built from a name, a heading/body font pair and a color scheme.
///
/// ```
/// use kumquat::ooxml::common::Theme;
///
/// let mut theme = Theme::new("Corporate");
/// theme.set_minor_font("Arial");
/// theme.color_scheme_mut().set_accent(0, "C00000");
/// assert!(theme.to_xml().contains(r#"<a:accent1><a:srgbClr val="C00000"/></a:accent1>"#));
/// ```
#[derive(Debug, Clone)]
pub struct Theme {
    name: String,
    /// Headings
    major_font: String,
    /// Body text
    minor_font: String,
    color_scheme: ColorScheme,
}

/// The 12 theme colors: dark 1, light 1, dark 2, light 2, six accents, hyperlink and followed
/// hyperlink. Values are `RRGGBB`.
#[derive(Debug, Clone)]
pub struct ColorScheme {
    name: String,
    dk1: String,
    lt1: String,
    dk2: String,
    lt2: String,
    accents: [String; 6],
    hlink: String,
    fol_hlink: String,
}

impl Theme {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            major_font: "Calibri Light".to_string(),
            minor_font: "Calibri".to_string(),
            color_scheme: ColorScheme::default(),
        }
    }

    /// The stock "Office Theme".
    pub fn office() -> Self {
        Self::new("Office Theme")
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn major_font(&self) -> &str {
        &self.major_font
    }

    pub fn set_major_font(&mut self, font: impl Into<String>) {
        self.major_font = font.into();
    }

    #[inline]
    pub fn minor_font(&self) -> &str {
        &self.minor_font
    }

    pub fn set_minor_font(&mut self, font: impl Into<String>) {
        self.minor_font = font.into();
    }

    pub fn color_scheme_mut(&mut self) -> &mut ColorScheme {
        &mut self.color_scheme
    }

    /// Serialize as a complete `a:theme` part.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(4096);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push_str(&format!(
            r#"<a:theme xmlns:a="{}" name="{}">"#,
            namespace::DML_MAIN,
            escape_xml(&self.name)
        ));
        xml.push_str("<a:themeElements>");

        self.color_scheme.write_xml(&mut xml);

        xml.push_str(r#"<a:fontScheme name="Office">"#);
        for (tag, font) in [("majorFont", &self.major_font), ("minorFont", &self.minor_font)] {
            xml.push_str(&format!(
                r#"<a:{0}><a:latin typeface="{1}"/><a:ea typeface=""/><a:cs typeface=""/></a:{0}>"#,
                tag,
                escape_xml(font)
            ));
        }
        xml.push_str("</a:fontScheme>");

        // three entries per list is the schema minimum
        xml.push_str(r#"<a:fmtScheme name="Office">"#);
        xml.push_str("<a:fillStyleLst>");
        xml.push_str(r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#);
        xml.push_str(r#"<a:gradFill rotWithShape="1"><a:gsLst><a:gs pos="0"><a:schemeClr val="phClr"><a:tint val="50000"/><a:satMod val="300000"/></a:schemeClr></a:gs><a:gs pos="35000"><a:schemeClr val="phClr"><a:tint val="37000"/><a:satMod val="300000"/></a:schemeClr></a:gs><a:gs pos="100000"><a:schemeClr val="phClr"><a:tint val="15000"/><a:satMod val="350000"/></a:schemeClr></a:gs></a:gsLst><a:lin ang="16200000" scaled="1"/></a:gradFill>"#);
        xml.push_str(r#"<a:gradFill rotWithShape="1"><a:gsLst><a:gs pos="0"><a:schemeClr val="phClr"><a:shade val="51000"/><a:satMod val="130000"/></a:schemeClr></a:gs><a:gs pos="100000"><a:schemeClr val="phClr"><a:shade val="94000"/><a:satMod val="135000"/></a:schemeClr></a:gs></a:gsLst><a:lin ang="16200000" scaled="0"/></a:gradFill>"#);
        xml.push_str("</a:fillStyleLst>");
        xml.push_str("<a:lnStyleLst>");
        for width in [9525, 25400, 38100] {
            xml.push_str(&format!(
                r#"<a:ln w="{}" cap="flat" cmpd="sng" algn="ctr"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:prstDash val="solid"/></a:ln>"#,
                width
            ));
        }
        xml.push_str("</a:lnStyleLst>");
        xml.push_str("<a:effectStyleLst>");
        for (dist, alpha) in [(20000, 38000), (23000, 35000), (23000, 35000)] {
            xml.push_str(&format!(
                r#"<a:effectStyle><a:effectLst><a:outerShdw blurRad="40000" dist="{}" dir="5400000" rotWithShape="0"><a:srgbClr val="000000"><a:alpha val="{}"/></a:srgbClr></a:outerShdw></a:effectLst></a:effectStyle>"#,
                dist, alpha
            ));
        }
        xml.push_str("</a:effectStyleLst>");
        xml.push_str("<a:bgFillStyleLst>");
        xml.push_str(r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#);
        xml.push_str(r#"<a:solidFill><a:schemeClr val="phClr"><a:tint val="95000"/></a:schemeClr></a:solidFill>"#);
        xml.push_str(r#"<a:gradFill rotWithShape="1"><a:gsLst><a:gs pos="0"><a:schemeClr val="phClr"><a:tint val="80000"/><a:satMod val="300000"/></a:schemeClr></a:gs><a:gs pos="100000"><a:schemeClr val="phClr"><a:shade val="30000"/><a:satMod val="200000"/></a:schemeClr></a:gs></a:gsLst><a:path path="circle"><a:fillToRect l="50000" t="50000" r="50000" b="50000"/></a:path></a:gradFill>"#);
        xml.push_str("</a:bgFillStyleLst>");
        xml.push_str("</a:fmtScheme>");

        xml.push_str("</a:themeElements>");
        xml.push_str("<a:objectDefaults/><a:extraClrSchemeLst/>");
        xml.push_str("</a:theme>");
        xml
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::office()
    }
}

impl ColorScheme {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dk1: "000000".to_string(),
            lt1: "FFFFFF".to_string(),
            dk2: "44546A".to_string(),
            lt2: "E7E6E6".to_string(),
            accents: [
                "4472C4".to_string(),
                "ED7D31".to_string(),
                "A5A5A5".to_string(),
                "FFC000".to_string(),
                "5B9BD5".to_string(),
                "70AD47".to_string(),
            ],
            hlink: "0563C1".to_string(),
            fol_hlink: "954F72".to_string(),
        }
    }

    /// Set accent `index` (0-5). Out-of-range indices are ignored.
    pub fn set_accent(&mut self, index: usize, color: impl Into<String>) {
        if let Some(accent) = self.accents.get_mut(index) {
            *accent = color.into();
        }
    }

    pub fn set_hyperlink(&mut self, color: impl Into<String>) {
        self.hlink = color.into();
    }

    fn write_xml(&self, xml: &mut String) {
        xml.push_str(&format!(r#"<a:clrScheme name="{}">"#, escape_xml(&self.name)));
        for (tag, color) in [
            ("dk1", &self.dk1),
            ("lt1", &self.lt1),
            ("dk2", &self.dk2),
            ("lt2", &self.lt2),
        ] {
            xml.push_str(&format!(r#"<a:{0}><a:srgbClr val="{1}"/></a:{0}>"#, tag, escape_xml(color)));
        }
        for (i, accent) in self.accents.iter().enumerate() {
            xml.push_str(&format!(
                r#"<a:accent{0}><a:srgbClr val="{1}"/></a:accent{0}>"#,
                i + 1,
                escape_xml(accent)
            ));
        }
        xml.push_str(&format!(r#"<a:hlink><a:srgbClr val="{}"/></a:hlink>"#, escape_xml(&self.hlink)));
        xml.push_str(&format!(
            r#"<a:folHlink><a:srgbClr val="{}"/></a:folHlink>"#,
            escape_xml(&self.fol_hlink)
        ));
        xml.push_str("</a:clrScheme>");
    }
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self::new("Office")
    }
}
