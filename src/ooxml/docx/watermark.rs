//! Watermark header written when the save policy asks for one.
//!
//! The mark is a VML text path rotated 315 degrees inside a header paragraph, the shape Word
//! itself uses for "printed watermarks".
use crate::common::xml::escape_xml;
use crate::ooxml::opc::constants::namespace;

/// A diagonal text watermark.
///
/// ```
/// use kumquat::ooxml::docx::Watermark;
///
/// let mut watermark = Watermark::text("CONFIDENTIAL");
/// watermark.set_font("Arial");
/// assert_eq!(watermark.get_text(), "CONFIDENTIAL");
/// ```
#[derive(Debug, Clone)]
pub struct Watermark {
    text: String,
    /// Font family (default: Cambria)
    font: String,
    /// VML fill color, a name or `RRGGBB` (default: silver)
    color: String,
}

impl Watermark {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font: "Cambria".to_string(),
            color: "silver".to_string(),
        }
    }

    pub fn set_font(&mut self, font: impl Into<String>) {
        self.font = font.into();
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.color = color.into();
    }

    #[inline]
    pub fn get_text(&self) -> &str {
        &self.text
    }

    /// The header paragraph carrying the shape. `idx` keeps shape ids unique per header.
    ///
    /// The paragraph declares the namespaces it uses, so it can be spliced into any header.
    pub(crate) fn to_paragraph_xml(&self, idx: usize) -> String {
        let mut xml = String::with_capacity(2048);

        xml.push_str(&format!(
            r#"<w:p xmlns:w="{}" xmlns:v="{}" xmlns:o="{}">"#,
            namespace::WML_MAIN,
            namespace::VML,
            namespace::OFFICE
        ));
        xml.push_str(r#"<w:pPr><w:pStyle w:val="Header"/></w:pPr>"#);
        xml.push_str(r#"<w:r><w:rPr><w:noProof/></w:rPr><w:pict>"#);

        // no v:group wrapper, Word drops grouped watermarks
        xml.push_str(r#"<v:shapetype id="_x0000_t136" coordsize="21600,21600" o:spt="136" adj="10800" path="m@7,l@8,m@5,21600l@6,21600e">"#);
        xml.push_str(r#"<v:formulas>"#);
        for eqn in [
            "sum #0 0 10800",
            "prod #0 2 1",
            "sum 21600 0 @1",
            "sum 0 0 @2",
            "sum 21600 0 @3",
            "if @0 @3 0",
            "if @0 21600 @1",
            "if @0 0 @2",
            "if @0 @4 21600",
            "mid @5 @6",
            "mid @8 @5",
            "mid @7 @8",
            "mid @6 @7",
            "sum @6 0 @5",
        ] {
            xml.push_str(&format!(r#"<v:f eqn="{}"/>"#, eqn));
        }
        xml.push_str(r#"</v:formulas>"#);
        xml.push_str(r#"<v:path textpathok="t" o:connecttype="custom" "#);
        xml.push_str(r#"o:connectlocs="@9,0;@10,10800;@11,21600;@12,10800" "#);
        xml.push_str(r#"o:connectangles="270,180,90,0"/>"#);
        xml.push_str(r#"<v:textpath on="t" fitshape="t"/>"#);
        xml.push_str(r##"<v:handles><v:h position="#0,bottomRight" xrange="6629,14971"/></v:handles>"##);
        xml.push_str(r#"<o:lock v:ext="edit" text="t" shapetype="t"/>"#);
        xml.push_str(r#"</v:shapetype>"#);

        xml.push_str(&format!(
            r##"<v:shape id="PowerPlusWaterMarkObject{}" o:spid="_x0000_s{}" type="#_x0000_t136" "##,
            idx,
            2048 + idx
        ));
        xml.push_str(r#"style="position:absolute;margin-left:0;margin-top:0;width:439.9pt;height:219.95pt;"#);
        xml.push_str(r#"rotation:315;z-index:-251655168;"#);
        xml.push_str(r#"mso-position-horizontal:center;mso-position-horizontal-relative:margin;"#);
        xml.push_str(r#"mso-position-vertical:center;mso-position-vertical-relative:margin" "#);
        xml.push_str(r#"o:allowincell="f" "#);
        let is_hex = self.color.len() == 6 && self.color.bytes().all(|b| b.is_ascii_hexdigit());
        let fill = if is_hex {
            format!("#{}", self.color)
        } else {
            self.color.clone()
        };
        xml.push_str(&format!(r#"fillcolor="{}" stroked="f">"#, escape_xml(&fill)));
        xml.push_str(r#"<v:fill opacity=".5"/>"#);
        // font-size stays 1pt; the shape box sets the rendered size
        xml.push_str(&format!(
            r#"<v:textpath style="font-family:&quot;{}&quot;;font-size:1pt" string="{}"/>"#,
            escape_xml(&self.font),
            escape_xml(&self.text)
        ));
        xml.push_str(r#"</v:shape>"#);

        xml.push_str(r#"</w:pict></w:r></w:p>"#);
        xml
    }

    /// A complete header part holding only the watermark.
    pub(crate) fn to_header_xml(&self, idx: usize) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:hdr xmlns:w="{}" xmlns:r="{}" xmlns:v="{}" xmlns:o="{}">{}</w:hdr>"#,
            namespace::WML_MAIN,
            namespace::OFC_RELATIONSHIPS,
            namespace::VML,
            namespace::OFFICE,
            self.to_paragraph_xml(idx)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watermark_customization() {
        let mut wm = Watermark::text("DRAFT & FINAL");
        wm.set_font("Arial");
        wm.set_color("FF0000");

        let xml = wm.to_paragraph_xml(1);
        assert!(xml.contains(r#"string="DRAFT &amp; FINAL""#));
        assert!(xml.contains("Arial"));
        assert!(xml.contains(r##"fillcolor="#FF0000""##));
        assert!(xml.contains("PowerPlusWaterMarkObject1"));
    }

    #[test]
    fn test_header_part_is_well_formed() {
        let xml = Watermark::text("TEST").to_header_xml(3);
        let part = crate::ooxml::opc::XmlPart::new(
            crate::ooxml::opc::PackURI::new("/word/header3.xml").unwrap(),
            "application/xml",
            xml.into_bytes(),
        )
        .unwrap();
        assert_eq!(part.root_name().unwrap(), "w:hdr");
        assert_eq!(part.find_elements_with_attrs("shape").unwrap().len(), 1);
    }
}
