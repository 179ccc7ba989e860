//! Minimal valid parts for a new presentation: one master, one blank layout, no slides.

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

const DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const EMPTY_TREE: &str = r#"<p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr></p:spTree>"#;

/// 16:9, 12192000 x 6858000 EMU.
pub(crate) fn presentation_xml(master_r_id: &str) -> String {
    format!(
        r#"{}<p:presentation {} saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="{}"/></p:sldMasterIdLst><p:sldSz cx="12192000" cy="6858000"/><p:notesSz cx="6858000" cy="9144000"/><p:defaultTextStyle><a:defPPr><a:defRPr lang="en-US"/></a:defPPr></p:defaultTextStyle></p:presentation>"#,
        DECLARATION, NS, master_r_id
    )
}

pub(crate) fn slide_master_xml(layout_r_id: &str) -> String {
    format!(
        r#"{}<p:sldMaster {}><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg>{}</p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="{}"/></p:sldLayoutIdLst><p:txStyles><p:titleStyle/><p:bodyStyle/><p:otherStyle/></p:txStyles></p:sldMaster>"#,
        DECLARATION, NS, EMPTY_TREE, layout_r_id
    )
}

pub(crate) fn slide_layout_xml() -> String {
    format!(
        r#"{}<p:sldLayout {} type="blank" preserve="1"><p:cSld name="Blank">{}</p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#,
        DECLARATION, NS, EMPTY_TREE
    )
}

pub(crate) fn slide_xml() -> String {
    format!(
        r#"{}<p:sld {}><p:cSld>{}</p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#,
        DECLARATION, NS, EMPTY_TREE
    )
}

pub(crate) fn pres_props_xml() -> String {
    format!(r#"{}<p:presentationPr {}/>"#, DECLARATION, NS)
}

pub(crate) fn view_props_xml() -> String {
    format!(
        r#"{}<p:viewPr {}><p:normalViewPr><p:restoredLeft sz="15620"/><p:restoredTop sz="94660"/></p:normalViewPr><p:gridSpacing cx="76200" cy="76200"/></p:viewPr>"#,
        DECLARATION, NS
    )
}

/// Empty table style list pointing at "Medium Style 2 - Accent 1".
pub(crate) fn table_styles_xml() -> String {
    format!(
        r#"{}<a:tblStyleLst xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" def="{{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}}"/>"#,
        DECLARATION
    )
}
