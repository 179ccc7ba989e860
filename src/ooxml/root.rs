//! Plumbing shared by `Document`, `Workbook` and `Presentation`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{info_span, warn};

use crate::ooxml::config::PackageConfig;
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::decode::DecodeHost;
use crate::ooxml::opc::error::OpcError;
use crate::ooxml::opc::kind::DocType;
use crate::ooxml::opc::naming;
use crate::ooxml::opc::part::XmlPart;
use crate::ooxml::opc::pkgreader::PackageReader;
use crate::ooxml::opc::validate::ValidationReport;

/// Where a package is read from.
pub(crate) enum Source<'a> {
    Bytes(&'a [u8]),
    Path(&'a Path),
}

/// Decode a package into `host` with the config's subscriber installed.
pub(crate) fn load<H: DecodeHost>(source: Source<'_>, host: &mut H, config: &PackageConfig) -> Result<()> {
    config.in_scope(|| {
        let _span = info_span!("open", doc_type = ?host.doc_type()).entered();
        let reader = match source {
            Source::Bytes(data) => PackageReader::from_bytes(data)?,
            Source::Path(path) => PackageReader::open(path)?,
        };
        reader.decode(host)?;
        Ok(())
    })
}

/// The decoded main part, checked against the content-type family the root expects.
pub(crate) fn require_main(
    main: Option<XmlPart>,
    doc_type: DocType,
    families: &[&str],
) -> Result<XmlPart> {
    let main = main.ok_or_else(|| {
        OpcError::PartNotFound(format!("main part {}", doc_type.main_partname()))
    })?;
    let content_type = main.content_type().to_ascii_lowercase();
    if !families.iter().any(|family| content_type.contains(family)) {
        return Err(OoxmlError::InvalidContentType {
            expected: doc_type.main_content_type().to_string(),
            got: main.content_type().to_string(),
        });
    }
    Ok(main)
}

/// Replace the XML of a single-instance part, creating it under its canonical name, or drop
/// it with `None`.
pub(crate) fn replace_single(
    slot: &mut Option<XmlPart>,
    doc_type: DocType,
    content_type: &str,
    xml: Option<Vec<u8>>,
) -> Result<()> {
    match (slot.as_mut(), xml) {
        (_, None) => *slot = None,
        (Some(part), Some(xml)) => part.set_blob(xml)?,
        (None, Some(xml)) => {
            let partname = naming::partname(doc_type, content_type, 1)?;
            *slot = Some(XmlPart::new(partname, content_type, xml)?);
        },
    }
    Ok(())
}

/// Create `path` and hand a buffered writer for it to `save`.
pub(crate) fn save_to_path<F>(path: &Path, save: F) -> Result<()>
where
    F: FnOnce(BufWriter<File>) -> Result<BufWriter<File>>,
{
    let file = File::create(path)?;
    let mut writer = save(BufWriter::new(file))?;
    writer.flush()?;
    Ok(())
}

/// Run `save` against an in-memory buffer.
pub(crate) fn save_to_vec<F>(save: F) -> Result<Vec<u8>>
where
    F: FnOnce(std::io::Cursor<Vec<u8>>) -> Result<std::io::Cursor<Vec<u8>>>,
{
    Ok(save(std::io::Cursor::new(Vec::new()))?.into_inner())
}

/// What a save-time validation pass found; logged, never fatal.
pub(crate) fn log_validation(report: &ValidationReport) {
    for issue in report.issues() {
        warn!(part = %issue.part, "{}", issue.message);
    }
}

/// Turn a validation report into the result of an explicit `validate()`.
pub(crate) fn into_result(report: ValidationReport) -> Result<()> {
    if report.is_empty() {
        Ok(())
    } else {
        Err(OoxmlError::Validation(report))
    }
}
