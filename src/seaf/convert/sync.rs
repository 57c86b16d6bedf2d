use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::seaf::convert::error::{Result, ToolError};
use crate::seaf::convert::flatten::{
    IngestOptions, document_to_workbooks, tables_to_document, translate_document,
};
use crate::seaf::convert::io::excel_read::{self, RawSheet};
use crate::seaf::convert::io::{excel_write, yaml};
use crate::seaf::convert::model::{EntityKind, Issue};
use crate::seaf::convert::normalize::NormalizerConfig;
use crate::seaf::convert::report::ConversionReport;
use crate::seaf::convert::schema::{Dialect, SchemaRegistry};
use crate::seaf::convert::validate::validate_document;

/// Converts one or more workbooks into a YAML document tree.
///
/// Directories contribute every `*.xlsx` file they contain. A workbook that
/// is missing or unreadable is reported and the remaining ones are still
/// converted.
#[instrument(
    level = "info",
    skip_all,
    fields(inputs = inputs.len(), output = %out_dir.display(), %dialect)
)]
pub fn excel_to_yaml(
    inputs: &[PathBuf],
    out_dir: &Path,
    dialect: Dialect,
    registry: &SchemaRegistry,
    options: &IngestOptions,
) -> Result<ConversionReport> {
    let mut issues = Vec::new();
    let mut sheets: Vec<RawSheet> = Vec::new();

    for path in expand_workbooks(inputs, &mut issues)? {
        match excel_read::read_sheets(&path) {
            Ok(read) => {
                debug!(path = %path.display(), sheet_count = read.len(), "read workbook");
                sheets.extend(read);
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable workbook");
                issues.push(Issue::SkippedInput {
                    path,
                    reason: err.to_string(),
                });
            }
        }
    }

    let conversion = tables_to_document(&sheets, registry, options);
    info!(
        entity_count = conversion.document.len(),
        issue_count = conversion.issues.len(),
        "built document from workbooks"
    );
    issues.extend(conversion.issues);

    let outputs = yaml::write_document(&conversion.document, registry, dialect, out_dir)?;
    let written = read_back(out_dir, dialect, registry)?;
    issues.extend(written.issues);
    Ok(ConversionReport::build(
        conversion.source_counts,
        written.document.counts(),
        issues,
        outputs,
    ))
}

/// Re-reads a freshly written tree through its root file so destination
/// counts reflect what is on disk.
fn read_back(
    out_dir: &Path,
    dialect: Dialect,
    registry: &SchemaRegistry,
) -> Result<yaml::LoadedDocument> {
    let root = out_dir.join(&registry.dialect(dialect)?.root_file);
    yaml::read_document(&root, registry)
}

fn expand_workbooks(inputs: &[PathBuf], issues: &mut Vec<Issue>) -> Result<Vec<PathBuf>> {
    let mut workbooks = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = Vec::new();
            for entry in fs::read_dir(input)? {
                let path = entry?.path();
                let is_workbook = path.extension().is_some_and(|ext| ext == "xlsx");
                let is_lock_file = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with("~$"));
                if path.is_file() && is_workbook && !is_lock_file {
                    found.push(path);
                }
            }
            found.sort();
            workbooks.extend(found);
        } else if input.is_file() {
            workbooks.push(input.clone());
        } else {
            warn!(path = %input.display(), "input workbook not found");
            issues.push(Issue::SkippedInput {
                path: input.clone(),
                reason: ToolError::MissingInput(input.clone()).to_string(),
            });
        }
    }
    Ok(workbooks)
}

/// Converts a YAML document tree into one workbook per sheet group.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), output = %out_dir.display())
)]
pub fn yaml_to_excel(
    input: &Path,
    out_dir: &Path,
    registry: &SchemaRegistry,
    normalizer: &NormalizerConfig,
) -> Result<ConversionReport> {
    let loaded = yaml::read_document(input, registry)?;
    info!(
        entity_count = loaded.document.len(),
        file_count = loaded.files.len(),
        "read document tree"
    );
    let mut issues = loaded.issues;
    issues.extend(validate_document(&loaded.document, registry));

    let workbooks = document_to_workbooks(&loaded.document, registry, normalizer)?;
    debug!(workbook_count = workbooks.len(), "workbooks constructed");

    let mut outputs = Vec::with_capacity(workbooks.len());
    let mut dest_counts: BTreeMap<EntityKind, usize> = BTreeMap::new();
    for workbook in &workbooks {
        let path = out_dir.join(workbook.group.default_file_name());
        excel_write::write_workbook(&path, workbook)?;
        for (kind, rows) in workbook.row_counts(registry) {
            *dest_counts.entry(kind).or_default() += rows;
        }
        outputs.push(path);
    }

    Ok(ConversionReport::build(
        loaded.document.counts(),
        dest_counts,
        issues,
        outputs,
    ))
}

/// Rewrites a YAML document tree under another dialect's keys and file names.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), output = %out_dir.display(), %target)
)]
pub fn translate_yaml(
    input: &Path,
    out_dir: &Path,
    target: Dialect,
    registry: &SchemaRegistry,
) -> Result<ConversionReport> {
    let loaded = yaml::read_document(input, registry)?;
    info!(
        entity_count = loaded.document.len(),
        dialects = ?loaded.dialects,
        "read document tree"
    );
    let source_counts = loaded.document.counts();
    let mut issues = loaded.issues;
    issues.extend(validate_document(&loaded.document, registry));

    let document = translate_document(loaded.document);
    let outputs = yaml::write_document(&document, registry, target, out_dir)?;
    let written = read_back(out_dir, target, registry)?;
    issues.extend(written.issues);
    Ok(ConversionReport::build(
        source_counts,
        written.document.counts(),
        issues,
        outputs,
    ))
}
