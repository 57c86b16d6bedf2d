//! Projection between the canonical document and spreadsheet tables.
//!
//! [`entities_to_rows`] and [`document_to_workbooks`] flatten a document into
//! sheets; the [`ingest`] submodule goes the other way.

pub mod ingest;

use std::collections::BTreeMap;

use crate::seaf::convert::error::{Result, ToolError};
use crate::seaf::convert::model::{Document, Entity, EntityKind, FieldValue, RawRow};
use crate::seaf::convert::normalize::{NormalizerConfig, flatten_newlines, serialize_list};
use crate::seaf::convert::schema::{KindSchema, SchemaRegistry, WorkbookGroup};

pub use ingest::{
    Conversion, IngestOptions, KindIngest, canonical_sheet_name, rows_to_entities,
    tables_to_document,
};

/// A table that will be materialised as an Excel sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub sheet_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetTable {
    /// Rows keyed by header, the shape the ingest side consumes.
    pub fn raw_rows(&self) -> Vec<RawRow> {
        self.rows
            .iter()
            .map(|cells| {
                self.columns
                    .iter()
                    .zip(cells)
                    .map(|(header, cell)| {
                        let value = (!cell.is_empty()).then(|| cell.clone());
                        (header.clone(), value)
                    })
                    .collect()
            })
            .collect()
    }
}

/// All sheets of one physical workbook.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkbookData {
    pub group: WorkbookGroup,
    pub tables: Vec<SheetTable>,
}

impl WorkbookData {
    /// Rows per kind; rows of shared sheets are counted under their class.
    pub fn row_counts(&self, registry: &SchemaRegistry) -> BTreeMap<EntityKind, usize> {
        let mut counts = BTreeMap::new();
        for table in &self.tables {
            for row in table.raw_rows() {
                if let Some(kind) = registry.kind_for_row(&table.sheet_name, &row) {
                    *counts.entry(kind).or_default() += 1;
                }
            }
        }
        counts
    }
}

/// Projects entities of one kind into a sheet. Rows are ordered by identifier
/// and list cells are sorted, so the output depends only on content.
pub fn entities_to_rows(
    entities: &[Entity],
    schema: &KindSchema,
    config: &NormalizerConfig,
) -> SheetTable {
    let mut ordered: Vec<&Entity> = entities.iter().collect();
    ordered.sort_by(|lhs, rhs| lhs.id.cmp(&rhs.id));

    let rows = ordered
        .into_iter()
        .map(|entity| {
            let mut cells = Vec::with_capacity(schema.columns.len() + 1);
            cells.push(entity.id.clone());
            for column in &schema.columns {
                cells.push(cell_value(entity.get(&column.field), config));
            }
            if let Some(class) = &schema.hooks.shared_sheet {
                cells.push(class.label.clone());
            }
            cells
        })
        .collect();

    SheetTable {
        sheet_name: schema.sheet.clone(),
        columns: schema.headers(),
        rows,
    }
}

fn cell_value(value: Option<&FieldValue>, config: &NormalizerConfig) -> String {
    match value {
        None => String::new(),
        Some(FieldValue::Integer(value)) => value.to_string(),
        Some(FieldValue::Text(value)) => flatten_newlines(value, &config.newline_separator),
        Some(FieldValue::List(items)) => serialize_list(items),
    }
}

/// Flattens a document into its workbooks. Workbooks whose kinds are all
/// empty are skipped; within a workbook every kind gets a sheet. Kinds that
/// share a sheet are merged into one table ordered by identifier.
pub fn document_to_workbooks(
    document: &Document,
    registry: &SchemaRegistry,
    config: &NormalizerConfig,
) -> Result<Vec<WorkbookData>> {
    let mut workbooks = Vec::new();
    for group in WorkbookGroup::ALL {
        let schemas = registry.kinds_in(group);
        if schemas
            .iter()
            .all(|schema| document.entities(schema.kind).is_empty())
        {
            continue;
        }
        let mut tables: Vec<SheetTable> = Vec::new();
        for schema in schemas {
            let table = entities_to_rows(document.entities(schema.kind), schema, config);
            match tables
                .iter_mut()
                .find(|existing| existing.sheet_name == table.sheet_name)
            {
                Some(shared) if shared.columns == table.columns => {
                    shared.rows.extend(table.rows);
                    shared.rows.sort();
                }
                Some(_) => {
                    return Err(ToolError::InvalidWorkbook(format!(
                        "kinds sharing sheet '{}' disagree on columns",
                        table.sheet_name
                    )));
                }
                None => tables.push(table),
            }
        }
        workbooks.push(WorkbookData { group, tables });
    }
    Ok(workbooks)
}

/// Moves a document between dialects. Content is unchanged; the dialect only
/// decides namespace keys and file names when the tree is written.
pub fn translate_document(document: Document) -> Document {
    document
}
