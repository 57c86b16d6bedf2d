use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};
use tracing::debug;

use crate::seaf::convert::error::{Result, ToolError};
use crate::seaf::convert::model::RawRow;

/// Sheet name paired with its rows keyed by header.
pub type RawSheet = (String, Vec<RawRow>);

/// Reads every sheet of a workbook. The first row of each sheet is the header
/// row; cells under an empty header are ignored.
pub fn read_sheets(path: &Path) -> Result<Vec<RawSheet>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let names: Vec<String> = workbook.sheet_names().to_owned();

    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = read_sheet(&mut workbook, &name)?;
        let rows = range_to_rows(&range);
        debug!(sheet = %name, rows = rows.len(), "read sheet");
        sheets.push((name, rows));
    }
    Ok(sheets)
}

fn read_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<calamine::Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| ToolError::InvalidWorkbook(format!("missing sheet '{name}'")))?;
    let range = range_result.map_err(ToolError::from)?;
    Ok(range)
}

fn range_to_rows(range: &calamine::Range<DataType>) -> Vec<RawRow> {
    let headers: Vec<String> = match range.rows().next() {
        Some(first_row) => first_row
            .iter()
            .map(|cell| cell_to_string(Some(cell)).unwrap_or_default())
            .collect(),
        None => return Vec::new(),
    };

    range
        .rows()
        .skip(1)
        .map(|row| {
            let mut values = RawRow::new();
            for (header, cell) in headers.iter().zip(row.iter()) {
                if header.trim().is_empty() {
                    continue;
                }
                let value = cell_to_string(Some(cell));
                let slot = values.entry(header.clone()).or_insert(None);
                if slot.is_none() {
                    *slot = value;
                }
            }
            values
        })
        .collect()
}

fn cell_to_string(cell: Option<&DataType>) -> Option<String> {
    match cell {
        Some(DataType::String(value)) => Some(value.clone()),
        Some(DataType::Float(value)) => Some(value.to_string()),
        Some(DataType::Int(value)) => Some(value.to_string()),
        Some(DataType::Bool(value)) => Some(value.to_string()),
        Some(DataType::Empty) | None => None,
        Some(other) => Some(other.to_string()),
    }
}
