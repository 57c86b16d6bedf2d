use std::path::Path;

use rust_xlsxwriter::{DocProperties, ExcelDateTime, Workbook};

use crate::seaf::convert::error::Result;
use crate::seaf::convert::flatten::WorkbookData;
use crate::seaf::convert::io::write_atomic;

/// Creation stamp written into every package so identical tables produce
/// identical bytes.
const CREATED: (u16, u8, u8) = (2000, 1, 1);

/// Writes the provided workbook data to the given path. Every cell is written
/// as a string so that identical tables produce identical files.
pub fn write_workbook(path: &Path, workbook: &WorkbookData) -> Result<()> {
    let buffer = workbook_bytes(workbook)?;
    write_atomic(path, &buffer)
}

/// Serialises workbook data into XLSX bytes.
pub fn workbook_bytes(workbook: &WorkbookData) -> Result<Vec<u8>> {
    let mut workbook_writer = Workbook::new();
    let (year, month, day) = CREATED;
    let created = ExcelDateTime::from_ymd(year, month, day)?;
    let properties = DocProperties::new().set_creation_datetime(&created);
    workbook_writer.set_properties(&properties);

    for table in &workbook.tables {
        let worksheet = workbook_writer.add_worksheet();
        worksheet.set_name(&table.sheet_name)?;

        for (col_idx, header) in table.columns.iter().enumerate() {
            worksheet.write_string(0, col_idx as u16, header)?;
        }

        for (row_idx, row) in table.rows.iter().enumerate() {
            for (col_idx, cell) in row.iter().enumerate() {
                if cell.is_empty() {
                    continue;
                }
                worksheet.write_string((row_idx + 1) as u32, col_idx as u16, cell)?;
            }
        }

        if !table.rows.is_empty() {
            let mut excel_table = rust_xlsxwriter::Table::new();
            excel_table.set_autofilter(true);
            let col_end = (table.columns.len() as u16).saturating_sub(1);
            worksheet.add_table(0, 0, table.rows.len() as u32, col_end, &excel_table)?;
        }
    }

    Ok(workbook_writer.save_to_buffer()?)
}
