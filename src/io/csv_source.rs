use crate::error::AppError;
use crate::models::{Sheet, Workbook};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// CSV 读为单表工作簿, 非空单元格均为文本
pub fn read_csv(bytes: &[u8], sheet_name: &str) -> Result<Workbook, AppError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut sheet = Sheet::new(sheet_name);
    for (r, record) in reader.records().enumerate() {
        let record = record.map_err(|e| AppError::SpreadsheetLoad(e.to_string()))?;
        for (c, field) in record.iter().enumerate() {
            if !field.is_empty() {
                sheet.set_value(r as u32 + 1, c as u16 + 1, field);
            }
        }
    }
    Ok(Workbook::new(vec![sheet]))
}
