//! xlsx 读取 (calamine) 与写出 (rust_xlsxwriter)

use crate::error::AppError;
use crate::models::{Cell, CellValue, Sheet, Workbook};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_xlsxwriter::{Color, Format, FormatPattern, Workbook as XlsxWorkbook, XlsxError};
use std::io::Cursor;

const DATE_FORMAT: &str = "dd/mm/yyyy";

fn to_cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(CellValue::Date)
            .unwrap_or(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

/// 读取全部工作表, 第一个表为活动表
pub fn read_workbook(bytes: &[u8]) -> Result<Workbook, AppError> {
    let mut book = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| AppError::SpreadsheetLoad(e.to_string()))?;

    let mut sheets = Vec::new();
    for name in book.sheet_names() {
        let range = book
            .worksheet_range(&name)
            .map_err(|e| AppError::SpreadsheetLoad(format!("{}: {}", name, e)))?;

        let mut sheet = Sheet::new(name.as_str());
        let (row0, col0) = range.start().unwrap_or((0, 0));
        for (r, row) in range.rows().enumerate() {
            for (c, data) in row.iter().enumerate() {
                let value = to_cell_value(data);
                if !matches!(value, CellValue::Empty) {
                    sheet.set_value(row0 + r as u32 + 1, (col0 as usize + c + 1) as u16, value);
                }
            }
        }
        sheets.push(sheet);
    }

    if sheets.is_empty() {
        return Err(AppError::SpreadsheetLoad("workbook has no sheets".to_string()));
    }
    Ok(Workbook::new(sheets))
}

fn cell_format(cell: &Cell) -> Format {
    let mut format = Format::new();
    if let Some(fill) = cell.fill {
        format = format
            .set_background_color(Color::RGB(fill.0))
            .set_pattern(FormatPattern::Solid);
    }
    if cell.wrap {
        format = format.set_text_wrap();
    }
    if matches!(cell.value, CellValue::Date(_)) {
        format = format.set_num_format(DATE_FORMAT);
    }
    format
}

fn write_sheet(book: &mut XlsxWorkbook, sheet: &Sheet) -> Result<(), XlsxError> {
    let ws = book.add_worksheet();
    ws.set_name(&sheet.name)?;
    ws.set_right_to_left(sheet.right_to_left);
    for &(col, width) in &sheet.column_widths {
        ws.set_column_width(col.saturating_sub(1), width)?;
    }

    for (r, c, cell) in sheet.cells() {
        let (row, col) = (r - 1, c - 1);
        let format = cell_format(cell);
        match &cell.value {
            CellValue::Empty => {
                if cell.fill.is_some() || cell.wrap {
                    ws.write_blank(row, col, &format)?;
                }
            }
            CellValue::Number(n) => {
                ws.write_number_with_format(row, col, *n, &format)?;
            }
            CellValue::Text(s) => {
                ws.write_string_with_format(row, col, s, &format)?;
            }
            CellValue::Bool(b) => {
                ws.write_boolean_with_format(row, col, *b, &format)?;
            }
            CellValue::Date(d) => {
                ws.write_datetime_with_format(row, col, d, &format)?;
            }
        }
    }
    Ok(())
}

/// 序列化为 xlsx 字节
pub fn write_workbook(wb: &Workbook) -> Result<Vec<u8>, AppError> {
    let mut book = XlsxWorkbook::new();
    for sheet in &wb.sheets {
        write_sheet(&mut book, sheet).map_err(|e| AppError::Output(format!("{}: {}", sheet.name, e)))?;
    }
    book.save_to_buffer()
        .map_err(|e| AppError::Output(e.to_string()))
}
