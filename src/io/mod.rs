pub mod archive;
pub mod csv_source;
pub mod pdf;
pub mod xlsx;
pub mod xlsx_package;

use crate::error::AppError;
use crate::models::Workbook;
use std::path::Path;

pub const LEDGER_EXTENSIONS: [&str; 3] = ["xlsx", "xlsm", "csv"];
pub const MAPPING_EXTENSIONS: [&str; 3] = ["xlsx", "xlsm", "csv"];
pub const PDF_EXTENSIONS: [&str; 1] = ["pdf"];
const CSV_SHEET_NAME: &str = "Sheet1";

/// 扩展名检查 (不区分大小写), 返回小写扩展名
pub fn ensure_extension(file_name: &str, allowed: &[&str]) -> Result<String, AppError> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if allowed.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(AppError::UnsupportedFileType {
            file_name: file_name.to_string(),
            expected: allowed.iter().map(|e| format!(".{}", e)).collect::<Vec<_>>().join(" / "),
        })
    }
}

/// 按扩展名读取表格
pub fn load_spreadsheet(file_name: &str, bytes: &[u8], allowed: &[&str]) -> Result<Workbook, AppError> {
    match ensure_extension(file_name, allowed)?.as_str() {
        "csv" => csv_source::read_csv(bytes, CSV_SHEET_NAME),
        _ => xlsx::read_workbook(bytes),
    }
}

/// 写出处理结果: csv 另存为新 xlsx, xlsx/xlsm 在原包上更新
pub fn save_spreadsheet(file_name: &str, original: &[u8], wb: &Workbook) -> Result<Vec<u8>, AppError> {
    match ensure_extension(file_name, &LEDGER_EXTENSIONS)?.as_str() {
        "csv" => xlsx::write_workbook(wb),
        _ => xlsx_package::update_workbook(original, wb),
    }
}
