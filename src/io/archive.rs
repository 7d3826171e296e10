use crate::error::AppError;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// 读出 zip 中全部文件 (跳过目录项), 保持原顺序
pub fn read_zip(bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>, AppError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| AppError::SpreadsheetLoad(format!("zip: {}", e)))?;

    let mut files = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| AppError::SpreadsheetLoad(format!("zip entry {}: {}", i, e)))?;
        if entry.is_dir() {
            continue;
        }
        let mut body = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut body)
            .map_err(|e| AppError::SpreadsheetLoad(format!("zip entry {}: {}", entry.name(), e)))?;
        files.push((entry.name().to_string(), body));
    }
    Ok(files)
}

/// 打包 (文件名, 内容) 为 zip, 保持给定顺序
pub fn write_zip(files: &[(String, Vec<u8>)]) -> Result<Vec<u8>, AppError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, bytes) in files {
        zip.start_file(name.as_str(), options)
            .map_err(|e| AppError::Output(format!("zip entry {}: {}", name, e)))?;
        zip.write_all(bytes)
            .map_err(|e| AppError::Output(format!("zip entry {}: {}", name, e)))?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| AppError::Output(format!("zip finish: {}", e)))?;
    Ok(cursor.into_inner())
}
