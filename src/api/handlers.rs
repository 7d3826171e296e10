use crate::error::AppError;
use crate::io::{self, LEDGER_EXTENSIONS, MAPPING_EXTENSIONS, PDF_EXTENSIONS};
use crate::models::{InvoiceMapping, ReconcileReport, SplitReport};
use crate::service::{build_mapping, ReconcileService, SplitterService};
use axum::{
    body::Bytes,
    extract::{Json, Multipart, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const XLSM_MIME: &str = "application/vnd.ms-excel.sheet.macroEnabled.12";
const ZIP_MIME: &str = "application/zip";
const ARCHIVE_NAME: &str = "Invoices_Splitted.zip";

/// 上传文件
#[derive(Debug)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Bytes,
}

/// 拆分报告响应体
#[derive(Debug, Serialize)]
pub struct SplitReportResponse {
    pub success: bool,
    pub message: String,
    pub report: SplitReport,
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 读取 multipart 中的所有文件字段
async fn read_uploads(mut multipart: Multipart) -> Result<HashMap<String, Upload>, AppError> {
    let mut uploads = HashMap::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        uploads.insert(name, Upload { file_name, bytes });
    }
    Ok(uploads)
}

fn take_upload(
    uploads: &mut HashMap<String, Upload>,
    field: &'static str,
) -> Result<Upload, AppError> {
    uploads.remove(field).ok_or(AppError::MissingUpload(field))
}

fn keeps_macros(file_name: &str) -> bool {
    io::ensure_extension(file_name, &["xlsm"]).is_ok()
}

/// `{stem}_processed.xlsx`, 带宏的 xlsm 保持 `.xlsm`
pub fn processed_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("ledger");
    let ext = if keeps_macros(file_name) { "xlsm" } else { "xlsx" };
    format!("{}_processed.{}", stem, ext)
}

fn attachment(len: usize, mime: &'static str, file_name: &str) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(mime));
    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(file_name)
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition).map_err(|e| AppError::Internal(e.to_string()))?,
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    Ok(headers)
}

/// 对账接口: 上传账本, 返回着色后的工作簿
pub async fn reconcile(
    State(service): State<Arc<ReconcileService>>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut uploads = read_uploads(multipart).await?;
    let upload = take_upload(&mut uploads, "file")?;
    io::ensure_extension(&upload.file_name, &LEDGER_EXTENSIONS)?;
    let out_name = processed_name(&upload.file_name);
    let mime = if keeps_macros(&upload.file_name) { XLSM_MIME } else { XLSX_MIME };

    tracing::info!("开始对账: {} ({} bytes)", upload.file_name, upload.bytes.len());

    let (bytes, report): (Vec<u8>, ReconcileReport) = tokio::task::spawn_blocking(move || {
        let mut wb = io::load_spreadsheet(&upload.file_name, &upload.bytes, &LEDGER_EXTENSIONS)?;
        let report = service.process_workbook(&mut wb)?;
        let bytes = io::save_spreadsheet(&upload.file_name, &upload.bytes, &wb)?;
        Ok::<_, AppError>((bytes, report))
    })
    .await??;

    let pairs: usize = report.passes.iter().map(|p| p.pairs.len()).sum();
    tracing::info!(
        "对账完成: {} 行, {} 对匹配, {} 条通知",
        report.data_rows,
        pairs,
        report.notifications.len()
    );

    let headers = attachment(bytes.len(), mime, &out_name)?;
    Ok((StatusCode::OK, headers, bytes).into_response())
}

fn load_split_inputs(
    uploads: &mut HashMap<String, Upload>,
) -> Result<(Upload, Upload), AppError> {
    let pdf = take_upload(uploads, "pdf")?;
    let mapping = take_upload(uploads, "mapping")?;
    io::ensure_extension(&pdf.file_name, &PDF_EXTENSIONS)?;
    io::ensure_extension(&mapping.file_name, &MAPPING_EXTENSIONS)?;
    Ok((pdf, mapping))
}

fn mapping_from_upload(upload: &Upload) -> Result<InvoiceMapping, AppError> {
    let wb = io::load_spreadsheet(&upload.file_name, &upload.bytes, &MAPPING_EXTENSIONS)?;
    let sheet = wb
        .active_sheet()
        .ok_or_else(|| AppError::SpreadsheetLoad("workbook has no sheets".to_string()))?;
    build_mapping(sheet)
}

/// 拆分接口: 上传 PDF 与映射表, 返回 zip
pub async fn split(
    State(service): State<Arc<SplitterService>>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut uploads = read_uploads(multipart).await?;
    let (pdf, mapping) = load_split_inputs(&mut uploads)?;

    let output = tokio::task::spawn_blocking(move || {
        let mapping = mapping_from_upload(&mapping)?;
        service.split(&pdf.bytes, &mapping)
    })
    .await??;

    let mut headers = attachment(output.archive.len(), ZIP_MIME, ARCHIVE_NAME)?;
    headers.insert(
        HeaderName::from_static("x-pages-matched"),
        HeaderValue::from(output.report.matched_pages),
    );
    headers.insert(
        HeaderName::from_static("x-pages-unmatched"),
        HeaderValue::from(output.report.unmatched_pages),
    );
    Ok((StatusCode::OK, headers, output.archive).into_response())
}

/// 拆分预览接口: 只返回每页去向
pub async fn split_report(
    State(service): State<Arc<SplitterService>>,
    multipart: Multipart,
) -> Result<Json<SplitReportResponse>, AppError> {
    let mut uploads = read_uploads(multipart).await?;
    let (pdf, mapping) = load_split_inputs(&mut uploads)?;

    let report = tokio::task::spawn_blocking(move || {
        let mapping = mapping_from_upload(&mapping)?;
        service.analyze(&pdf.bytes, &mapping)
    })
    .await??;

    Ok(Json(SplitReportResponse {
        success: true,
        message: format!(
            "{} pages, {} matched, {} unmatched",
            report.total_pages, report.matched_pages, report.unmatched_pages
        ),
        report,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processed_name_replaces_extension() {
        assert_eq!(processed_name("חובות.xlsx"), "חובות_processed.xlsx");
        assert_eq!(processed_name("ledger.csv"), "ledger_processed.xlsx");
        assert_eq!(processed_name("מאקרו.XLSM"), "מאקרו_processed.xlsm");
    }

    #[test]
    fn disposition_header_is_percent_encoded() {
        let headers = attachment(3, XLSX_MIME, "א b.xlsx").unwrap();
        let value = headers
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert_eq!(value, "attachment; filename*=UTF-8''%D7%90%20b.xlsx");
        assert_eq!(headers.get(header::CONTENT_LENGTH).and_then(|v| v.to_str().ok()), Some("3"));
    }
}
