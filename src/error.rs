use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// 金额解析错误 (非致命, 该行跳过)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("empty value")]
    EmptyValue,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

/// 致命错误: 整次运行中止
#[derive(Error, Debug)]
pub enum AppError {
    #[error("לא נמצאו עמודות נדרשות: {}. ודאי ששמות הכותרות כתובים בדיוק כך.", .0.join(", "))]
    MissingRequiredColumns(Vec<String>),

    #[error("חסרות עמודות נדרשות בקובץ המיפוי: {}.", .0.join(", "))]
    MissingRequiredSheetColumns(Vec<String>),

    #[error("Unsupported file '{file_name}', expected one of: {expected}")]
    UnsupportedFileType { file_name: String, expected: String },

    #[error("Missing upload field '{0}'")]
    MissingUpload(&'static str),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Failed to load spreadsheet: {0}")]
    SpreadsheetLoad(String),

    #[error("Failed to load PDF: {0}")]
    PdfLoad(String),

    #[error("Failed to write output: {0}")]
    Output(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingRequiredColumns(_) | Self::MissingRequiredSheetColumns(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::UnsupportedFileType { .. }
            | Self::MissingUpload(_)
            | Self::Upload(_)
            | Self::SpreadsheetLoad(_)
            | Self::PdfLoad(_) => StatusCode::BAD_REQUEST,
            Self::Output(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}

impl From<regex::Error> for AppError {
    fn from(error: regex::Error) -> Self {
        Self::Config(error.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(error: axum::extract::multipart::MultipartError) -> Self {
        Self::Upload(error.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::Internal(error.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("Request failed: {}", self);
        let body = ErrorResponse {
            success: false,
            message: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
