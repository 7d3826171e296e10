use crate::error::AppError;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub reconcile: ReconcileConfig,
    pub splitter: SplitterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 上传大小上限 (MB)
    pub max_upload_mb: usize,
}

/// 对账参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// 精确匹配阈值 (严格小于)
    pub exact_tolerance: f64,
    /// 容差匹配阈值 (小于等于, 绝对金额)
    pub tolerance: f64,
    /// 需要补票通知的交易类型
    pub transfer_label: String,
}

/// 拆分参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitterConfig {
    pub identifier_pattern: String,
    pub max_file_name_len: usize,
    pub unmatched_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_upload_mb: 50,
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            exact_tolerance: 1e-6,
            tolerance: 2.0,
            transfer_label: "העב".to_string(),
        }
    }
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            identifier_pattern: r"[A-Z]{1,4}[0-9]{5,}".to_string(),
            max_file_name_len: 100,
            unmatched_name: "Unknown".to_string(),
        }
    }
}

impl AppConfig {
    /// 默认值 -> giyul.toml (可选) -> GIYUL__ 前缀环境变量
    pub fn load() -> Result<Self, AppError> {
        let loaded: Self = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("giyul").required(false))
            .add_source(
                Environment::with_prefix("GIYUL")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(loaded)
    }
}
