use crate::service::normalize::{clean_text, normalize_text};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// 发票映射条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub original: String,
    pub customer: String,
}

/// 归一化发票号 -> (原始发票号, 客户名), 构建后只读
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceMapping {
    entries: IndexMap<String, MappingEntry>,
}

impl InvoiceMapping {
    /// 从 (发票号, 客户名) 构建; 任一为空的行丢弃, 重复发票号后者覆盖前者
    pub fn from_pairs<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: AsRef<str>,
        B: AsRef<str>,
    {
        let mut entries = IndexMap::new();
        for (inv, cust) in pairs {
            let original = clean_text(inv.as_ref());
            let customer = clean_text(cust.as_ref());
            if original.is_empty() || customer.is_empty() {
                continue;
            }
            entries.insert(normalize_text(&original), MappingEntry { original, customer });
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// key 须已归一化
    pub fn get(&self, key: &str) -> Option<&MappingEntry> {
        self.entries.get(key)
    }

    /// 返回映射内保存的键
    pub fn key(&self, key: &str) -> Option<&str> {
        self.entries.get_key_value(key).map(|(k, _)| k.as_str())
    }

    /// 按插入顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MappingEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// 页面去向
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "customer")]
pub enum Destination {
    Customer(String),
    Unmatched,
}

/// 单页分配结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageAssignment {
    /// 页码 (1 起始)
    pub page: u32,
    #[serde(skip)]
    pub text: String,
    pub identifier: Option<String>,
    pub destination: Destination,
}

impl PageAssignment {
    /// 面向用户的日志行
    pub fn log_line(&self) -> String {
        match (&self.identifier, &self.destination) {
            (Some(id), Destination::Customer(name)) => {
                format!("✅ עמוד {}: נמצא {} → {}", self.page, id, name)
            }
            _ => format!("⚠️ עמוד {}: לא נמצאה חשבונית מתאימה", self.page),
        }
    }
}

/// 输出文件摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSummary {
    pub destination: Destination,
    pub file_name: String,
    pub pages: Vec<u32>,
}

/// 拆分运行汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitReport {
    pub mapping_size: usize,
    pub total_pages: usize,
    pub matched_pages: usize,
    pub unmatched_pages: usize,
    pub assignments: Vec<PageAssignment>,
    pub buckets: Vec<BucketSummary>,
    pub logs: Vec<String>,
}
