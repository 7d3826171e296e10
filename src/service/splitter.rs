use crate::config::SplitterConfig;
use crate::error::AppError;
use crate::io::{archive, pdf};
use crate::models::{
    BucketSummary, Destination, InvoiceMapping, PageAssignment, Sheet, SplitReport,
};
use crate::service::normalize::{classify_header, normalize_text, MappingColumn};
use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

/// 文件名中不允许的字符
const FORBIDDEN_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// 拆分结果: 压缩包 + 运行汇总
#[derive(Debug)]
pub struct SplitOutput {
    pub archive: Vec<u8>,
    pub report: SplitReport,
}

/// 从映射表 (首行为表头) 构建 发票号 -> 客户名
pub fn build_mapping(sheet: &Sheet) -> Result<InvoiceMapping, AppError> {
    let mut invoice_col = None;
    let mut customer_col = None;
    for (idx, cell) in sheet.row(1).iter().enumerate() {
        let col = idx as u16 + 1;
        match classify_header(&cell.value.to_string()) {
            Some(MappingColumn::Invoice) if invoice_col.is_none() => invoice_col = Some(col),
            Some(MappingColumn::Customer) if customer_col.is_none() => customer_col = Some(col),
            _ => {}
        }
    }

    let (Some(inv), Some(cust)) = (invoice_col, customer_col) else {
        let missing = [
            (MappingColumn::Invoice, invoice_col),
            (MappingColumn::Customer, customer_col),
        ]
        .into_iter()
        .filter(|(_, col)| col.is_none())
        .map(|(c, _)| c.label().to_string())
        .collect();
        return Err(AppError::MissingRequiredSheetColumns(missing));
    };

    let mapping = InvoiceMapping::from_pairs(
        (2..=sheet.max_row()).map(|r| (sheet.value(r, inv).to_string(), sheet.value(r, cust).to_string())),
    );
    tracing::info!("映射表有效行: {}", mapping.len());
    Ok(mapping)
}

/// 输出文件命名: 替换非法字符, 截断, 冲突追加序号
#[derive(Debug)]
pub struct FileNamer {
    max_len: usize,
    used: HashSet<String>,
}

impl FileNamer {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len: max_len.max(1),
            used: HashSet::new(),
        }
    }

    pub fn sanitize(&self, name: &str) -> String {
        let replaced: String = name
            .chars()
            .map(|c| if FORBIDDEN_CHARS.contains(&c) || c.is_control() { '_' } else { c })
            .collect();
        let truncated: String = replaced.trim().chars().take(self.max_len).collect();
        let trimmed = truncated.trim_end_matches(['.', ' ']);
        if trimmed.is_empty() {
            "_".to_string()
        } else {
            trimmed.to_string()
        }
    }

    /// 返回唯一的 `{name}.pdf`
    pub fn next(&mut self, name: &str) -> String {
        let base = self.sanitize(name);
        let mut candidate = format!("{}.pdf", base);
        let mut n = 2;
        while !self.used.insert(candidate.to_lowercase()) {
            candidate = format!("{}_{}.pdf", base, n);
            n += 1;
        }
        candidate
    }
}

/// 发票拆分服务
pub struct SplitterService {
    config: SplitterConfig,
    pattern: Regex,
}

impl SplitterService {
    pub fn new(config: SplitterConfig) -> Result<Self, AppError> {
        let pattern = RegexBuilder::new(&config.identifier_pattern)
            .case_insensitive(true)
            .build()?;
        Ok(Self { config, pattern })
    }

    /// 在页面文本中查找映射内的发票号, 返回归一化键
    ///
    /// 先按出现顺序检查模式命中, 都不在映射中时退回到映射键的子串搜索。
    pub fn find_identifier<'m>(&self, text: &str, mapping: &'m InvoiceMapping) -> Option<&'m str> {
        let normalized = normalize_text(text);

        let by_pattern = self
            .pattern
            .find_iter(&normalized)
            .find_map(|m| mapping.key(m.as_str()));
        if by_pattern.is_some() {
            return by_pattern;
        }

        mapping
            .iter()
            .find(|(key, _)| normalized.contains(key))
            .map(|(key, _)| key)
    }

    pub fn assign_page(&self, page: u32, text: String, mapping: &InvoiceMapping) -> PageAssignment {
        let found = self
            .find_identifier(&text, mapping)
            .and_then(|key| mapping.get(key));
        let (identifier, destination) = match found {
            Some(entry) => (
                Some(entry.original.clone()),
                Destination::Customer(entry.customer.clone()),
            ),
            None => (None, Destination::Unmatched),
        };
        PageAssignment {
            page,
            text,
            identifier,
            destination,
        }
    }

    /// 按页序分配, 客户桶按首次出现排序, 未匹配桶最后
    pub fn plan_buckets(&self, assignments: &[PageAssignment]) -> Vec<BucketSummary> {
        let mut customers: IndexMap<&str, Vec<u32>> = IndexMap::new();
        let mut unmatched = Vec::new();
        for a in assignments {
            match &a.destination {
                Destination::Customer(name) => customers.entry(name.as_str()).or_default().push(a.page),
                Destination::Unmatched => unmatched.push(a.page),
            }
        }

        let mut namer = FileNamer::new(self.config.max_file_name_len);
        let mut buckets: Vec<BucketSummary> = customers
            .into_iter()
            .map(|(name, pages)| BucketSummary {
                destination: Destination::Customer(name.to_string()),
                file_name: namer.next(name),
                pages,
            })
            .collect();
        if !unmatched.is_empty() {
            buckets.push(BucketSummary {
                destination: Destination::Unmatched,
                file_name: namer.next(&self.config.unmatched_name),
                pages: unmatched,
            });
        }
        buckets
    }

    /// 分析每页去向, 不生成文件
    pub fn analyze_pages<I>(&self, pages: I, mapping: &InvoiceMapping) -> SplitReport
    where
        I: IntoIterator<Item = (u32, String)>,
    {
        let assignments: Vec<PageAssignment> = pages
            .into_iter()
            .map(|(page, text)| self.assign_page(page, text, mapping))
            .collect();

        let logs: Vec<String> = assignments.iter().map(PageAssignment::log_line).collect();
        for line in &logs {
            tracing::info!("{}", line);
        }

        let matched_pages = assignments
            .iter()
            .filter(|a| a.destination != Destination::Unmatched)
            .count();
        let buckets = self.plan_buckets(&assignments);

        SplitReport {
            mapping_size: mapping.len(),
            total_pages: assignments.len(),
            matched_pages,
            unmatched_pages: assignments.len() - matched_pages,
            assignments,
            buckets,
            logs,
        }
    }

    pub fn analyze(&self, pdf_bytes: &[u8], mapping: &InvoiceMapping) -> Result<SplitReport, AppError> {
        let doc = pdf::load_document(pdf_bytes)?;
        Ok(self.analyze_pages(pdf::page_texts(&doc), mapping))
    }

    /// 拆分整个 PDF, 每个桶一个文件打包为 zip
    pub fn split(&self, pdf_bytes: &[u8], mapping: &InvoiceMapping) -> Result<SplitOutput, AppError> {
        let doc = pdf::load_document(pdf_bytes)?;
        let report = self.analyze_pages(pdf::page_texts(&doc), mapping);

        let mut files = Vec::with_capacity(report.buckets.len());
        for bucket in &report.buckets {
            let bytes = pdf::extract_pages(&doc, &bucket.pages)?;
            files.push((bucket.file_name.clone(), bytes));
        }
        let archive = archive::write_zip(&files)?;

        tracing::info!(
            "拆分完成: {} 页, 匹配 {}, 未匹配 {}, 输出 {} 个文件",
            report.total_pages,
            report.matched_pages,
            report.unmatched_pages,
            files.len()
        );

        Ok(SplitOutput { archive, report })
    }
}
