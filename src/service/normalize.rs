//! 文本归一化: 映射构建与页面扫描共用同一实现

use unicode_normalization::UnicodeNormalization;

/// 干扰希伯来文本的方向控制字符
const BIDI_CONTROLS: [char; 7] = [
    '\u{200E}', '\u{200F}', '\u{202A}', '\u{202B}', '\u{202C}', '\u{202D}', '\u{202E}',
];

/// 规范化单元格/页面文本: NFKC, 去方向控制符, 合并空白, 去首尾空白
pub fn clean_text(s: &str) -> String {
    let composed: String = s
        .nfkc()
        .filter(|c| !BIDI_CONTROLS.contains(c))
        .map(|c| if c == '\u{00A0}' { ' ' } else { c })
        .collect();
    composed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 比较用形式: clean_text + 大写
pub fn normalize_text(s: &str) -> String {
    clean_text(s).to_uppercase()
}

/// 映射表规范列名
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingColumn {
    Invoice,
    Customer,
}

impl MappingColumn {
    pub fn label(&self) -> &'static str {
        match self {
            MappingColumn::Invoice => "חשבונית",
            MappingColumn::Customer => "שם לקוח",
        }
    }
}

const INVOICE_SYNONYMS: [&str; 6] = [
    "חשבונית",
    "מספר חשבונית",
    "מס חשבונית",
    "invoice",
    "inv",
    "מספר/חשבונית",
];

const CUSTOMER_SYNONYMS: [&str; 6] = [
    "שם לקוח",
    "לקוח",
    "שם הלקוח",
    "שם לקוחות",
    "customer",
    "client name",
];

/// 识别映射表列头, 同义词优先, 其次关键词包含
pub fn classify_header(header: &str) -> Option<MappingColumn> {
    let h = clean_text(header);
    let lower = h.to_lowercase();
    let stripped: String = lower
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == ' ' || is_hebrew(*c))
        .collect::<String>()
        .trim()
        .to_string();

    let hit = |alts: &[&str]| alts.iter().any(|a| *a == h || clean_text(a).to_lowercase() == stripped);
    if hit(&INVOICE_SYNONYMS) {
        return Some(MappingColumn::Invoice);
    }
    if hit(&CUSTOMER_SYNONYMS) {
        return Some(MappingColumn::Customer);
    }

    if h.contains("חשבונית") || lower.contains("invoice") {
        return Some(MappingColumn::Invoice);
    }
    if h.contains("לקוח") || lower.contains("customer") || lower.contains("client") {
        return Some(MappingColumn::Customer);
    }
    None
}

fn is_hebrew(c: char) -> bool {
    ('\u{0590}'..='\u{05FF}').contains(&c)
}
