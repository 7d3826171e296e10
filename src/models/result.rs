use crate::models::ledger::MatchState;
use crate::models::workbook::CellValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// 匹配轮次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PassKind {
    Exact,
    Tolerated,
    CrossAccount,
}

impl PassKind {
    pub fn state(&self) -> MatchState {
        match self {
            PassKind::Exact => MatchState::ExactPaired,
            PassKind::Tolerated => MatchState::ToleratedPaired,
            PassKind::CrossAccount => MatchState::CrossAccountPaired,
        }
    }

    /// 汇总表标题
    pub fn summary_title(&self) -> &'static str {
        match self {
            PassKind::Exact => "התאמה 100%",
            PassKind::Tolerated => "התאמה 80%",
            PassKind::CrossAccount => "בדיקת ספקים",
        }
    }
}

/// 一对互相抵消的行 (行号为工作表行号)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPair {
    pub pass: PassKind,
    pub positive_row: u32,
    pub negative_row: u32,
    pub positive_account: Option<String>,
    pub negative_account: Option<String>,
    pub positive_amount: f64,
    pub negative_amount: f64,
}

/// 账户 -> 已匹配行数 (按首次计数顺序)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountCounts(IndexMap<String, usize>);

impl AccountCounts {
    /// 空账户不计入
    pub fn add(&mut self, account: Option<&str>, n: usize) {
        if let Some(acc) = account {
            *self.0.entry(acc.to_string()).or_insert(0) += n;
        }
    }

    pub fn get(&self, account: &str) -> usize {
        self.0.get(account).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v)).filter(|(_, v)| *v > 0)
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// 单轮匹配结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassOutcome {
    pub pass: PassKind,
    pub pairs: Vec<MatchPair>,
    pub counts: AccountCounts,
}

/// 待发送的补票通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub row: u32,
    pub name: CellValue,
    pub payment_date: String,
    /// 金额绝对值, 无法解析时为原始单元格
    pub amount: CellValue,
    pub message: String,
}

/// 对账运行汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub header_row: u32,
    pub data_rows: usize,
    pub passes: Vec<PassOutcome>,
    pub notifications: Vec<Notification>,
}

impl ReconcileReport {
    pub fn pass(&self, kind: PassKind) -> Option<&PassOutcome> {
        self.passes.iter().find(|p| p.pass == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn account_counts_serialize_in_first_seen_order() {
        let mut counts = AccountCounts::default();
        counts.add(Some("900"), 2);
        counts.add(None, 5);
        counts.add(Some("100"), 2);
        counts.add(Some("900"), 2);

        let json = serde_json::to_string(&counts).unwrap();
        assert_eq!(json, r#"{"900":4,"100":2}"#);
        let back: AccountCounts = serde_json::from_str(&json).unwrap();
        assert_eq!(back, counts);
        assert_eq!(back.total(), 6);
    }
}
