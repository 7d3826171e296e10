use crate::models::workbook::{CellValue, Fill};
use serde::{Deserialize, Serialize};

/// 行匹配状态: Unmatched 只能单向迁移到其余某一个状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MatchState {
    #[default]
    Unmatched,
    ExactPaired,
    ToleratedPaired,
    CrossAccountPaired,
    Tagged,
}

impl MatchState {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, MatchState::Unmatched)
    }

    /// 渲染时的填充色
    pub fn fill(&self) -> Option<Fill> {
        match self {
            MatchState::Unmatched => None,
            MatchState::ExactPaired => Some(Fill(0x00FF00)),
            MatchState::ToleratedPaired => Some(Fill(0xFFA500)),
            MatchState::CrossAccountPaired => Some(Fill(0xCC99FF)),
            MatchState::Tagged => Some(Fill(0xADD8E6)),
        }
    }
}

/// 账本数据行
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    /// 工作表中的行号 (1 起始)
    pub row: u32,
    pub account: Option<String>,
    /// 账户单元格原值 (数字账户号在汇总表中保持数字)
    pub account_value: CellValue,
    /// 解析失败的金额为 None, 不参与任何匹配
    pub amount: Option<f64>,
    pub raw_amount: CellValue,
    pub transaction_type: Option<String>,
    pub description: CellValue,
    pub payment_date: CellValue,
    pub state: MatchState,
}

impl LedgerRow {
    /// 仅用于构造测试/程序化输入
    pub fn new(row: u32, account: Option<&str>, amount: Option<f64>) -> Self {
        Self {
            row,
            account: account.map(str::to_string),
            account_value: account.map(CellValue::from).unwrap_or_default(),
            amount,
            raw_amount: amount.map(CellValue::Number).unwrap_or_default(),
            transaction_type: None,
            description: CellValue::Empty,
            payment_date: CellValue::Empty,
            state: MatchState::Unmatched,
        }
    }

    /// 可参与配对: 未匹配且金额非零
    pub fn is_candidate(&self) -> bool {
        !self.state.is_resolved() && matches!(self.amount, Some(v) if v != 0.0)
    }
}
