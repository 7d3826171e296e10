use crate::error::AppError;
use crate::models::Sheet;
use indexmap::IndexMap;

pub const ACCOUNT_HEADER: &str = "חשבון";
pub const AMOUNT_HEADER: &str = "חוב לחשבונית";
pub const TYPE_HEADER: &str = "סוג תנועה";
pub const NAME_HEADERS: [&str; 3] = ["תאור חשבון", "שם ספק", "תיאור חשבון"];
pub const PAYMENT_DATE_HEADER: &str = "תאריך תשלום";

/// 缺省列位置 (名称/付款日期)
const DEFAULT_NAME_COLUMN: u16 = 3;
const DEFAULT_PAYMENT_COLUMN: u16 = 4;

/// 表头行及 列名 -> 列号
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderRow {
    pub row: u32,
    pub columns: IndexMap<String, u16>,
}

/// 对账所需列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerColumns {
    pub account: u16,
    pub amount: u16,
    pub transaction_type: Option<u16>,
    pub name: u16,
    pub payment_date: u16,
}

fn header_map(sheet: &Sheet, row: u32) -> IndexMap<String, u16> {
    let mut map = IndexMap::new();
    for (idx, cell) in sheet.row(row).iter().enumerate() {
        if let Some(text) = cell.value.trimmed_text().filter(|t| !t.is_empty()) {
            map.insert(text, idx as u16 + 1);
        }
    }
    map
}

/// 在第 1/2 行中选择表头: 同时含账户与金额列者优先, 否则取首个非空行, 都为空时默认第 1 行
pub fn detect_headers(sheet: &Sheet) -> HeaderRow {
    let mut chosen: Option<HeaderRow> = None;

    for row in [1u32, 2] {
        let columns = header_map(sheet, row);
        if columns.is_empty() {
            continue;
        }
        if columns.contains_key(ACCOUNT_HEADER) && columns.contains_key(AMOUNT_HEADER) {
            return HeaderRow { row, columns };
        }
        if chosen.is_none() {
            chosen = Some(HeaderRow { row, columns });
        }
    }

    chosen.unwrap_or_else(|| HeaderRow {
        row: 1,
        columns: header_map(sheet, 1),
    })
}

impl HeaderRow {
    pub fn get(&self, name: &str) -> Option<u16> {
        self.columns.get(name).copied()
    }

    /// 解析对账列; 账户/金额列缺失为致命错误
    pub fn ledger_columns(&self) -> Result<LedgerColumns, AppError> {
        let account = self.get(ACCOUNT_HEADER);
        let amount = self.get(AMOUNT_HEADER);

        let (Some(account), Some(amount)) = (account, amount) else {
            let missing = [(ACCOUNT_HEADER, account), (AMOUNT_HEADER, amount)]
                .into_iter()
                .filter(|(_, col)| col.is_none())
                .map(|(name, _)| name.to_string())
                .collect();
            return Err(AppError::MissingRequiredColumns(missing));
        };

        let name = NAME_HEADERS
            .iter()
            .find_map(|h| self.get(h))
            .unwrap_or(DEFAULT_NAME_COLUMN);

        Ok(LedgerColumns {
            account,
            amount,
            transaction_type: self.get(TYPE_HEADER),
            name,
            payment_date: self.get(PAYMENT_DATE_HEADER).unwrap_or(DEFAULT_PAYMENT_COLUMN),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn prefers_row_with_both_required_headers() {
        let sheet = Sheet::from_rows(
            "ledger",
            vec![
                vec!["דוח חובות", "", "חברה בע\"מ"],
                vec!["חשבון", "חוב לחשבונית", "שם ספק"],
            ],
        );
        let header = detect_headers(&sheet);
        assert_eq!(header.row, 2);
        assert_eq!(header.get("חוב לחשבונית"), Some(2));
    }

    #[test]
    fn falls_back_to_first_non_empty_row() {
        let sheet = Sheet::from_rows("ledger", vec![vec![""], vec!["a", "b"]]);
        let header = detect_headers(&sheet);
        assert_eq!(header.row, 2);
        assert_eq!(header.get("b"), Some(2));
    }

    #[test]
    fn empty_sheet_defaults_to_row_one() {
        let header = detect_headers(&Sheet::new("empty"));
        assert_eq!(header.row, 1);
        assert!(header.columns.is_empty());
    }

    #[test]
    fn header_text_is_trimmed() {
        let mut sheet = Sheet::new("ledger");
        sheet.set_value(1, 1, CellValue::from("  חשבון "));
        sheet.set_value(1, 5, CellValue::from("חוב לחשבונית"));
        let cols = detect_headers(&sheet).ledger_columns().unwrap();
        assert_eq!(cols.account, 1);
        assert_eq!(cols.amount, 5);
        assert_eq!(cols.name, 3);
        assert_eq!(cols.payment_date, 4);
        assert_eq!(cols.transaction_type, None);
    }

    #[test]
    fn missing_required_columns_are_named() {
        let sheet = Sheet::from_rows("ledger", vec![vec!["חשבון", "סכום"]]);
        let err = detect_headers(&sheet).ledger_columns().unwrap_err();
        match err {
            AppError::MissingRequiredColumns(missing) => {
                assert_eq!(missing, vec!["חוב לחשבונית".to_string()])
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
