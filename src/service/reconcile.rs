use crate::config::ReconcileConfig;
use crate::error::AppError;
use crate::models::{
    CellValue, LedgerRow, MatchState, Notification, PassOutcome, ReconcileReport, Sheet, Workbook,
};
use crate::service::amount::{parse_amount, parse_optional};
use crate::service::headers::{detect_headers, LedgerColumns};
use crate::service::matcher::run_matching_passes;
use std::collections::HashMap;

pub const SUMMARY_ACCOUNT_HEADER: &str = "מס ספק";
pub const SUMMARY_COUNT_HEADER: &str = "כמות שורות מותאמות";
pub const MAIL_SHEET: &str = "מיילים לספק";
const MAIL_HEADERS: [&str; 4] = ["שם ספק", "תאריך תשלום", "חוב לחשבונית", "טקסט מייל"];
const MAIL_MESSAGE_WIDTH: f64 = 60.0;

/// 对账服务: 读取账本表, 四轮标记, 回写颜色/汇总表/邮件表
pub struct ReconcileService {
    config: ReconcileConfig,
}

impl ReconcileService {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    /// 原地处理工作簿 (活动表为账本)
    pub fn process_workbook(&self, wb: &mut Workbook) -> Result<ReconcileReport, AppError> {
        let sheet = wb
            .active_sheet()
            .ok_or_else(|| AppError::SpreadsheetLoad("workbook has no sheets".to_string()))?;

        let header = detect_headers(sheet);
        let cols = header.ledger_columns()?;
        let mut rows = read_ledger_rows(sheet, header.row, &cols);
        let company = sheet.value(1, 3).to_string();

        tracing::info!(
            "表头行 {}, 数据行 {} (账户列 {}, 金额列 {})",
            header.row,
            rows.len(),
            cols.account,
            cols.amount
        );

        // 1-3 轮: 配对
        let passes = run_matching_passes(&mut rows, &self.config);

        // 4 轮: 分类标记
        let notifications = tag_transfers(&mut rows, &self.config.transfer_label, &company);
        tracing::info!("标记 {} 行待补票 ({})", notifications.len(), self.config.transfer_label);

        if let Some(sheet) = wb.active_sheet_mut() {
            paint_states(sheet, &rows, cols.amount);
        }
        let account_values: HashMap<&str, &CellValue> = rows
            .iter()
            .filter_map(|r| r.account.as_deref().map(|a| (a, &r.account_value)))
            .collect();
        for outcome in &passes {
            write_summary_sheet(wb, outcome, &account_values);
        }
        write_mail_sheet(wb, &notifications);

        for sheet in &mut wb.sheets {
            sheet.right_to_left = true;
        }

        Ok(ReconcileReport {
            header_row: header.row,
            data_rows: rows.len(),
            passes,
            notifications,
        })
    }
}

/// 表头行以下全部数据行
pub fn read_ledger_rows(sheet: &Sheet, header_row: u32, cols: &LedgerColumns) -> Vec<LedgerRow> {
    (header_row + 1..=sheet.max_row())
        .map(|r| {
            let raw_amount = sheet.value(r, cols.amount).clone();
            let account_value = sheet.value(r, cols.account).clone();
            LedgerRow {
                row: r,
                account: account_value.trimmed_text().filter(|s| !s.is_empty()),
                account_value,
                amount: parse_optional(sheet.cell(r, cols.amount).map(|c| &c.value)).ok(),
                raw_amount,
                transaction_type: cols
                    .transaction_type
                    .and_then(|c| sheet.value(r, c).trimmed_text()),
                description: sheet.value(r, cols.name).clone(),
                payment_date: sheet.value(r, cols.payment_date).clone(),
                state: MatchState::Unmatched,
            }
        })
        .collect()
}

/// 交易类型等于标签且尚未着色的行标记为 Tagged, 并生成通知
pub fn tag_transfers(rows: &mut [LedgerRow], label: &str, company: &str) -> Vec<Notification> {
    let mut out = Vec::new();
    for row in rows.iter_mut() {
        if row.state.is_resolved() || row.transaction_type.as_deref() != Some(label) {
            continue;
        }
        row.state = MatchState::Tagged;

        let name = row.description.clone();
        let payment_date = format_payment_date(&row.payment_date);
        let amount = match parse_amount(&row.raw_amount) {
            Ok(v) => CellValue::Number(v.abs()),
            Err(_) => row.raw_amount.clone(),
        };
        let message = render_message(
            &name.to_string(),
            &payment_date,
            &amount.to_string(),
            company,
        );
        out.push(Notification {
            row: row.row,
            name,
            payment_date,
            amount,
            message,
        });
    }
    out
}

/// 日期单元格格式化为 日/月/两位年, 其他取原文本
pub fn format_payment_date(value: &CellValue) -> String {
    match value {
        CellValue::Date(d) => d.format("%d/%m/%y").to_string(),
        other => other.to_string(),
    }
}

pub fn render_message(name: &str, date: &str, amount: &str, company: &str) -> String {
    format!(
        "שלום ל-{name}\n\
         חסרה לנו חשבונית עבור תשלום:\n\
         תאריך - {date}\n\
         על סכום - {amount}\n\
         בתודה מראש,\n\
         הנהלת חשבונות של {company}"
    )
}

/// 颜色是状态的投影
fn paint_states(sheet: &mut Sheet, rows: &[LedgerRow], amount_col: u16) {
    for row in rows {
        if let Some(fill) = row.state.fill() {
            sheet.cell_mut(row.row, amount_col).fill = Some(fill);
        }
    }
}

/// 账户列写回源单元格原值
fn write_summary_sheet(
    wb: &mut Workbook,
    outcome: &PassOutcome,
    account_values: &HashMap<&str, &CellValue>,
) {
    let sheet = wb.reset_or_create_sheet(outcome.pass.summary_title());
    sheet.set_value(1, 1, SUMMARY_ACCOUNT_HEADER);
    sheet.set_value(1, 2, SUMMARY_COUNT_HEADER);
    for (r, (account, count)) in (2u32..).zip(outcome.counts.iter()) {
        let value = account_values
            .get(account)
            .map(|v| (*v).clone())
            .unwrap_or_else(|| CellValue::from(account));
        sheet.set_value(r, 1, value);
        sheet.set_value(r, 2, count as f64);
    }
}

fn write_mail_sheet(wb: &mut Workbook, notifications: &[Notification]) {
    let sheet = wb.reset_or_create_sheet(MAIL_SHEET);
    for (c, header) in (1u16..).zip(MAIL_HEADERS) {
        sheet.set_value(1, c, header);
    }

    for (r, note) in (2u32..).zip(notifications) {
        sheet.set_value(r, 1, note.name.clone());
        sheet.set_value(r, 2, note.payment_date.as_str());
        sheet.set_value(r, 3, note.amount.clone());
        sheet.set_value(r, 4, note.message.as_str()).wrap = true;
    }
    sheet.column_widths = vec![(4, MAIL_MESSAGE_WIDTH)];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Fill, PassKind};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn ledger() -> Workbook {
        let rows: Vec<Vec<CellValue>> = vec![
            vec!["".into(), "".into(), "חברת בדיקה".into()],
            vec![
                "חשבון".into(),
                "חוב לחשבונית".into(),
                "שם ספק".into(),
                "תאריך תשלום".into(),
                "סוג תנועה".into(),
            ],
            vec!["A".into(), 100.0.into(), "ספק א".into(), CellValue::Empty, "חשב".into()],
            vec!["A".into(), "-100".into(), "ספק א".into(), CellValue::Empty, "חשב".into()],
            vec!["A".into(), "50".into(), "ספק א".into(), CellValue::Empty, "חשב".into()],
            vec!["A".into(), (-48.0).into(), "ספק א".into(), CellValue::Empty, "חשב".into()],
            vec!["B".into(), "1,000".into(), "ספק ב".into(), CellValue::Empty, "חשב".into()],
            vec!["C".into(), (-999.0).into(), "ספק ג".into(), CellValue::Empty, "חשב".into()],
            vec![
                "D".into(),
                "-1,234.50".into(),
                "ספק ד".into(),
                NaiveDate::from_ymd_opt(2024, 3, 5)
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(CellValue::Date)
                    .unwrap_or_default(),
                "העב".into(),
            ],
            vec!["E".into(), "abc".into(), "ספק ה".into(), "לא ידוע".into(), "העב".into()],
        ];
        Workbook::new(vec![Sheet::from_rows("ledger", rows)])
    }

    #[test]
    fn full_run_marks_every_pass_and_builds_sheets() {
        let mut wb = ledger();
        let report = ReconcileService::new(ReconcileConfig::default())
            .process_workbook(&mut wb)
            .unwrap();

        assert_eq!(report.header_row, 2);
        assert_eq!(report.data_rows, 8);
        assert_eq!(report.pass(PassKind::Exact).map(|p| p.pairs.len()), Some(1));
        assert_eq!(report.pass(PassKind::Tolerated).map(|p| p.pairs.len()), Some(1));
        assert_eq!(report.pass(PassKind::CrossAccount).map(|p| p.pairs.len()), Some(1));

        let ledger = &wb.sheets[0];
        let fills: Vec<Option<Fill>> = (3..=10).map(|r| ledger.cell(r, 2).and_then(|c| c.fill)).collect();
        assert_eq!(
            fills,
            vec![
                Some(Fill(0x00FF00)),
                Some(Fill(0x00FF00)),
                Some(Fill(0xFFA500)),
                Some(Fill(0xFFA500)),
                Some(Fill(0xCC99FF)),
                Some(Fill(0xCC99FF)),
                Some(Fill(0xADD8E6)),
                Some(Fill(0xADD8E6)),
            ]
        );

        assert_eq!(
            wb.sheet_names(),
            vec!["ledger", "התאמה 100%", "התאמה 80%", "בדיקת ספקים", MAIL_SHEET]
        );
        assert!(wb.sheets.iter().all(|s| s.right_to_left));

        let cross = wb.sheet("בדיקת ספקים").unwrap();
        assert_eq!(cross.value(2, 1), &CellValue::from("B"));
        assert_eq!(cross.value(2, 2), &CellValue::Number(1.0));
        assert_eq!(cross.value(3, 1), &CellValue::from("C"));

        let exact = wb.sheet("התאמה 100%").unwrap();
        assert_eq!(exact.value(2, 2), &CellValue::Number(2.0));
    }

    #[test]
    fn notifications_render_dates_and_absolute_amounts() {
        let mut wb = ledger();
        let report = ReconcileService::new(ReconcileConfig::default())
            .process_workbook(&mut wb)
            .unwrap();

        assert_eq!(report.notifications.len(), 2);
        let first = &report.notifications[0];
        assert_eq!(first.payment_date, "05/03/24");
        assert_eq!(first.name, CellValue::from("ספק ד"));
        assert_eq!(first.amount, CellValue::Number(1234.5));
        assert_eq!(
            first.message,
            "שלום ל-ספק ד\nחסרה לנו חשבונית עבור תשלום:\nתאריך - 05/03/24\nעל סכום - 1234.5\nבתודה מראש,\nהנהלת חשבונות של חברת בדיקה"
        );

        let second = &report.notifications[1];
        assert_eq!(second.payment_date, "לא ידוע");
        assert_eq!(second.amount, CellValue::from("abc"));

        let mail = wb.sheet(MAIL_SHEET).unwrap();
        assert_eq!(mail.value(2, 3), &CellValue::Number(1234.5));
        assert_eq!(mail.value(3, 3), &CellValue::from("abc"));
        assert!(mail.cell(2, 4).map(|c| c.wrap).unwrap_or(false));
    }

    #[test]
    fn tagged_rows_skip_already_paired_cells() {
        let rows: Vec<Vec<CellValue>> = vec![
            vec!["חשבון".into(), "חוב לחשבונית".into(), "".into(), "".into(), "סוג תנועה".into()],
            vec!["A".into(), 10.0.into(), "".into(), "".into(), "העב".into()],
            vec!["A".into(), (-10.0).into(), "".into(), "".into(), "העב".into()],
        ];
        let mut wb = Workbook::new(vec![Sheet::from_rows("ledger", rows)]);
        let report = ReconcileService::new(ReconcileConfig::default())
            .process_workbook(&mut wb)
            .unwrap();
        assert!(report.notifications.is_empty());
    }

    #[test]
    fn numeric_accounts_stay_numbers_in_summary() {
        let rows: Vec<Vec<CellValue>> = vec![
            vec!["חשבון".into(), "חוב לחשבונית".into()],
            vec![4021.0.into(), 75.0.into()],
            vec![4021.0.into(), (-75.0).into()],
            vec!["ספק-7".into(), 10.0.into()],
            vec!["ספק-7".into(), (-9.0).into()],
        ];
        let mut wb = Workbook::new(vec![Sheet::from_rows("ledger", rows)]);
        ReconcileService::new(ReconcileConfig::default())
            .process_workbook(&mut wb)
            .unwrap();

        let exact = wb.sheet("התאמה 100%").unwrap();
        assert_eq!(exact.value(2, 1), &CellValue::Number(4021.0));
        let tolerated = wb.sheet("התאמה 80%").unwrap();
        assert_eq!(tolerated.value(2, 1), &CellValue::from("ספק-7"));
    }

    #[test]
    fn rerun_resets_auxiliary_sheets() {
        let mut wb = ledger();
        let service = ReconcileService::new(ReconcileConfig::default());
        service.process_workbook(&mut wb).unwrap();
        service.process_workbook(&mut wb).unwrap();
        assert_eq!(wb.sheets.len(), 5);
        let mail = wb.sheet(MAIL_SHEET).unwrap();
        assert_eq!(mail.value(4, 1), &CellValue::Empty);
    }

    #[test]
    fn missing_columns_abort_the_run() {
        let mut wb = Workbook::new(vec![Sheet::from_rows("ledger", vec![vec!["x", "y"]])]);
        let err = ReconcileService::new(ReconcileConfig::default())
            .process_workbook(&mut wb)
            .unwrap_err();
        assert!(matches!(err, AppError::MissingRequiredColumns(m) if m.len() == 2));
    }
}
