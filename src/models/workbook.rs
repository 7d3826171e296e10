use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 单元格值
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    Date(NaiveDateTime),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// 去首尾空白后的文本形式, 空单元格返回 None
    pub fn trimmed_text(&self) -> Option<String> {
        if matches!(self, CellValue::Empty) {
            return None;
        }
        Some(self.to_string().trim().to_string())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            // 整数值不带小数部分 (发票号/账户号常以数字存储)
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(d: NaiveDateTime) -> Self {
        CellValue::Date(d)
    }
}

/// 纯色填充 (RGB)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fill(pub u32);

impl Fill {
    /// OOXML 的 ARGB 写法, 不透明
    pub fn argb(&self) -> String {
        format!("FF{:06X}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub fill: Option<Fill>,
    pub wrap: bool,
}

/// 工作表, 行列对外均为 1 起始
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    rows: Vec<Vec<Cell>>,
    pub right_to_left: bool,
    pub column_widths: Vec<(u16, f64)>,
    /// 由本程序整表生成 (每次运行重建)
    pub generated: bool,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// 由二维值数组构建 (第一行即第 1 行)
    pub fn from_rows<R, V>(name: impl Into<String>, rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        let mut sheet = Self::new(name);
        for (r, row) in rows.into_iter().enumerate() {
            for (c, v) in row.into_iter().enumerate() {
                let v = v.into();
                if !matches!(v, CellValue::Empty) {
                    sheet.set_value(r as u32 + 1, c as u16 + 1, v);
                }
            }
        }
        sheet
    }

    /// 已使用的最大行号
    pub fn max_row(&self) -> u32 {
        self.rows.len() as u32
    }

    pub fn max_column(&self) -> u16 {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0) as u16
    }

    pub fn cell(&self, row: u32, col: u16) -> Option<&Cell> {
        if row == 0 || col == 0 {
            return None;
        }
        self.rows
            .get(row as usize - 1)
            .and_then(|r| r.get(col as usize - 1))
    }

    pub fn value(&self, row: u32, col: u16) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.cell(row, col).map(|c| &c.value).unwrap_or(&EMPTY)
    }

    /// 取可变单元格, 不存在时扩展网格
    pub fn cell_mut(&mut self, row: u32, col: u16) -> &mut Cell {
        let (r, c) = (row.max(1) as usize - 1, col.max(1) as usize - 1);
        if self.rows.len() <= r {
            self.rows.resize_with(r + 1, Vec::new);
        }
        let cells = &mut self.rows[r];
        if cells.len() <= c {
            cells.resize_with(c + 1, Cell::default);
        }
        &mut cells[c]
    }

    pub fn set_value(&mut self, row: u32, col: u16, value: impl Into<CellValue>) -> &mut Cell {
        let cell = self.cell_mut(row, col);
        cell.value = value.into();
        cell
    }

    /// 某行所有单元格 (1 起始行号)
    pub fn row(&self, row: u32) -> &[Cell] {
        if row == 0 {
            return &[];
        }
        self.rows.get(row as usize - 1).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 清空所有值, 保留格式
    pub fn clear_values(&mut self) {
        for cell in self.rows.iter_mut().flatten() {
            cell.value = CellValue::Empty;
        }
    }

    /// 遍历非空单元格: (行, 列, 单元格)
    pub fn cells(&self) -> impl Iterator<Item = (u32, u16, &Cell)> {
        self.rows.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .map(move |(c, cell)| (r as u32 + 1, c as u16 + 1, cell))
        })
    }
}

/// 内存工作簿
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
    pub active: usize,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets, active: 0 }
    }

    pub fn active_sheet(&self) -> Option<&Sheet> {
        self.sheets.get(self.active)
    }

    pub fn active_sheet_mut(&mut self) -> Option<&mut Sheet> {
        self.sheets.get_mut(self.active)
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// 已存在则清空值后复用, 否则追加新表
    pub fn reset_or_create_sheet(&mut self, name: &str) -> &mut Sheet {
        let idx = match self.sheets.iter().position(|s| s.name == name) {
            Some(idx) => {
                self.sheets[idx].clear_values();
                idx
            }
            None => {
                self.sheets.push(Sheet::new(name));
                self.sheets.len() - 1
            }
        };
        let sheet = &mut self.sheets[idx];
        sheet.generated = true;
        sheet
    }
}
