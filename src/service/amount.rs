use crate::error::AmountError;
use crate::models::CellValue;

/// 解析金额单元格: 数值原样返回, 文本去空白并去掉千分位逗号
pub fn parse_amount(value: &CellValue) -> Result<f64, AmountError> {
    match value {
        CellValue::Empty => Err(AmountError::EmptyValue),
        CellValue::Number(n) => Ok(*n),
        CellValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        CellValue::Text(s) => parse_amount_str(s),
        CellValue::Date(d) => Err(AmountError::InvalidAmount(d.to_string())),
    }
}

pub fn parse_amount_str(raw: &str) -> Result<f64, AmountError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(AmountError::EmptyValue);
    }
    let cleaned = s.replace(',', "");
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(AmountError::InvalidAmount(raw.to_string())),
    }
}

/// 可选单元格版本, None 视为空值
pub fn parse_optional(value: Option<&CellValue>) -> Result<f64, AmountError> {
    value.map_or(Err(AmountError::EmptyValue), parse_amount)
}
