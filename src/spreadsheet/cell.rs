use crate::spreadsheet::SpreadsheetError;
use std::fmt::Display;

/// Storage type of a worksheet cell, taken from the `t` attribute of `<c>`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Number,
    /// Index into the shared string table
    SharedString,
    /// `<is>` inline rich/plain string
    InlineString,
    /// Cached string result of a formula
    FormulaString,
    Boolean,
    Error,
    /// ISO 8601 date/time text
    IsoDateTime,
}

impl CellType {
    pub(crate) fn from_attribute(value: Option<&str>) -> Self {
        match value {
            Some("s") => CellType::SharedString,
            Some("inlineStr") => CellType::InlineString,
            Some("str") => CellType::FormulaString,
            Some("b") => CellType::Boolean,
            Some("e") => CellType::Error,
            Some("d") => CellType::IsoDateTime,
            _ => CellType::Number,
        }
    }

    /// Turns the raw text found in `<v>` or `<is>` into a value.
    pub(crate) fn decode(self, raw: String, shared_strings: &[String]) -> Result<CellValue, SpreadsheetError> {
        if raw.is_empty() {
            return Ok(CellValue::Empty);
        }
        let value = match self {
            CellType::SharedString => {
                let index = raw
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| SpreadsheetError::CellValueError(raw.to_owned()))?;
                let text = shared_strings
                    .get(index)
                    .ok_or_else(|| SpreadsheetError::CellValueError(raw.to_owned()))?;
                CellValue::Text(text.to_owned())
            }
            CellType::InlineString | CellType::FormulaString | CellType::IsoDateTime => CellValue::Text(raw),
            CellType::Boolean => CellValue::Boolean(raw.trim() == "1" || raw.trim().eq_ignore_ascii_case("true")),
            CellType::Error => CellValue::Error(raw),
            CellType::Number => match raw.trim().parse::<f64>() {
                Ok(number) => CellValue::Number(number),
                Err(_) => CellValue::Text(raw),
            },
        };
        Ok(value)
    }
}

/// Value held by a worksheet cell.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Boolean(bool),
    /// Error literal such as `#N/A`
    Error(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// True for empty cells and cells holding only whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(text) => write!(f, "{text}"),
            CellValue::Number(number) => write!(f, "{number}"),
            CellValue::Boolean(true) => write!(f, "TRUE"),
            CellValue::Boolean(false) => write!(f, "FALSE"),
            CellValue::Error(error) => write!(f, "{error}"),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_owned())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}
