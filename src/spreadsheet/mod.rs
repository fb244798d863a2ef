//! # Tabular Store
//!
//! Grid-of-cells abstraction over one spreadsheet artifact. The geocoding
//! pipeline only talks to [`TabularStore`]; everything format specific lives in
//! the implementation ([`xlsx::XlsxWorkbook`]).
//!
//! Rows and columns are 1-based everywhere, row 1 being the header row.
use crate::error::GeocodeSheetError;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

pub(crate) mod cell;
pub(crate) mod excel;
pub mod reference;
pub(crate) mod sheet;
pub mod xlsx;

pub use cell::CellValue;
pub use xlsx::XlsxWorkbook;

/// Suffix inserted before the extension of the derived output file.
pub const OUTPUT_SUFFIX: &str = "_geocoded";

/// Custom error types for workbook operations.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    /// The artifact could not be parsed as an `.xlsx` package
    #[error("Invalid xlsx file format: '{0}'")]
    InvalidFormat(String),

    /// Encrypted workbook or legacy binary format stored in an OLE container
    #[error("'{0}' is password protected or not an Office Open XML workbook")]
    PasswordProtected(String),

    /// A part referenced by the package is missing
    #[error("Missing part '{0}' in workbook")]
    MissingPart(String),

    /// The workbook declares no worksheets
    #[error("Workbook '{0}' contains no worksheet")]
    EmptyWorkbook(String),

    #[error("Sheet index {index} is out of range (workbook has {count} sheets)")]
    SheetOutOfRange { index: usize, count: usize },

    #[error("Column {index} is out of range (max column: {max})")]
    ColumnOutOfRange { index: usize, max: usize },

    #[error("Invalid cell value '{0}'")]
    CellValueError(String),

    /// Writing the output artifact failed
    #[error("Save '{path}' failed: {message}")]
    SaveError { path: String, message: String },
}

/// Handle on a selected worksheet, obtained from [`TabularStore::select_sheet`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SheetId(pub(crate) usize);

/// Row/column grid with a header row, backed by one workbook artifact.
///
/// Writes only touch the in-memory grid; nothing reaches the disk until
/// [`TabularStore::save`] is called.
pub trait TabularStore {
    fn sheet_count(&self) -> usize;

    /// Selects a worksheet by 1-based index.
    fn select_sheet(&self, index: usize) -> Result<SheetId, SpreadsheetError>;

    fn sheet_name(&self, sheet: SheetId) -> &str;

    /// Highest column holding a cell, 0 for an empty sheet.
    fn max_column(&self, sheet: SheetId) -> usize;

    /// Highest row holding a cell, 0 for an empty sheet.
    fn max_row(&self, sheet: SheetId) -> usize;

    fn read_cell(&self, sheet: SheetId, row: usize, col: usize) -> CellValue;

    fn write_cell(&mut self, sheet: SheetId, row: usize, col: usize, value: CellValue);

    /// Writes the whole grid, original columns included, to a new artifact.
    fn save(&self, path: &Path) -> Result<(), GeocodeSheetError>;
}

/// Derives `<stem>_geocoded.<ext>` next to the input file.
pub fn output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match input.extension() {
        Some(extension) => format!("{stem}{OUTPUT_SUFFIX}.{}", extension.to_string_lossy()),
        None => format!("{stem}{OUTPUT_SUFFIX}"),
    };
    input.with_file_name(file_name)
}

#[cfg(test)]
pub(crate) mod fixture;
