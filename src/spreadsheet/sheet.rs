use crate::spreadsheet::cell::CellValue;
use std::collections::BTreeMap;

/// In-memory grid of one worksheet: the cells read from the package plus the
/// cells written since, kept apart so saving only has to splice the edits.
pub(crate) struct Sheet {
    /// Sheet name as shown on the tab
    pub(crate) name: String,
    /// Worksheet part inside the package, e.g. `xl/worksheets/sheet1.xml`
    pub(crate) zip_path: String,
    /// Cells read from the worksheet part, keyed by 1-based (row, col)
    cells: BTreeMap<(usize, usize), CellValue>,
    /// Cells written after loading, keyed by row then column
    pub(crate) edits: BTreeMap<usize, BTreeMap<usize, CellValue>>,
    max_row: usize,
    max_col: usize,
}

impl Sheet {
    pub(super) fn new(name: &str, zip_path: &str) -> Self {
        Self {
            name: name.to_owned(),
            zip_path: zip_path.to_owned(),
            cells: BTreeMap::new(),
            edits: BTreeMap::new(),
            max_row: 0,
            max_col: 0,
        }
    }

    /// Records that a `<c>` element exists at (row, col), even when it holds no value.
    pub(super) fn touch(&mut self, row: usize, col: usize) {
        self.max_row = self.max_row.max(row);
        self.max_col = self.max_col.max(col);
    }

    /// Adds a cell loaded from the worksheet part.
    pub(super) fn push(&mut self, row: usize, col: usize, value: CellValue) {
        self.touch(row, col);
        if !value.is_empty() {
            self.cells.insert((row, col), value);
        }
    }

    pub(crate) fn max_row(&self) -> usize {
        self.max_row
    }

    pub(crate) fn max_col(&self) -> usize {
        self.max_col
    }

    pub(crate) fn read(&self, row: usize, col: usize) -> CellValue {
        self.edits
            .get(&row)
            .and_then(|cols| cols.get(&col))
            .or_else(|| self.cells.get(&(row, col)))
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn write(&mut self, row: usize, col: usize, value: CellValue) {
        self.touch(row, col);
        self.edits.entry(row).or_default().insert(col, value);
    }

    pub(crate) fn is_modified(&self) -> bool {
        !self.edits.is_empty()
    }
}
