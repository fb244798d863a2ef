//! # Geocoding Pipeline
//!
//! Walks the data rows of one sheet, geocodes the address column and writes
//! longitude/latitude into two columns appended after the last used column.
//!
//! Rows are processed strictly one after another. The [`Pacer`] runs after
//! every row that issued a request, whatever its outcome. Rows skipped for
//! privacy and empty rows issue no request and are not paced.
use crate::diagnostics::Diagnostics;
use crate::geocoding::GeocodeClient;
use crate::geocoding::GeocodeResult;
use crate::geocoding::GeocodeStatus;
use crate::spreadsheet::reference::index_to_col;
use crate::spreadsheet::CellValue;
use crate::spreadsheet::SheetId;
use crate::spreadsheet::TabularStore;
use indicatif::ProgressBar;
use indicatif::ProgressStyle;
use regex::Regex;
use std::sync::OnceLock;

mod pacer;

pub use pacer::NoopPacer;
pub use pacer::Pacer;
pub use pacer::SleepPacer;

pub const LONGITUDE_HEADER: &str = "Longitude";
pub const LATITUDE_HEADER: &str = "Latitude";

const PROGRESS_TEMPLATE: &str = "{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})";

/// Counters of one run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Data rows visited, header excluded
    pub total_rows_visited: usize,
    pub success_count: usize,
    pub skipped_count: usize,
    pub empty_count: usize,
    /// Rows that ended in an API or transport error
    pub failure_count: usize,
}

impl RunSummary {
    fn record(&mut self, status: GeocodeStatus) {
        self.total_rows_visited += 1;
        match status {
            GeocodeStatus::Success => self.success_count += 1,
            GeocodeStatus::Skipped => self.skipped_count += 1,
            GeocodeStatus::EmptyAddress => self.empty_count += 1,
            GeocodeStatus::ApiError | GeocodeStatus::TransportError => self.failure_count += 1,
        }
    }
}

/// Address made only of asterisks, used to mask private entries. A single
/// trailing line feed is tolerated.
fn is_private_address(address: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\*+\n?$").expect("Hardcode regex pattern"))
        .is_match(address)
}

pub struct GeocodingPipeline<'a> {
    client: &'a dyn GeocodeClient,
    pacer: &'a dyn Pacer,
    diagnostics: &'a dyn Diagnostics,
    progress: ProgressBar,
}

impl<'a> GeocodingPipeline<'a> {
    /// Creates a pipeline without a visible progress bar.
    pub fn new(
        client: &'a dyn GeocodeClient,
        pacer: &'a dyn Pacer,
        diagnostics: &'a dyn Diagnostics,
    ) -> GeocodingPipeline<'a> {
        GeocodingPipeline {
            client,
            pacer,
            diagnostics,
            progress: ProgressBar::hidden(),
        }
    }

    /// Draws progress on the given bar; its length is set by [`GeocodingPipeline::run`].
    pub fn with_progress(mut self, progress: ProgressBar) -> GeocodingPipeline<'a> {
        let style = ProgressStyle::with_template(PROGRESS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        progress.set_style(style);
        self.progress = progress;
        self
    }

    /// Geocodes rows `2..=max_row` of `sheet`, reading addresses from `column`.
    ///
    /// Headers go to row 1 of columns `max_column + 1` and `max_column + 2`,
    /// computed once before the first row. Coordinates are written only for
    /// successful lookups; other rows keep both cells blank.
    pub fn run<S: TabularStore + ?Sized>(&self, store: &mut S, sheet: SheetId, column: usize) -> RunSummary {
        let max_row = store.max_row(sheet);
        let longitude_col = store.max_column(sheet) + 1;
        let latitude_col = longitude_col + 1;

        store.write_cell(sheet, 1, longitude_col, LONGITUDE_HEADER.into());
        store.write_cell(sheet, 1, latitude_col, LATITUDE_HEADER.into());

        log::info!("Processing sheet '{}'", store.sheet_name(sheet));
        log::info!(
            "Reading addresses from column {}, writing to columns {} and {}",
            index_to_col(column),
            index_to_col(longitude_col),
            index_to_col(latitude_col)
        );

        let mut summary = RunSummary::default();
        self.progress.set_length(max_row.saturating_sub(1) as u64);
        self.progress.set_message("Geocoding");
        for row in 2..=max_row {
            let cell = store.read_cell(sheet, row, column);
            let result = self.process(&cell);
            if let (Some(longitude), Some(latitude)) = (result.longitude(), result.latitude()) {
                store.write_cell(sheet, row, longitude_col, longitude.into());
                store.write_cell(sheet, row, latitude_col, latitude.into());
            }
            log::debug!("Row {row}: '{cell}' => {result:?}");
            summary.record(result.status());
            self.progress.inc(1);
        }
        self.progress.finish_and_clear();
        summary
    }

    fn process(&self, cell: &CellValue) -> GeocodeResult {
        let address = cell.to_string();
        if is_private_address(&address) {
            self.diagnostics
                .emit(&format!("'{address}' is a private address, skipped"));
            return GeocodeResult::Skipped;
        }
        if cell.is_blank() {
            return GeocodeResult::EmptyAddress;
        }
        let result = self.client.lookup(address.trim());
        self.pacer.wait();
        result
    }
}
