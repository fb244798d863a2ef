//! One end-to-end run: open the workbook, geocode, save.
use crate::config::Config;
use crate::diagnostics::Diagnostics;
use crate::diagnostics::LogDiagnostics;
use crate::error::GeocodeSheetError;
use crate::error::ResultMessage;
use crate::geocoding::BaiduGeocoder;
use crate::geocoding::GeocodeClient;
use crate::pipeline::GeocodingPipeline;
use crate::pipeline::Pacer;
use crate::pipeline::RunSummary;
use crate::pipeline::SleepPacer;
use crate::spreadsheet::SpreadsheetError;
use crate::spreadsheet::TabularStore;
use crate::spreadsheet::XlsxWorkbook;
use indicatif::ProgressBar;

/// Runs against the Baidu service with the configured pacing.
pub fn run(config: &Config) -> Result<RunSummary, GeocodeSheetError> {
    let diagnostics = LogDiagnostics;
    let client = BaiduGeocoder::new(config.endpoint.clone(), &config.key, config.timeout, &diagnostics)?;
    let pacer = SleepPacer::new(config.sleep);
    run_with(config, &client, &pacer, &diagnostics)
}

/// Runs with the given collaborators.
///
/// Fails before any lookup when the workbook cannot be read or the sheet or
/// column is out of range. Nothing is written unless every row was visited.
pub fn run_with(
    config: &Config,
    client: &dyn GeocodeClient,
    pacer: &dyn Pacer,
    diagnostics: &dyn Diagnostics,
) -> Result<RunSummary, GeocodeSheetError> {
    let mut workbook = XlsxWorkbook::open(&config.input).with_prefix("Cannot open workbook")?;
    let sheet = workbook.select_sheet(config.sheet)?;
    let max_column = workbook.max_column(sheet);
    if config.column > max_column {
        return Err(SpreadsheetError::ColumnOutOfRange {
            index: config.column,
            max: max_column,
        }
        .into());
    }

    let progress = if config.progress {
        ProgressBar::new(0)
    } else {
        ProgressBar::hidden()
    };
    let pipeline = GeocodingPipeline::new(client, pacer, diagnostics).with_progress(progress);
    let summary = pipeline.run(&mut workbook, sheet, config.column);

    workbook.save(&config.output)?;
    log::info!(
        "Done: {} rows processed, {} addresses geocoded",
        summary.total_rows_visited,
        summary.success_count
    );
    if summary.skipped_count + summary.empty_count + summary.failure_count > 0 {
        log::info!(
            "{} private, {} empty, {} failed",
            summary.skipped_count,
            summary.empty_count,
            summary.failure_count
        );
    }
    log::info!("Results written to {}", config.output.display());
    log::info!("Coordinates are GCJ-02, convert them before use with WGS84 data");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::RecordingDiagnostics;
    use crate::geocoding::Coordinates;
    use crate::geocoding::GeocodeResult;
    use crate::pipeline::NoopPacer;
    use crate::spreadsheet::fixture::WorkbookFixture;
    use crate::spreadsheet::CellValue;
    use std::path::Path;
    use std::time::Duration;
    use url::Url;

    struct FixedClient;

    impl GeocodeClient for FixedClient {
        fn lookup(&self, address: &str) -> GeocodeResult {
            match address {
                "1600 Amphitheatre Parkway" => GeocodeResult::Success(Coordinates::new(-122.084, 37.422).unwrap()),
                _ => GeocodeResult::TransportError,
            }
        }
    }

    fn config(dir: &Path, sheet: usize, column: usize) -> Config {
        let input = dir.join("stores.xlsx");
        WorkbookFixture::new()
            .sheet(
                "Stores",
                &[
                    &["Name", "Address", "Note"],
                    &["Hidden", "***", ""],
                    &["Googleplex", "1600 Amphitheatre Parkway", "HQ"],
                    &["Nowhere", "", ""],
                    &["Offline", "Somewhere far", "retry"],
                    &["Last", "1600 Amphitheatre Parkway", ""],
                ],
            )
            .write(&input);
        Config {
            output: dir.join("stores_geocoded.xlsx"),
            input,
            key: "test-key".to_owned(),
            sheet,
            column,
            sleep: Duration::ZERO,
            endpoint: Url::parse("http://127.0.0.1:1/").unwrap(),
            timeout: Duration::from_secs(1),
            progress: false,
        }
    }

    fn run_fixture(config: &Config) -> Result<RunSummary, GeocodeSheetError> {
        run_with(config, &FixedClient, &NoopPacer, &RecordingDiagnostics::default())
    }

    #[test]
    fn writes_derived_output_and_keeps_input() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), 1, 2);
        let input_bytes = std::fs::read(&config.input).unwrap();

        let summary = run_fixture(&config).unwrap();
        assert_eq!(summary.total_rows_visited, 5);
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.failure_count, 1);
        assert_eq!(std::fs::read(&config.input).unwrap(), input_bytes);

        let output = XlsxWorkbook::open(&config.output).unwrap();
        let sheet = output.select_sheet(1).unwrap();
        assert_eq!(output.read_cell(sheet, 1, 4), CellValue::from("Longitude"));
        assert_eq!(output.read_cell(sheet, 1, 5), CellValue::from("Latitude"));
        assert_eq!(output.read_cell(sheet, 3, 4), CellValue::Number(-122.084));
        assert_eq!(output.read_cell(sheet, 3, 5), CellValue::Number(37.422));
        assert_eq!(output.read_cell(sheet, 3, 3), CellValue::from("HQ"));
        assert!(output.read_cell(sheet, 2, 4).is_empty());
        assert!(output.read_cell(sheet, 5, 4).is_empty());
        assert_eq!(output.read_cell(sheet, 6, 5), CellValue::Number(37.422));
    }

    #[test]
    fn range_errors_abort_before_saving() {
        let dir = tempfile::tempdir().unwrap();

        let config = config(dir.path(), 2, 2);
        let error = run_fixture(&config).unwrap_err();
        assert!(error.is_config_error());
        assert!(matches!(
            error,
            GeocodeSheetError::SpreadsheetError(SpreadsheetError::SheetOutOfRange { index: 2, count: 1 })
        ));

        let config = self::config(dir.path(), 1, 4);
        let error = run_fixture(&config).unwrap_err();
        assert!(matches!(
            error,
            GeocodeSheetError::SpreadsheetError(SpreadsheetError::ColumnOutOfRange { index: 4, max: 3 })
        ));
        assert!(!config.output.exists());
    }

    #[test]
    fn unreadable_workbook_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), 1, 2);
        std::fs::write(&config.input, b"plain text, not a zip package").unwrap();
        let error = run_fixture(&config).unwrap_err();
        assert!(!error.is_config_error());
        assert!(error.to_string().starts_with("Cannot open workbook: "));
    }

    #[test]
    fn save_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), 1, 2);
        config.output = dir.path().join("missing").join("out.xlsx");
        assert!(run_fixture(&config).is_err());
    }
}
