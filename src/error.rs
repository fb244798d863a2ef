use thiserror::Error;

/// Main error type for the geocode_sheet crate.
/// Aggregates errors from the standard library, dependencies and internal modules.
#[derive(Error, Debug)]
pub enum GeocodeSheetError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    HttpError(#[from] reqwest::Error),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Domain module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    ConfigError(#[from] crate::config::ConfigError),
}

impl GeocodeSheetError {
    /// Returns true for errors caused by bad arguments rather than by the workbook
    /// or the file system.
    pub fn is_config_error(&self) -> bool {
        use crate::spreadsheet::SpreadsheetError as S;
        matches!(
            self,
            GeocodeSheetError::ConfigError(_)
                | GeocodeSheetError::SpreadsheetError(S::SheetOutOfRange { .. })
                | GeocodeSheetError::SpreadsheetError(S::ColumnOutOfRange { .. })
        )
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, GeocodeSheetError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| GeocodeSheetError::WithContextError(format!("{}: {}", message, e)))
    }
}
