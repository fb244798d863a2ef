//! Command line definition and validated run configuration.
use crate::geocoding::baidu::BAIDU_GEOCODE_URL;
use crate::geocoding::baidu::DEFAULT_TIMEOUT;
use crate::spreadsheet::output_path;
use clap::Parser;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const SUPPORTED_EXTENSION: &str = "xlsx";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("File '{0}' does not exist")]
    FileNotFound(String),

    #[error("Only .xlsx files are supported: '{0}'")]
    UnsupportedExtension(String),

    #[error("Sheet index starts at 1")]
    ZeroSheet,

    #[error("Column index starts at 1")]
    ZeroColumn,

    #[error("Invalid {name} '{value}': expected a non-negative number of seconds")]
    InvalidDuration { name: &'static str, value: f64 },

    #[error("Invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("Output path '{0}' is the input file")]
    OutputIsInput(String),
}

/// Convert an address column of an .xlsx workbook to longitude/latitude
/// with the Baidu Maps geocoding API.
#[derive(Parser, Debug)]
#[command(name = "geocode_sheet", version)]
pub struct Cli {
    /// Input .xlsx file
    pub input_file: PathBuf,

    /// Baidu Maps web service access key (AK)
    #[arg(short, long, env = "BAIDU_MAP_AK", hide_env_values = true)]
    pub key: String,

    /// Worksheet number, starting at 1
    #[arg(short, long, default_value_t = 1)]
    pub sheet: usize,

    /// Address column number, starting at 1 (A=1, B=2, ...)
    #[arg(short, long)]
    pub column: usize,

    /// Delay between two requests, in seconds
    #[arg(long, default_value_t = 0.2)]
    pub sleep: f64,

    /// Geocoding service URL
    #[arg(long, default_value = BAIDU_GEOCODE_URL)]
    pub endpoint: String,

    /// Request timeout, in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs_f64())]
    pub timeout: f64,

    /// Output file [default: <input stem>_geocoded.xlsx next to the input]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub input: PathBuf,
    pub output: PathBuf,
    pub key: String,
    /// 1-based worksheet number
    pub sheet: usize,
    /// 1-based address column
    pub column: usize,
    pub sleep: Duration,
    pub endpoint: Url,
    pub timeout: Duration,
    pub progress: bool,
}

/// Resolves `path` through its parent directory, which is what a rename
/// onto `path` would replace. Falls back to the path as given when the
/// parent does not exist.
fn resolve(path: &Path) -> PathBuf {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match (fs::canonicalize(parent), path.file_name()) {
        (Ok(parent), Some(name)) => parent.join(name),
        _ => path.to_path_buf(),
    }
}

fn seconds(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidDuration { name, value })
}

impl Cli {
    /// Checks the arguments that do not need the workbook.
    ///
    /// Sheet and column ranges are checked once the workbook is open.
    pub fn validate(self) -> Result<Config, ConfigError> {
        let display = self.input_file.display().to_string();
        if !self.input_file.is_file() {
            return Err(ConfigError::FileNotFound(display));
        }
        let supported = self
            .input_file
            .extension()
            .map(|it| it.eq_ignore_ascii_case(SUPPORTED_EXTENSION))
            .unwrap_or(false);
        if !supported {
            return Err(ConfigError::UnsupportedExtension(display));
        }
        if self.sheet == 0 {
            return Err(ConfigError::ZeroSheet);
        }
        if self.column == 0 {
            return Err(ConfigError::ZeroColumn);
        }
        let sleep = seconds("sleep", self.sleep)?;
        let timeout = seconds("timeout", self.timeout)?;
        let endpoint = Url::parse(&self.endpoint)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .ok_or_else(|| ConfigError::InvalidEndpoint(self.endpoint.clone()))?;

        let output = self.output.unwrap_or_else(|| output_path(&self.input_file));
        if resolve(&output) == resolve(&self.input_file) {
            return Err(ConfigError::OutputIsInput(output.display().to_string()));
        }

        Ok(Config {
            input: self.input_file,
            output,
            key: self.key,
            sheet: self.sheet,
            column: self.column,
            sleep,
            endpoint,
            timeout,
            progress: !self.no_progress,
        })
    }
}
