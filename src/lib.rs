//! # Geocode Sheet
//!
//! Batch geocoding of a spreadsheet address column. Each data row of the
//! selected `.xlsx` worksheet is resolved to longitude/latitude through the
//! Baidu Maps web service, and the coordinates are written into two columns
//! appended after the last used column of a copy of the workbook.
//!
//! ## Features
//!
//! - **Format preserving**: every original part of the workbook is copied
//!   untouched; only the processed worksheet is rewritten with the new cells
//! - **Partial failure tolerant**: rejected or failed lookups leave blank
//!   cells and the run goes on
//! - **Rate limited**: requests are strictly sequential with a configurable
//!   delay between them
//! - **Privacy rule**: addresses masked with asterisks (`***`) are never sent
//!
//! ## Modules
//!
//! - [`spreadsheet`]: the [`spreadsheet::TabularStore`] grid and its `.xlsx` implementation
//! - [`geocoding`]: lookup results and the Baidu client
//! - [`pipeline`]: the row-by-row geocoding run
//! - [`app`]: configuration to saved output
pub mod app;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod geocoding;
mod helpers;
pub mod pipeline;
pub mod spreadsheet;

pub use error::GeocodeSheetError;
