//! Diagnostic sink shared by the geocoding client and the pipeline.

/// Receives human-readable diagnostics (skipped rows, provider rejections,
/// transport failures). Diagnostics never affect control flow.
pub trait Diagnostics {
    fn emit(&self, text: &str);
}

/// Forwards diagnostics to the `log` facade.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn emit(&self, text: &str) {
        log::warn!("{text}");
    }
}

#[cfg(test)]
pub(crate) use recording::RecordingDiagnostics;
