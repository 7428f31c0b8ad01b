//! # Error Reporting Sink
//!
//! Every connector receives one `Arc<dyn ErrorReporter>`. Operations that fail
//! report here and become no-ops; nothing is thrown across the transport boundary.

use crate::errors::BusError;
use parking_lot::Mutex;
use tracing::error;

/// Sink for errors raised inside the modelling bus.
pub trait ErrorReporter: Send + Sync {
    /// Report an error together with a short description of the operation.
    fn report(&self, context: &str, error: &BusError);
}

/// Default reporter: logs every report at `error` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, context: &str, err: &BusError) {
        error!(kind = err.kind(), error = %err, "{}", context);
    }
}

/// One entry recorded by [`ErrorLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedError {
    /// Operation that failed, e.g. `post <topic>`.
    pub context: String,
    /// The failure.
    pub error: BusError,
}

/// Reporter that keeps every report in memory.
///
/// Applications can poll it for diagnostics; tests use it to assert on
/// reported failures.
#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: Mutex<Vec<ReportedError>>,
}

impl ErrorLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// All reports received so far.
    pub fn entries(&self) -> Vec<ReportedError> {
        self.entries.lock().clone()
    }

    /// Remove and return all reports.
    pub fn drain(&self) -> Vec<ReportedError> {
        std::mem::take(&mut *self.entries.lock())
    }

    /// Number of reports held.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing was reported yet.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Whether any recorded error has the given [`BusError::kind`].
    pub fn contains_kind(&self, kind: &str) -> bool {
        self.entries.lock().iter().any(|e| e.error.kind() == kind)
    }
}

impl ErrorReporter for ErrorLog {
    fn report(&self, context: &str, err: &BusError) {
        error!(kind = err.kind(), error = %err, "{}", context);
        self.entries.lock().push(ReportedError {
            context: context.to_string(),
            error: err.clone(),
        });
    }
}
