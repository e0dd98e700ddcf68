//! Out-of-band reporting for failures that must not block the primary action.

use std::sync::Mutex;

use crate::error::{Error, ErrorKind};

/// Receives best-effort failures (audit writes, automatic restore points).
pub trait ErrorReporter: Send + Sync {
    fn report(&self, context: &str, error: &Error);
}

/// Logs reported failures at warn level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, context: &str, error: &Error) {
        tracing::warn!(kind = ?error.kind(), "{context}: {error}");
    }
}

/// A failure captured by [`CollectingReporter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedError {
    pub context: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Retains reported failures so a UI (or a test) can surface them later
#[derive(Debug, Default)]
pub struct CollectingReporter {
    reports: Mutex<Vec<ReportedError>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything reported so far
    pub fn drain(&self) -> Vec<ReportedError> {
        std::mem::take(
            &mut *self
                .reports
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        )
    }

    pub fn len(&self) -> usize {
        self.reports
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, context: &str, error: &Error) {
        tracing::warn!(kind = ?error.kind(), "{context}: {error}");
        self.reports
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(ReportedError {
                context: context.to_string(),
                kind: error.kind(),
                message: error.to_string(),
            });
    }
}
