use crate::domain::error::{AppError, Result};
use std::fmt;
use std::path::Path;

/// Outcome of a command that processes many inputs independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub written: usize,
    pub skipped: usize,
    pub failed: Vec<String>,
}

impl BatchReport {
    pub fn wrote(&mut self, path: &Path) {
        tracing::info!("Wrote {}", path.display());
        self.written += 1;
    }

    pub fn skip(&mut self, path: &Path) {
        tracing::info!("Skipping existing {}", path.display());
        self.skipped += 1;
    }

    pub fn fail(&mut self, item: impl Into<String>, err: &AppError) {
        let item = item.into();
        tracing::error!("Failed on {}: {}", item, err);
        self.failed.push(item);
    }

    /// Turns any failure into an error for the process exit code.
    pub fn into_result(self) -> Result<Self> {
        if self.failed.is_empty() {
            Ok(self)
        } else {
            Err(AppError::Internal(format!(
                "{} item(s) failed: {}",
                self.failed.len(),
                self.failed.join(", ")
            )))
        }
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} written, {} skipped, {} failed",
            self.written,
            self.skipped,
            self.failed.len()
        )
    }
}
