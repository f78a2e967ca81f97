//! What an `exec` run did, per strategy.

use std::path::PathBuf;

use serde::Serialize;

use staticpage_renderer::RenderError;

use crate::paths::Strategy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionOutcome {
    /// The complete document was written.
    Written { bytes: u64, digest: String },
    /// The file already held the identical document.
    Unchanged { digest: String },
    /// Rendering or writing failed; the file is missing or unfinished.
    Failed { error: String },
    /// The stream never became ready; the file is unfinished.
    TimedOut { waited_ms: u128 },
}

impl ConversionOutcome {
    /// Whether a complete document is on disk.
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            ConversionOutcome::Written { .. } | ConversionOutcome::Unchanged { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub strategy: Strategy,
    pub path: PathBuf,
    pub outcome: ConversionOutcome,
    /// Errors reported after the shell; the document still completed.
    pub recovered_errors: Vec<RenderError>,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecReport {
    pub conversions: Vec<ConversionReport>,
}

impl ExecReport {
    pub fn get(&self, strategy: Strategy) -> Option<&ConversionReport> {
        self.conversions.iter().find(|c| c.strategy == strategy)
    }

    pub fn all_complete(&self) -> bool {
        self.conversions.iter().all(|c| c.outcome.is_complete())
    }
}
