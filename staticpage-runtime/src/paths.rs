use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

pub const RENDER_TO_STRING_FILE: &str = "render-to-string.html";
pub const PIPEABLE_STREAM_FILE: &str = "render-with-pipeable-stream.html";

/// The two rendering strategies, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    RenderToString,
    PipeableStream,
}

impl Strategy {
    pub fn all() -> &'static [Strategy] {
        &[Strategy::RenderToString, Strategy::PipeableStream]
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Strategy::RenderToString => RENDER_TO_STRING_FILE,
            Strategy::PipeableStream => PIPEABLE_STREAM_FILE,
        }
    }

    pub fn output_path(&self, out_dir: &Path) -> PathBuf {
        out_dir.join(self.file_name())
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::RenderToString => f.write_str("render-to-string"),
            Strategy::PipeableStream => f.write_str("pipeable-stream"),
        }
    }
}

/// Inputs to one `exec` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOptions {
    /// Directory both documents are written into.
    pub out_dir: PathBuf,
    /// How long the streaming strategy waits for every boundary to settle.
    /// `None` waits indefinitely.
    pub ready_timeout: Option<Duration>,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("."),
            ready_timeout: None,
        }
    }
}

impl ExecOptions {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            ..Self::default()
        }
    }

    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_paths_use_fixed_file_names() {
        let root = Path::new("/srv/site");
        assert_eq!(
            Strategy::RenderToString.output_path(root),
            PathBuf::from("/srv/site/render-to-string.html")
        );
        assert_eq!(
            Strategy::PipeableStream.output_path(root),
            PathBuf::from("/srv/site/render-with-pipeable-stream.html")
        );
    }

    #[test]
    fn default_options_write_to_current_dir_without_timeout() {
        let options = ExecOptions::default();
        assert_eq!(options.out_dir, PathBuf::from("."));
        assert!(options.ready_timeout.is_none());
    }

    #[test]
    fn buffered_strategy_runs_first() {
        assert_eq!(
            Strategy::all(),
            &[Strategy::RenderToString, Strategy::PipeableStream]
        );
    }
}
