//! `staticpage diff` — compare the two written documents.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use staticpage_runtime::Strategy;
use staticpage_writer::diff_documents;

/// Arguments for `staticpage diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Directory holding the documents.
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let left = Strategy::RenderToString.output_path(&self.out_dir);
        let right = Strategy::PipeableStream.output_path(&self.out_dir);

        let diff = diff_documents(&left, &right)
            .with_context(|| format!("diff failed in '{}'", self.out_dir.display()))?;

        if diff.is_identical() {
            println!("Documents are identical.");
            return Ok(());
        }

        print!("{}", diff.unified_diff);
        if !diff.unified_diff.ends_with('\n') {
            println!();
        }
        Ok(())
    }
}
