//! Orchestration: render the page with both strategies and write both files.

mod error;
pub mod paths;
pub mod report;
mod runtime;

pub use error::ExecError;
pub use paths::{ExecOptions, Strategy};
pub use report::{ConversionOutcome, ConversionReport, ExecReport};
pub use runtime::{
    convert_with_pipeable_stream, convert_with_render_to_string, exec, exec_view, init_tracing,
    start_blocking, LogFormat,
};
