use std::path::Path;
use std::time::Duration;

use tokio::time::Instant;

use staticpage_core::{app, View};
use staticpage_renderer::{
    render_to_pipeable_stream, render_to_string, PipeableStream, RenderError, StreamEvent,
    StreamOptions,
};
use staticpage_writer::{atomic_write, wrap_document, DocumentSink, WriteResult};

use crate::error::{io_err, ExecError};
use crate::paths::{ExecOptions, Strategy};
use crate::report::{ConversionOutcome, ConversionReport, ExecReport};

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install the global tracing subscriber, logging to stderr. Later calls
/// are no-ops.
pub fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = match format {
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init(),
    };
}

/// Run [`exec`] on a fresh runtime and block the current thread until both
/// strategies have finished.
pub fn start_blocking(options: &ExecOptions) -> Result<ExecReport, ExecError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    Ok(runtime.block_on(exec(options)))
}

/// Render the fixed page with both strategies.
pub async fn exec(options: &ExecOptions) -> ExecReport {
    exec_view(options, app()).await
}

/// Render `view` with the buffered strategy, then the streaming strategy.
///
/// Both run unconditionally; a failure only affects its own file.
pub async fn exec_view(options: &ExecOptions, view: View) -> ExecReport {
    let buffered = convert_with_render_to_string(
        &view,
        &Strategy::RenderToString.output_path(&options.out_dir),
    );
    log_conversion(&buffered);

    let streamed = convert_with_pipeable_stream(
        view,
        &Strategy::PipeableStream.output_path(&options.out_dir),
        options.ready_timeout,
    )
    .await;
    log_conversion(&streamed);

    ExecReport {
        conversions: vec![buffered, streamed],
    }
}

// ---------------------------------------------------------------------------
// Buffered strategy
// ---------------------------------------------------------------------------

/// Render `view` to a string and write the whole document in one operation.
///
/// A render failure leaves no file behind.
pub fn convert_with_render_to_string(view: &View, path: &Path) -> ConversionReport {
    let started = Instant::now();
    let strategy = Strategy::RenderToString;

    let outcome = match render_to_string(view) {
        Ok(markup) => match atomic_write(path, &wrap_document(&markup)) {
            Ok(WriteResult::Written { bytes, digest }) => {
                ConversionOutcome::Written { bytes, digest }
            }
            Ok(WriteResult::Unchanged { digest }) => ConversionOutcome::Unchanged { digest },
            Err(err) => ConversionOutcome::Failed {
                error: err.to_string(),
            },
        },
        Err(err) => {
            log_render_error(strategy, "render", &err);
            ConversionOutcome::Failed {
                error: err.to_string(),
            }
        }
    };

    ConversionReport {
        strategy,
        path: path.to_path_buf(),
        outcome,
        recovered_errors: Vec::new(),
        elapsed_ms: started.elapsed().as_millis(),
    }
}

// ---------------------------------------------------------------------------
// Streaming strategy
// ---------------------------------------------------------------------------

enum Readiness {
    AllReady,
    ShellError(RenderError),
    Closed,
    TimedOut(Duration),
}

async fn wait_for_all_ready(
    stream: &mut PipeableStream,
    recovered: &mut Vec<RenderError>,
) -> Readiness {
    let strategy = Strategy::PipeableStream;
    while let Some(event) = stream.next_event().await {
        match event {
            StreamEvent::ShellReady => tracing::debug!(strategy = %strategy, "shell ready"),
            StreamEvent::Error(err) => {
                log_render_error(strategy, "on_error", &err);
                recovered.push(err);
            }
            StreamEvent::ShellError(err) => {
                log_render_error(strategy, "on_shell_error", &err);
                return Readiness::ShellError(err);
            }
            StreamEvent::AllReady => return Readiness::AllReady,
        }
    }
    Readiness::Closed
}

/// Stream `view` into `path`: prefix first, markup once every boundary has
/// settled, then the suffix.
///
/// On a shell error or timeout the stream is aborted and the file keeps only
/// what was already written, without the closing boilerplate.
pub async fn convert_with_pipeable_stream(
    view: View,
    path: &Path,
    ready_timeout: Option<Duration>,
) -> ConversionReport {
    let started = Instant::now();
    let strategy = Strategy::PipeableStream;
    let mut recovered = Vec::new();

    let outcome = match DocumentSink::create(path).await {
        Err(err) => ConversionOutcome::Failed {
            error: err.to_string(),
        },
        Ok(mut sink) => {
            let mut stream = render_to_pipeable_stream(view, StreamOptions::default());
            let readiness = match ready_timeout {
                Some(limit) => tokio::time::timeout(
                    limit,
                    wait_for_all_ready(&mut stream, &mut recovered),
                )
                .await
                .unwrap_or(Readiness::TimedOut(limit)),
                None => wait_for_all_ready(&mut stream, &mut recovered).await,
            };

            match readiness {
                Readiness::AllReady => match stream.pipe(&mut sink).await {
                    Ok(()) => match sink.finish().await {
                        Ok(summary) => ConversionOutcome::Written {
                            bytes: summary.bytes,
                            digest: summary.digest,
                        },
                        Err(err) => ConversionOutcome::Failed {
                            error: err.to_string(),
                        },
                    },
                    Err(err) => {
                        log_render_error(strategy, "pipe", &err);
                        close_unfinished(sink).await;
                        ConversionOutcome::Failed {
                            error: err.to_string(),
                        }
                    }
                },
                Readiness::ShellError(err) => {
                    stream.abort_with("shell failed");
                    close_unfinished(sink).await;
                    ConversionOutcome::Failed {
                        error: err.to_string(),
                    }
                }
                Readiness::Closed => {
                    close_unfinished(sink).await;
                    ConversionOutcome::Failed {
                        error: "stream closed before it was ready".to_string(),
                    }
                }
                Readiness::TimedOut(limit) => {
                    tracing::warn!(
                        strategy = %strategy,
                        timeout_ms = limit.as_millis(),
                        "stream not ready in time, aborting",
                    );
                    stream.abort_with(format!("not ready after {}ms", limit.as_millis()));
                    close_unfinished(sink).await;
                    ConversionOutcome::TimedOut {
                        waited_ms: started.elapsed().as_millis(),
                    }
                }
            }
        }
    };

    ConversionReport {
        strategy,
        path: path.to_path_buf(),
        outcome,
        recovered_errors: recovered,
        elapsed_ms: started.elapsed().as_millis(),
    }
}

async fn close_unfinished(sink: DocumentSink) {
    let path = sink.path().to_path_buf();
    if let Err(err) = sink.close_unfinished().await {
        tracing::warn!(error = %err, "failed to close {}", path.display());
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

fn log_render_error(strategy: Strategy, hook: &'static str, err: &RenderError) {
    let json = serde_json::to_string(err).unwrap_or_else(|_| err.to_string());
    tracing::error!(strategy = %strategy, hook, json = %json, "render error");
}

fn log_conversion(report: &ConversionReport) {
    match &report.outcome {
        ConversionOutcome::Written { bytes, .. } => tracing::info!(
            strategy = %report.strategy,
            bytes,
            duration_ms = report.elapsed_ms,
            "conversion completed",
        ),
        ConversionOutcome::Unchanged { .. } => tracing::info!(
            strategy = %report.strategy,
            duration_ms = report.elapsed_ms,
            "conversion completed, file unchanged",
        ),
        ConversionOutcome::Failed { error } => tracing::error!(
            strategy = %report.strategy,
            error = %error,
            "conversion failed",
        ),
        ConversionOutcome::TimedOut { waited_ms } => tracing::warn!(
            strategy = %report.strategy,
            waited_ms = *waited_ms,
            "conversion timed out",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    use staticpage_core::{Component, ComponentError, Deferred, IntoView};
    use tempfile::TempDir;

    struct Broken;

    impl Component for Broken {
        fn name(&self) -> &str {
            "Broken"
        }

        fn render(&self) -> Result<View, ComponentError> {
            Err(ComponentError::new("Broken", "no data"))
        }
    }

    /// Log sink shared between the subscriber and the assertions.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn render_errors(&self) -> Vec<serde_json::Value> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
                .filter(|line| line["fields"]["message"] == "render error")
                .collect()
        }
    }

    fn with_json_logs(captured: &Captured, f: impl FnOnce()) {
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    fn logged_error(line: &serde_json::Value) -> serde_json::Value {
        serde_json::from_str(line["fields"]["json"].as_str().unwrap()).unwrap()
    }

    #[test]
    fn buffered_render_error_is_logged_as_json() {
        let out = TempDir::new().unwrap();
        let path = Strategy::RenderToString.output_path(out.path());
        let view = View::element("div").child(View::component(Broken)).into_view();
        let captured = Captured::default();

        with_json_logs(&captured, || {
            convert_with_render_to_string(&view, &path);
        });

        let lines = captured.render_errors();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["level"], "ERROR");
        assert_eq!(lines[0]["fields"]["strategy"], "render-to-string");
        assert_eq!(lines[0]["fields"]["hook"], "render");
        let error = logged_error(&lines[0]);
        assert_eq!(error["kind"], "component");
        assert_eq!(error["component"], "Broken");
        assert_eq!(error["message"], "no data");
    }

    #[test]
    fn shell_error_is_logged_as_json() {
        let out = TempDir::new().unwrap();
        let path = Strategy::PipeableStream.output_path(out.path());
        let view = View::element("div").child(View::component(Broken)).into_view();
        let captured = Captured::default();

        with_json_logs(&captured, || {
            block_on(convert_with_pipeable_stream(view, &path, None));
        });

        let lines = captured.render_errors();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["fields"]["strategy"], "pipeable-stream");
        assert_eq!(lines[0]["fields"]["hook"], "on_shell_error");
        assert_eq!(logged_error(&lines[0])["component"], "Broken");
    }

    #[test]
    fn boundary_error_is_logged_as_json() {
        let out = TempDir::new().unwrap();
        let path = Strategy::PipeableStream.output_path(out.path());
        let failing = Deferred::new(|| async { Err(ComponentError::new("Feed", "offline")) });
        let view = View::element("main")
            .child(View::suspense("loading", failing))
            .into_view();
        let captured = Captured::default();

        let mut report = None;
        with_json_logs(&captured, || {
            report = Some(block_on(convert_with_pipeable_stream(view, &path, None)));
        });

        assert!(report.unwrap().outcome.is_complete());
        let lines = captured.render_errors();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["fields"]["hook"], "on_error");
        let error = logged_error(&lines[0]);
        assert_eq!(error["kind"], "component");
        assert_eq!(error["message"], "offline");
    }
}
