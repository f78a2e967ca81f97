//! Streaming rendering — shell first, suspense boundaries as they resolve.
//!
//! [`render_to_pipeable_stream`] renders the synchronous part of the tree
//! (the shell) immediately and spawns one driver task that resolves every
//! suspense boundary. Progress flows back to the [`PipeableStream`] handle
//! over a channel; the handle turns it into [`StreamEvent`]s for its single
//! consumer and writes markup into a destination on [`PipeableStream::pipe`].
//!
//! Lifecycle:
//!
//! ```text
//! ShellReady ──► Error* ──► AllReady
//! ShellError                              (nothing else follows)
//! ```
//!
//! Piping after `AllReady` writes the whole document inline. Piping earlier
//! writes the shell with placeholders, then each boundary's content as it
//! resolves, together with a small inline script that swaps it into place.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::sync::oneshot;
use tokio::task::JoinSet;

use staticpage_core::View;

use crate::error::RenderError;
use crate::markup::{
    placeholder_id, segment_id, write_segment, BoundaryId, BoundaryState, PendingBoundary,
    Segment, SegmentWriter,
};

/// Defines `$RC` (swap resolved content into its placeholder) and `$RX`
/// (mark a boundary for client rendering). Emitted once per stream.
const SWAP_RUNTIME: &str = r#"<script>$RC=function(b,c){var t=document.getElementById(b),s=document.getElementById(c);if(!t||!s)return;s.parentNode.removeChild(s);var m=t.previousSibling,p=t.parentNode,n=t.nextSibling,d=0;while(n){var x=n.nextSibling;if(n.nodeType===8){if(n.data==="/$"){if(d===0)break;d--}else if(n.data.charAt(0)==="$")d++}p.removeChild(n);n=x}while(s.firstChild)p.insertBefore(s.firstChild,n);p.removeChild(t);m.data="$"};$RX=function(b){var t=document.getElementById(b);if(t&&t.previousSibling)t.previousSibling.data="$!"}</script>"#;

// ---------------------------------------------------------------------------
// Events and options
// ---------------------------------------------------------------------------

/// Lifecycle outcome of a streaming render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The shell rendered; piping is possible from now on.
    ShellReady,
    /// The shell failed before any output was produced. Terminal.
    ShellError(RenderError),
    /// A suspense boundary failed after the shell; it falls back to client
    /// rendering and the stream continues.
    Error(RenderError),
    /// Every boundary has settled.
    AllReady,
}

type ReadyHook = Box<dyn FnMut() + Send>;
type ErrorHook = Box<dyn FnMut(&RenderError) + Send>;

/// Options for [`render_to_pipeable_stream`].
///
/// The hooks fire as events are produced, before the matching
/// [`StreamEvent`] is handed to the consumer.
#[derive(Default)]
pub struct StreamOptions {
    identifier_prefix: String,
    on_shell_ready: Option<ReadyHook>,
    on_shell_error: Option<ErrorHook>,
    on_error: Option<ErrorHook>,
    on_all_ready: Option<ReadyHook>,
}

impl fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamOptions")
            .field("identifier_prefix", &self.identifier_prefix)
            .field("on_shell_ready", &self.on_shell_ready.is_some())
            .field("on_shell_error", &self.on_shell_error.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_all_ready", &self.on_all_ready.is_some())
            .finish()
    }
}

impl StreamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix for the `B:n` / `S:n` element ids used by progressive output.
    pub fn identifier_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.identifier_prefix = prefix.into();
        self
    }

    pub fn on_shell_ready(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.on_shell_ready = Some(Box::new(hook));
        self
    }

    pub fn on_shell_error(mut self, hook: impl FnMut(&RenderError) + Send + 'static) -> Self {
        self.on_shell_error = Some(Box::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl FnMut(&RenderError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }

    pub fn on_all_ready(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.on_all_ready = Some(Box::new(hook));
        self
    }
}

// ---------------------------------------------------------------------------
// Driver protocol
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Progress {
    Resolved { id: BoundaryId, segment: Segment },
    Failed { id: BoundaryId, error: RenderError },
    Done,
}

enum Pumped {
    Settled(BoundaryId),
    Finished,
}

// ---------------------------------------------------------------------------
// PipeableStream
// ---------------------------------------------------------------------------

/// Handle to an in-flight streaming render.
///
/// Dropping the handle aborts any unresolved boundaries.
pub struct PipeableStream {
    options: StreamOptions,
    shell: Option<Segment>,
    boundaries: HashMap<BoundaryId, BoundaryState>,
    progress: mpsc::UnboundedReceiver<Progress>,
    events: VecDeque<StreamEvent>,
    abort: Option<oneshot::Sender<String>>,
    settled: bool,
    piped: bool,
}

impl fmt::Debug for PipeableStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipeableStream")
            .field("options", &self.options)
            .field("has_shell", &self.shell.is_some())
            .field("boundaries", &self.boundaries.len())
            .field("queued_events", &self.events.len())
            .field("settled", &self.settled)
            .field("piped", &self.piped)
            .finish()
    }
}

/// Start a streaming render of `view`.
///
/// The shell is rendered before this returns; boundary content resolves on a
/// spawned task, so this must be called from within a tokio runtime.
pub fn render_to_pipeable_stream(view: View, options: StreamOptions) -> PipeableStream {
    let (progress_tx, progress_rx) = mpsc::unbounded_channel();
    let (abort_tx, abort_rx) = oneshot::channel();

    let mut stream = PipeableStream {
        options,
        shell: None,
        boundaries: HashMap::new(),
        progress: progress_rx,
        events: VecDeque::new(),
        abort: Some(abort_tx),
        settled: false,
        piped: false,
    };

    let mut writer = SegmentWriter::streaming(0);
    match writer.write_view_catching(&view) {
        Ok(()) => {
            let (shell, pending, next_id) = writer.finish();
            for boundary in &pending {
                stream.boundaries.insert(boundary.id, BoundaryState::Pending);
            }
            tracing::debug!(boundaries = pending.len(), "shell rendered");
            stream.shell = Some(shell);
            stream.emit(StreamEvent::ShellReady);
            tokio::spawn(drive(pending, next_id, progress_tx, abort_rx));
        }
        Err(err) => {
            tracing::debug!(error = %err, "shell render failed");
            stream.settled = true;
            stream.abort = None;
            stream.emit(StreamEvent::ShellError(err));
        }
    }
    stream
}

impl PipeableStream {
    /// Next lifecycle event, or `None` once the render has settled and all
    /// events have been consumed.
    ///
    /// Cancel-safe: dropping the returned future loses no events.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            if let Some(event) = self.events.pop_front() {
                return Some(event);
            }
            if self.settled {
                return None;
            }
            self.pump().await;
        }
    }

    /// Whether every boundary has settled (or the shell failed).
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Write the rendered markup into `dest`.
    ///
    /// Returns once every boundary has been written. Events produced while
    /// piping stay queued for [`PipeableStream::next_event`].
    pub async fn pipe<W>(&mut self, dest: &mut W) -> Result<(), RenderError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        if self.piped {
            return Err(RenderError::AlreadyPiped);
        }
        let Some(shell) = self.shell.take() else {
            return Err(RenderError::ShellFailed);
        };
        self.piped = true;
        self.drain_ready();

        let prefix = self.options.identifier_prefix.clone();
        let mut out = String::new();
        let mut pending = Vec::new();
        write_segment(&shell, &self.boundaries, &prefix, &mut out, &mut pending);
        dest.write_all(out.as_bytes())
            .await
            .map_err(RenderError::destination)?;

        let mut waiting: HashSet<BoundaryId> = pending.into_iter().collect();
        let mut runtime_sent = false;
        while !waiting.is_empty() {
            let id = match self.pump().await {
                Pumped::Settled(id) => id,
                Pumped::Finished => break,
            };
            if !waiting.remove(&id) {
                continue;
            }

            let mut out = String::new();
            if !runtime_sent {
                out.push_str(SWAP_RUNTIME);
            }
            match self.boundaries.get(&id) {
                Some(BoundaryState::Resolved(segment)) => {
                    let mut nested = Vec::new();
                    out.push_str("<div hidden id=\"");
                    out.push_str(&segment_id(&prefix, id));
                    out.push_str("\">");
                    write_segment(segment, &self.boundaries, &prefix, &mut out, &mut nested);
                    out.push_str("</div><script>$RC(\"");
                    out.push_str(&placeholder_id(&prefix, id));
                    out.push_str("\",\"");
                    out.push_str(&segment_id(&prefix, id));
                    out.push_str("\")</script>");
                    waiting.extend(nested);
                }
                Some(BoundaryState::Failed(_)) => {
                    out.push_str("<script>$RX(\"");
                    out.push_str(&placeholder_id(&prefix, id));
                    out.push_str("\")</script>");
                }
                Some(BoundaryState::Pending) | None => continue,
            }
            dest.write_all(out.as_bytes())
                .await
                .map_err(RenderError::destination)?;
            runtime_sent = true;
        }

        dest.flush().await.map_err(RenderError::destination)?;
        tracing::debug!(progressive = runtime_sent, "stream piped");
        Ok(())
    }

    /// Abandon unresolved boundaries; they fall back to client rendering.
    pub fn abort(&mut self) {
        self.abort_with("the render was aborted");
    }

    /// [`PipeableStream::abort`] with an explicit reason.
    pub fn abort_with(&mut self, reason: impl Into<String>) {
        if let Some(tx) = self.abort.take() {
            let reason = reason.into();
            tracing::debug!(%reason, "aborting stream");
            let _ = tx.send(reason);
        }
    }

    fn emit(&mut self, event: StreamEvent) {
        match &event {
            StreamEvent::ShellReady => {
                if let Some(hook) = self.options.on_shell_ready.as_mut() {
                    hook();
                }
            }
            StreamEvent::ShellError(err) => {
                if let Some(hook) = self.options.on_shell_error.as_mut() {
                    hook(err);
                }
            }
            StreamEvent::Error(err) => {
                if let Some(hook) = self.options.on_error.as_mut() {
                    hook(err);
                }
            }
            StreamEvent::AllReady => {
                if let Some(hook) = self.options.on_all_ready.as_mut() {
                    hook();
                }
            }
        }
        self.events.push_back(event);
    }

    async fn pump(&mut self) -> Pumped {
        if self.settled {
            return Pumped::Finished;
        }
        match self.progress.recv().await {
            Some(progress) => self.apply(progress),
            None => {
                self.settle_abandoned();
                Pumped::Finished
            }
        }
    }

    fn drain_ready(&mut self) {
        while !self.settled {
            match self.progress.try_recv() {
                Ok(progress) => {
                    self.apply(progress);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.settle_abandoned(),
            }
        }
    }

    fn apply(&mut self, progress: Progress) -> Pumped {
        match progress {
            Progress::Resolved { id, segment } => {
                let nested: Vec<_> = segment.boundary_ids().collect();
                for nested_id in nested {
                    self.boundaries.insert(nested_id, BoundaryState::Pending);
                }
                self.boundaries.insert(id, BoundaryState::Resolved(segment));
                Pumped::Settled(id)
            }
            Progress::Failed { id, error } => {
                tracing::debug!(boundary = id, error = %error, "boundary failed");
                self.boundaries
                    .insert(id, BoundaryState::Failed(error.clone()));
                self.emit(StreamEvent::Error(error));
                Pumped::Settled(id)
            }
            Progress::Done => {
                self.settled = true;
                self.abort = None;
                self.emit(StreamEvent::AllReady);
                Pumped::Finished
            }
        }
    }

    /// The driver went away without reporting completion.
    fn settle_abandoned(&mut self) {
        let mut pending: Vec<_> = self
            .boundaries
            .iter()
            .filter(|(_, state)| matches!(state, BoundaryState::Pending))
            .map(|(id, _)| *id)
            .collect();
        pending.sort_unstable();
        for id in pending {
            let error = RenderError::Aborted {
                reason: "renderer task stopped".to_string(),
            };
            self.boundaries
                .insert(id, BoundaryState::Failed(error.clone()));
            self.emit(StreamEvent::Error(error));
        }
        self.settled = true;
        self.abort = None;
        self.emit(StreamEvent::AllReady);
    }
}

// ---------------------------------------------------------------------------
// Driver task
// ---------------------------------------------------------------------------

type BoundaryResult = (BoundaryId, Result<View, RenderError>);

fn spawn_boundaries(
    tasks: &mut JoinSet<BoundaryResult>,
    outstanding: &mut BTreeSet<BoundaryId>,
    boundaries: Vec<PendingBoundary>,
) {
    for PendingBoundary { id, content } in boundaries {
        outstanding.insert(id);
        tasks.spawn(async move {
            let result = match AssertUnwindSafe(content.start()).catch_unwind().await {
                Ok(Ok(view)) => Ok(view),
                Ok(Err(err)) => Err(RenderError::from(err)),
                Err(payload) => Err(RenderError::panicked(payload.as_ref())),
            };
            (id, result)
        });
    }
}

async fn drive(
    initial: Vec<PendingBoundary>,
    mut next_id: BoundaryId,
    progress: mpsc::UnboundedSender<Progress>,
    mut abort: oneshot::Receiver<String>,
) {
    let mut tasks = JoinSet::new();
    let mut outstanding = BTreeSet::new();
    spawn_boundaries(&mut tasks, &mut outstanding, initial);

    while !tasks.is_empty() {
        tokio::select! {
            reason = &mut abort => {
                let reason = reason.unwrap_or_else(|_| "stream handle dropped".to_string());
                tasks.abort_all();
                for id in std::mem::take(&mut outstanding) {
                    let _ = progress.send(Progress::Failed {
                        id,
                        error: RenderError::Aborted { reason: reason.clone() },
                    });
                }
                break;
            }
            Some(joined) = tasks.join_next() => {
                let (id, result) = match joined {
                    Ok(settled) => settled,
                    Err(err) => {
                        tracing::debug!(error = %err, "boundary task cancelled");
                        continue;
                    }
                };
                outstanding.remove(&id);

                let view = match result {
                    Ok(view) => view,
                    Err(error) => {
                        let _ = progress.send(Progress::Failed { id, error });
                        continue;
                    }
                };

                let mut writer = SegmentWriter::streaming(next_id);
                match writer.write_view_catching(&view) {
                    Ok(()) => {
                        let (segment, nested, next) = writer.finish();
                        next_id = next;
                        // Parent first, so the handle learns nested slots before they settle.
                        let _ = progress.send(Progress::Resolved { id, segment });
                        spawn_boundaries(&mut tasks, &mut outstanding, nested);
                    }
                    Err(error) => {
                        let _ = progress.send(Progress::Failed { id, error });
                    }
                }
            }
        }
    }

    let _ = progress.send(Progress::Done);
}

#[cfg(test)]
mod tests {
    use super::*;
    use staticpage_core::{app, Deferred};

    #[tokio::test]
    async fn tree_without_boundaries_is_ready_after_shell() {
        let mut stream = render_to_pipeable_stream(app(), StreamOptions::default());
        assert_eq!(stream.next_event().await, Some(StreamEvent::ShellReady));
        assert_eq!(stream.next_event().await, Some(StreamEvent::AllReady));
        assert_eq!(stream.next_event().await, None);
        assert!(stream.is_settled());
    }

    #[tokio::test]
    async fn pipe_twice_is_rejected() {
        let mut stream = render_to_pipeable_stream(app(), StreamOptions::default());
        let mut out = Vec::new();
        stream.pipe(&mut out).await.unwrap();
        assert_eq!(
            stream.pipe(&mut out).await.unwrap_err(),
            RenderError::AlreadyPiped
        );
    }

    #[tokio::test]
    async fn abort_after_all_ready_is_a_no_op() {
        let view = View::suspense("…", Deferred::ready(View::text("ok")));
        let mut stream = render_to_pipeable_stream(view, StreamOptions::default());
        while stream.next_event().await.is_some() {}
        stream.abort();

        let mut out = Vec::new();
        stream.pipe(&mut out).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "<!--$-->ok<!--/$-->");
    }
}
