//! Markup serialization shared by both rendering strategies.
//!
//! A render walks the view tree into a [`Segment`]: a run of finished HTML
//! interleaved with suspense boundary slots. The buffered strategy never
//! produces slots (boundaries render their fallback); the streaming
//! strategy leaves one slot per boundary and hands the deferred content back
//! to the caller as [`PendingBoundary`] entries.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use staticpage_core::{escape_html, ComponentError, Deferred, ElementView, View};

use crate::error::RenderError;

pub(crate) type BoundaryId = usize;

/// Separator between adjacent text nodes so they stay distinct when parsed.
const TEXT_SEPARATOR: &str = "<!-- -->";

pub(crate) const BOUNDARY_RESOLVED_START: &str = "<!--$-->";
pub(crate) const BOUNDARY_PENDING_START: &str = "<!--$?-->";
pub(crate) const BOUNDARY_CLIENT_START: &str = "<!--$!-->";
pub(crate) const BOUNDARY_END: &str = "<!--/$-->";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Buffered,
    Streaming,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Chunk {
    Html(String),
    Boundary { id: BoundaryId, fallback: String },
}

/// Rendered markup with boundary slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Segment {
    pub chunks: Vec<Chunk>,
}

impl Segment {
    pub fn boundary_ids(&self) -> impl Iterator<Item = BoundaryId> + '_ {
        self.chunks.iter().filter_map(|chunk| match chunk {
            Chunk::Boundary { id, .. } => Some(*id),
            Chunk::Html(_) => None,
        })
    }
}

/// Deferred content waiting for its slot.
#[derive(Debug)]
pub(crate) struct PendingBoundary {
    pub id: BoundaryId,
    pub content: Deferred,
}

/// Resolution state of a boundary slot.
#[derive(Debug, Clone)]
pub(crate) enum BoundaryState {
    Pending,
    Resolved(Segment),
    Failed(RenderError),
}

// ---------------------------------------------------------------------------
// SegmentWriter
// ---------------------------------------------------------------------------

pub(crate) struct SegmentWriter {
    mode: Mode,
    chunks: Vec<Chunk>,
    current: String,
    last_was_text: bool,
    next_id: BoundaryId,
    pending: Vec<PendingBoundary>,
}

impl SegmentWriter {
    pub fn buffered() -> Self {
        Self::with_mode(Mode::Buffered, 0)
    }

    /// Streaming writer that allocates boundary ids starting at `next_id`.
    pub fn streaming(next_id: BoundaryId) -> Self {
        Self::with_mode(Mode::Streaming, next_id)
    }

    fn with_mode(mode: Mode, next_id: BoundaryId) -> Self {
        Self {
            mode,
            chunks: Vec::new(),
            current: String::new(),
            last_was_text: false,
            next_id,
            pending: Vec::new(),
        }
    }

    pub fn write_view(&mut self, view: &View) -> Result<(), ComponentError> {
        match view {
            View::Element(el) => self.write_element(el)?,
            View::Text(text) => {
                if text.is_empty() {
                    return Ok(());
                }
                if self.last_was_text {
                    self.current.push_str(TEXT_SEPARATOR);
                }
                self.current.push_str(&escape_html(text));
                self.last_was_text = true;
            }
            View::Fragment(children) => {
                for child in children {
                    self.write_view(child)?;
                }
            }
            View::Empty => {}
            View::Component(component) => {
                let rendered = component.render()?;
                self.write_view(&rendered)?;
            }
            View::Suspense(suspense) => {
                self.last_was_text = false;
                let fallback = render_fallback(&suspense.fallback)?;
                match self.mode {
                    Mode::Buffered => {
                        self.current.push_str(BOUNDARY_CLIENT_START);
                        self.current.push_str(&fallback);
                        self.current.push_str(BOUNDARY_END);
                    }
                    Mode::Streaming => {
                        let id = self.next_id;
                        self.next_id += 1;
                        self.flush_current();
                        self.chunks.push(Chunk::Boundary { id, fallback });
                        self.pending.push(PendingBoundary {
                            id,
                            content: suspense.content.clone(),
                        });
                    }
                }
                self.last_was_text = false;
            }
        }
        Ok(())
    }

    /// [`SegmentWriter::write_view`], with a panicking component reported as
    /// [`RenderError::Panicked`]. Discard the writer after an error.
    pub fn write_view_catching(&mut self, view: &View) -> Result<(), RenderError> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.write_view(view))) {
            Ok(result) => result.map_err(RenderError::from),
            Err(payload) => Err(RenderError::panicked(payload.as_ref())),
        }
    }

    fn write_element(&mut self, el: &ElementView) -> Result<(), ComponentError> {
        self.last_was_text = false;
        self.current.push('<');
        self.current.push_str(el.tag_name());
        for (name, value) in el.attrs() {
            self.current.push(' ');
            self.current.push_str(name);
            self.current.push_str("=\"");
            self.current.push_str(&escape_html(value));
            self.current.push('"');
        }
        if el.is_void() {
            self.current.push_str("/>");
            return Ok(());
        }
        self.current.push('>');
        for child in el.child_views() {
            self.write_view(child)?;
        }
        self.current.push_str("</");
        self.current.push_str(el.tag_name());
        self.current.push('>');
        self.last_was_text = false;
        Ok(())
    }

    fn flush_current(&mut self) {
        if !self.current.is_empty() {
            self.chunks
                .push(Chunk::Html(std::mem::take(&mut self.current)));
        }
    }

    /// Finish the segment, returning it with its pending boundaries and the
    /// next unallocated boundary id.
    pub fn finish(mut self) -> (Segment, Vec<PendingBoundary>, BoundaryId) {
        self.flush_current();
        (
            Segment {
                chunks: self.chunks,
            },
            self.pending,
            self.next_id,
        )
    }
}

/// Fallbacks are rendered eagerly and never suspend themselves.
fn render_fallback(fallback: &View) -> Result<String, ComponentError> {
    let mut writer = SegmentWriter::buffered();
    writer.write_view(fallback)?;
    let (segment, _, _) = writer.finish();
    Ok(concat_html(&segment))
}

/// Join a segment that contains no boundary slots.
pub(crate) fn concat_html(segment: &Segment) -> String {
    let mut out = String::new();
    for chunk in &segment.chunks {
        if let Chunk::Html(html) = chunk {
            out.push_str(html);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Segment output
// ---------------------------------------------------------------------------

/// Ids used for progressively-streamed boundaries.
pub(crate) fn placeholder_id(prefix: &str, id: BoundaryId) -> String {
    format!("{prefix}B:{id}")
}

pub(crate) fn segment_id(prefix: &str, id: BoundaryId) -> String {
    format!("{prefix}S:{id}")
}

/// Serialize `segment`, inlining every settled boundary.
///
/// Boundaries still pending get a placeholder and are appended to
/// `still_pending` so the caller can stream their content later.
pub(crate) fn write_segment(
    segment: &Segment,
    boundaries: &HashMap<BoundaryId, BoundaryState>,
    prefix: &str,
    out: &mut String,
    still_pending: &mut Vec<BoundaryId>,
) {
    for chunk in &segment.chunks {
        match chunk {
            Chunk::Html(html) => out.push_str(html),
            Chunk::Boundary { id, fallback } => match boundaries.get(id) {
                Some(BoundaryState::Resolved(inner)) => {
                    out.push_str(BOUNDARY_RESOLVED_START);
                    write_segment(inner, boundaries, prefix, out, still_pending);
                    out.push_str(BOUNDARY_END);
                }
                Some(BoundaryState::Failed(_)) => {
                    out.push_str(BOUNDARY_CLIENT_START);
                    out.push_str(fallback);
                    out.push_str(BOUNDARY_END);
                }
                Some(BoundaryState::Pending) | None => {
                    out.push_str(BOUNDARY_PENDING_START);
                    out.push_str("<template id=\"");
                    out.push_str(&placeholder_id(prefix, *id));
                    out.push_str("\"></template>");
                    out.push_str(fallback);
                    out.push_str(BOUNDARY_END);
                    still_pending.push(*id);
                }
            },
        }
    }
}
