//! Buffered rendering — the whole tree to one string, synchronously.

use staticpage_core::View;

use crate::error::RenderError;
use crate::markup::{concat_html, SegmentWriter};

/// Render `view` to its complete markup fragment.
///
/// Suspense boundaries cannot wait here: they render their fallback, marked
/// for client rendering. Any component error or panic fails the whole render.
pub fn render_to_string(view: &View) -> Result<String, RenderError> {
    let mut writer = SegmentWriter::buffered();
    writer.write_view_catching(view)?;
    let (segment, _, _) = writer.finish();
    let markup = concat_html(&segment);
    tracing::debug!(bytes = markup.len(), "buffered render complete");
    Ok(markup)
}
