//! # staticpage-renderer
//!
//! Server renderer for [`staticpage_core::View`] trees, with two strategies:
//!
//! - [`render_to_string`] — buffered, synchronous, no suspension support.
//! - [`render_to_pipeable_stream`] — renders the shell synchronously,
//!   resolves suspense boundaries on a tokio task and hands back a
//!   [`PipeableStream`] that reports lifecycle [`StreamEvent`]s and pipes
//!   markup into any `AsyncWrite` destination.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use staticpage_core::app;
//! use staticpage_renderer::{render_to_pipeable_stream, render_to_string, StreamEvent, StreamOptions};
//!
//! async fn render_both() -> Result<(), staticpage_renderer::RenderError> {
//!     let markup = render_to_string(&app())?;
//!     println!("{markup}");
//!
//!     let mut stream = render_to_pipeable_stream(app(), StreamOptions::default());
//!     while let Some(event) = stream.next_event().await {
//!         if let StreamEvent::AllReady = event {
//!             let mut out = Vec::new();
//!             stream.pipe(&mut out).await?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod buffered;
pub mod error;
mod markup;
pub mod stream;

pub use buffered::render_to_string;
pub use error::RenderError;
pub use stream::{render_to_pipeable_stream, PipeableStream, StreamEvent, StreamOptions};
