//! staticpage core library — view tree, components, escaping, errors.
//!
//! Public API surface:
//! - [`view`] — the [`View`] tree, [`Component`] trait and [`Deferred`] content
//! - [`app`] — the fixed [`App`] page
//! - [`escape`] — HTML text/attribute escaping
//! - [`error`] — [`ComponentError`]

pub mod app;
pub mod error;
pub mod escape;
pub mod view;

pub use app::{app, App, HEADING, PARAGRAPH};
pub use error::ComponentError;
pub use escape::escape_html;
pub use view::{Component, Deferred, DeferredFuture, ElementView, IntoView, SuspenseView, View};
