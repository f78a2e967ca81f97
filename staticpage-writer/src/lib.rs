//! # staticpage-writer
//!
//! Persisting rendered pages: document boilerplate, an atomic whole-file
//! writer for buffered output, an incremental [`DocumentSink`] for streamed
//! output, and a unified diff between two written documents.

pub mod diff;
pub mod document;
pub mod error;
pub mod sink;
pub mod writer;

pub use diff::{diff_documents, DocumentDiff};
pub use document::{wrap_document, DOCUMENT_PREFIX, DOCUMENT_SUFFIX};
pub use error::WriteError;
pub use sink::{DocumentSink, SinkSummary};
pub use writer::{atomic_write, WriteResult};
