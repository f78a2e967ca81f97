//! Fixed document boilerplate around a rendered markup fragment.
//!
//! The prefix opens `<div id="root">` and the suffix does not close it; the
//! published files have always looked like this and parsers close it.

pub const DOCUMENT_PREFIX: &str = r#"<!DOCTYPE html><body><div id="root">"#;
pub const DOCUMENT_SUFFIX: &str = "</body></html>";

/// Complete document for a markup fragment.
pub fn wrap_document(markup: &str) -> String {
    let mut doc = String::with_capacity(DOCUMENT_PREFIX.len() + markup.len() + DOCUMENT_SUFFIX.len());
    doc.push_str(DOCUMENT_PREFIX);
    doc.push_str(markup);
    doc.push_str(DOCUMENT_SUFFIX);
    doc
}
