//! The view tree — what a page is made of before it becomes markup.
//!
//! A [`View`] is a plain, cloneable description of the document: elements,
//! text, fragments, lazily-rendered [`Component`]s and suspense boundaries
//! whose content arrives later through a [`Deferred`] future.

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::error::ComponentError;

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// Something that renders to a [`View`].
///
/// Components are rendered lazily by the renderer; a returned error fails
/// the enclosing render (the shell, or the surrounding suspense boundary).
pub trait Component: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn render(&self) -> Result<View, ComponentError>;
}

// ---------------------------------------------------------------------------
// Deferred content
// ---------------------------------------------------------------------------

/// Future producing the content of a suspense boundary.
pub type DeferredFuture = BoxFuture<'static, Result<View, ComponentError>>;

/// Factory for asynchronously-resolved content.
///
/// Calling [`Deferred::start`] creates a fresh future each time, so the same
/// tree can be rendered more than once.
#[derive(Clone)]
pub struct Deferred(Arc<dyn Fn() -> DeferredFuture + Send + Sync>);

impl Deferred {
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<View, ComponentError>> + Send + 'static,
    {
        Self(Arc::new(move || factory().boxed()))
    }

    /// Content that is already available.
    pub fn ready(view: View) -> Self {
        Self::new(move || {
            let view = view.clone();
            async move { Ok(view) }
        })
    }

    /// Start resolving the content.
    pub fn start(&self) -> DeferredFuture {
        (self.0)()
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deferred(..)")
    }
}

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

/// A node of the view tree.
#[derive(Clone)]
pub enum View {
    /// A DOM element.
    Element(ElementView),
    /// A text node (escaped on render).
    Text(Cow<'static, str>),
    /// Several views without a wrapper element.
    Fragment(Vec<View>),
    /// Renders nothing.
    Empty,
    /// A component rendered when the tree is rendered.
    Component(Arc<dyn Component>),
    /// A suspense boundary.
    Suspense(SuspenseView),
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Element(el) => el.fmt(f),
            View::Text(text) => f.debug_tuple("Text").field(text).finish(),
            View::Fragment(children) => f.debug_tuple("Fragment").field(children).finish(),
            View::Empty => f.write_str("Empty"),
            View::Component(c) => f.debug_tuple("Component").field(&c.name()).finish(),
            View::Suspense(s) => s.fmt(f),
        }
    }
}

impl View {
    /// Start building an element.
    pub fn element(tag: impl Into<Cow<'static, str>>) -> ElementView {
        ElementView::new(tag)
    }

    pub fn text(content: impl Into<Cow<'static, str>>) -> Self {
        Self::Text(content.into())
    }

    pub fn fragment(children: impl IntoIterator<Item = impl IntoView>) -> Self {
        Self::Fragment(children.into_iter().map(IntoView::into_view).collect())
    }

    pub fn empty() -> Self {
        Self::Empty
    }

    pub fn component(component: impl Component + 'static) -> Self {
        Self::Component(Arc::new(component))
    }

    /// A boundary that shows `fallback` until `content` resolves.
    pub fn suspense(fallback: impl IntoView, content: Deferred) -> Self {
        Self::Suspense(SuspenseView {
            fallback: Box::new(fallback.into_view()),
            content,
        })
    }
}

// ---------------------------------------------------------------------------
// ElementView
// ---------------------------------------------------------------------------

/// A DOM element in the view tree.
#[derive(Debug, Clone)]
pub struct ElementView {
    tag: Cow<'static, str>,
    attrs: Vec<(Cow<'static, str>, Cow<'static, str>)>,
    children: Vec<View>,
    is_void: bool,
}

impl ElementView {
    pub fn new(tag: impl Into<Cow<'static, str>>) -> Self {
        let tag = tag.into();
        let is_void = matches!(
            tag.as_ref(),
            "area"
                | "base"
                | "br"
                | "col"
                | "embed"
                | "hr"
                | "img"
                | "input"
                | "link"
                | "meta"
                | "source"
                | "track"
                | "wbr"
        );
        Self {
            tag,
            attrs: Vec::new(),
            children: Vec::new(),
            is_void,
        }
    }

    pub fn attr(
        mut self,
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn child(mut self, child: impl IntoView) -> Self {
        self.children.push(child.into_view());
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = impl IntoView>) -> Self {
        self.children
            .extend(children.into_iter().map(IntoView::into_view));
        self
    }

    pub fn tag_name(&self) -> &str {
        &self.tag
    }

    pub fn attrs(&self) -> &[(Cow<'static, str>, Cow<'static, str>)] {
        &self.attrs
    }

    pub fn child_views(&self) -> &[View] {
        &self.children
    }

    /// Void elements have no closing tag and never render children.
    pub fn is_void(&self) -> bool {
        self.is_void
    }
}

// ---------------------------------------------------------------------------
// SuspenseView
// ---------------------------------------------------------------------------

/// A suspense boundary: fallback markup plus content resolved later.
#[derive(Debug, Clone)]
pub struct SuspenseView {
    pub fallback: Box<View>,
    pub content: Deferred,
}

// ---------------------------------------------------------------------------
// IntoView
// ---------------------------------------------------------------------------

/// Conversion into a [`View`] node.
pub trait IntoView {
    fn into_view(self) -> View;
}

impl IntoView for View {
    fn into_view(self) -> View {
        self
    }
}

impl IntoView for ElementView {
    fn into_view(self) -> View {
        View::Element(self)
    }
}

impl IntoView for String {
    fn into_view(self) -> View {
        View::Text(Cow::Owned(self))
    }
}

impl IntoView for &'static str {
    fn into_view(self) -> View {
        View::Text(Cow::Borrowed(self))
    }
}

impl<T: IntoView> IntoView for Option<T> {
    fn into_view(self) -> View {
        match self {
            Some(v) => v.into_view(),
            None => View::Empty,
        }
    }
}

impl<T: IntoView> IntoView for Vec<T> {
    fn into_view(self) -> View {
        View::fragment(self)
    }
}
