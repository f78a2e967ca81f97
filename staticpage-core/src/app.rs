//! The page this tool publishes.

use crate::error::ComponentError;
use crate::view::{Component, IntoView, View};

pub const HEADING: &str = "React as a Static Page Bundler";
pub const PARAGRAPH: &str = "Converting a React App to Static Html";

/// Fixed page: a `#parent` container with one heading and one paragraph.
#[derive(Debug, Clone, Copy, Default)]
pub struct App;

impl Component for App {
    fn name(&self) -> &str {
        "App"
    }

    fn render(&self) -> Result<View, ComponentError> {
        Ok(View::element("div")
            .attr("id", "parent")
            .child(View::element("h1").child(HEADING))
            .child(View::element("p").child(PARAGRAPH))
            .into_view())
    }
}

/// The root view handed to both renderers.
pub fn app() -> View {
    View::component(App)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_renders_parent_with_heading_and_paragraph() {
        let View::Element(root) = App.render().unwrap() else {
            panic!("App should render an element");
        };
        assert_eq!(root.tag_name(), "div");
        assert_eq!(root.attrs()[0].0, "id");
        assert_eq!(root.attrs()[0].1, "parent");

        let tags: Vec<_> = root
            .child_views()
            .iter()
            .map(|child| match child {
                View::Element(el) => el.tag_name().to_string(),
                other => panic!("unexpected child {other:?}"),
            })
            .collect();
        assert_eq!(tags, ["h1", "p"]);
    }
}
