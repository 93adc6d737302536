//! The live document: current markup mounted under the editor's root element

use crate::dom::{Document, NodeId};
use crate::style::{Cascade, ComputedStyleSource, StyleMap, Stylesheet};
use crate::PipelineConfig;

/// Markup and stylesheet as currently shown in the editor
#[derive(Debug, Clone)]
pub struct LiveDocument {
    document: Document,
    root: Option<NodeId>,
    stylesheet: Stylesheet,
}

impl LiveDocument {
    /// Parse content and mount it under a fresh root element
    pub fn mount(markup: &str, stylesheet: &str, config: &PipelineConfig) -> Self {
        let mut document = Document::new();
        let doc_root = document.root();
        let root = document.append_element(
            doc_root,
            &config.root_tag,
            &[("class".to_string(), config.root_class.clone())],
        );
        document.append_markup(root, markup);
        Self {
            document,
            root: Some(root),
            stylesheet: Stylesheet::parse(stylesheet),
        }
    }

    /// Detach the root, as when the user navigates away from the editor
    pub fn unmount(&mut self) {
        self.root = None;
    }

    /// Root element while mounted
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn is_mounted(&self) -> bool {
        self.root.is_some()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn stylesheet(&self) -> &Stylesheet {
        &self.stylesheet
    }

    /// Computed styles of the mounted subtree (empty when unmounted)
    pub fn computed_styles(&self) -> StyleMap {
        match self.root {
            Some(root) => Cascade::new(&self.stylesheet).compute(&self.document, root),
            None => StyleMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mounts_markup_under_configured_root() {
        let cfg = PipelineConfig::default();
        let live = LiveDocument::mount("<h1>Jane</h1>", ".document-root h1 { color: red }", &cfg);
        let root = live.root().unwrap();
        let el = live.document().element(root).unwrap();
        assert_eq!(el.tag, "div");
        assert!(el.has_class("document-root"));
        let styles = live.computed_styles();
        let h1 = live.document().descendant_elements(root)[0];
        assert_eq!(styles[&h1].get("color"), Some("red"));
    }

    #[test]
    fn unmounted_document_has_no_styles() {
        let mut live = LiveDocument::mount("<p>x</p>", "", &PipelineConfig::default());
        live.unmount();
        assert!(!live.is_mounted());
        assert!(live.computed_styles().is_empty());
    }
}
