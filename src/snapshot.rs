//! Isolated snapshots of the live document
//!
//! A snapshot is a structural duplicate of the mounted subtree inside its own
//! arena, wrapped in an off-screen staging container. Every copied node is
//! recorded in an explicit live-to-clone id map so later passes never depend
//! on the two trees sharing a traversal order. Dropping the snapshot removes
//! the staging container together with the clone.

use crate::dom::{Document, NodeId};
use crate::live::LiveDocument;
use crate::PipelineConfig;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

#[derive(Debug)]
pub struct Snapshot {
    document: Document,
    container: NodeId,
    root: NodeId,
    live_root: NodeId,
    id_map: HashMap<NodeId, NodeId>,
    live_order: Vec<NodeId>,
    stripped_attrs: usize,
}

impl Snapshot {
    /// Copy the mounted live subtree. Returns `None` when nothing is mounted.
    pub fn capture(live: &LiveDocument, config: &PipelineConfig) -> Option<Snapshot> {
        let live_root = live.root()?;
        let source = live.document();
        source.element(live_root)?;

        let mut document = Document::new();
        let doc_root = document.root();
        let container = document.append_element(doc_root, "div", &[]);
        if let Some(el) = document.element_mut(container) {
            el.style.set("position", "absolute");
            el.style.set("left", "-9999px");
            el.style.set("top", "0");
            el.style.set("width", &config.page_width);
        }

        let mut id_map = HashMap::new();
        let root = document.clone_subtree_from(source, live_root, container, &mut |live_id, clone_id| {
            id_map.insert(live_id, clone_id);
        })?;

        let mut live_order = vec![live_root];
        live_order.extend(source.descendant_elements(live_root));

        let mut stripped_attrs = 0;
        for clone_id in live_order.iter().filter_map(|id| id_map.get(id)) {
            if let Some(el) = document.element_mut(*clone_id) {
                stripped_attrs += el.retain_attrs(|name| !is_editor_hook(name, config));
            }
        }

        log::trace!(
            "snapshot: captured {} elements ({} editor hook attributes stripped)",
            live_order.len(),
            stripped_attrs
        );

        Some(Snapshot {
            document,
            container,
            root,
            live_root,
            id_map,
            live_order,
            stripped_attrs,
        })
    }

    /// Root of the clone (inside the staging container)
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The off-screen staging container holding the clone
    pub fn container(&self) -> NodeId {
        self.container
    }

    /// Live root this snapshot was taken from
    pub fn live_root(&self) -> NodeId {
        self.live_root
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Clone of a live node
    pub fn clone_of(&self, live_id: NodeId) -> Option<NodeId> {
        self.id_map.get(&live_id).copied()
    }

    /// (live, clone) element pairs, root first, in live document order
    pub fn element_pairs(&self) -> Vec<(NodeId, NodeId)> {
        self.live_order
            .iter()
            .filter_map(|live| self.id_map.get(live).map(|clone| (*live, *clone)))
            .collect()
    }

    pub fn element_count(&self) -> usize {
        self.live_order.len()
    }

    pub fn stripped_attrs(&self) -> usize {
        self.stripped_attrs
    }

    /// Serialized clone, self-describing once materialized
    pub fn to_html(&self) -> String {
        self.document.to_html(self.root)
    }

    /// sha256 of the serialized clone
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.to_html().as_bytes()))
    }

    /// Hand the clone over to a renderer, consuming the snapshot
    pub fn into_parts(self) -> (Document, NodeId) {
        (self.document, self.root)
    }
}

fn is_editor_hook(name: &str, config: &PipelineConfig) -> bool {
    config.editor_hook_attributes.iter().any(|a| a == name)
        || config.editor_hook_prefixes.iter().any(|p| name.starts_with(p.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(markup: &str) -> LiveDocument {
        LiveDocument::mount(markup, "", &PipelineConfig::default())
    }

    #[test]
    fn capture_copies_structure_and_maps_ids() {
        let live = live("<section><h2>Work</h2><ul><li>One</li><li>Two</li></ul></section>");
        let snap = Snapshot::capture(&live, &PipelineConfig::default()).unwrap();
        assert_eq!(snap.element_count(), 6);
        for (live_id, clone_id) in snap.element_pairs() {
            let a = live.document().element(live_id).unwrap();
            let b = snap.document().element(clone_id).unwrap();
            assert_eq!(a.tag, b.tag);
        }
        assert_eq!(snap.clone_of(snap.live_root()), Some(snap.root()));
        assert_eq!(
            snap.document().text_content(snap.root()),
            live.document().text_content(live.root().unwrap())
        );
    }

    #[test]
    fn staging_container_is_off_screen() {
        let snap = Snapshot::capture(&live("<p>x</p>"), &PipelineConfig::default()).unwrap();
        let container = snap.document().element(snap.container()).unwrap();
        assert_eq!(container.style.get("position"), Some("absolute"));
        assert_eq!(container.style.get("left"), Some("-9999px"));
        assert_eq!(container.style.get("width"), Some("21cm"));
        assert_eq!(snap.document().parent(snap.root()), Some(snap.container()));
    }

    #[test]
    fn editor_hooks_are_stripped_from_clone_only() {
        let live = live(
            "<p contenteditable=\"true\" data-editor-field=\"summary\" data-role=\"bio\">x</p>",
        );
        let snap = Snapshot::capture(&live, &PipelineConfig::default()).unwrap();
        assert_eq!(snap.stripped_attrs(), 2);
        let (live_p, clone_p) = snap.element_pairs()[1];
        let clone = snap.document().element(clone_p).unwrap();
        assert_eq!(clone.attr("contenteditable"), None);
        assert_eq!(clone.attr("data-editor-field"), None);
        assert_eq!(clone.attr("data-role"), Some("bio"));
        assert!(live.document().element(live_p).unwrap().attr("contenteditable").is_some());
    }

    #[test]
    fn unmounted_capture_is_none() {
        let mut live = live("<p>x</p>");
        live.unmount();
        assert!(Snapshot::capture(&live, &PipelineConfig::default()).is_none());
    }

    #[test]
    fn fingerprint_is_stable() {
        let live = live("<p>x</p>");
        let cfg = PipelineConfig::default();
        let a = Snapshot::capture(&live, &cfg).unwrap().fingerprint();
        let b = Snapshot::capture(&live, &cfg).unwrap().fingerprint();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
