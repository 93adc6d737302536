//! Style materialization: bake computed styles onto a snapshot clone
//!
//! After this pass the clone no longer depends on any stylesheet: every
//! property in the Observed-Property registry is an explicit inline value,
//! class and id hooks are gone, and the root has been normalized to the
//! physical page the renderer expects.

use crate::color::ColorResolver;
use crate::dom::Document;
use crate::snapshot::Snapshot;
use crate::style::properties::expand;
use crate::style::registry::ValueKind;
use crate::style::{ComputedStyleSource, OBSERVED_PROPERTIES, REGISTRY_VERSION};
use crate::PipelineConfig;

/// Counters describing one materialization pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    pub registry_version: u32,
    pub elements: usize,
    pub properties_written: usize,
    pub colors_resolved: usize,
    /// Live elements without a computed style (left untouched)
    pub missing_styles: usize,
}

/// Materialize every (live, clone) pair of `snapshot`, then normalize the root
pub fn materialize(
    live: &Document,
    source: &dyn ComputedStyleSource,
    snapshot: &mut Snapshot,
    resolver: &mut ColorResolver,
    config: &PipelineConfig,
) -> MaterializeReport {
    let styles = source.compute(live, snapshot.live_root());
    let mut report = MaterializeReport {
        registry_version: REGISTRY_VERSION,
        ..Default::default()
    };

    for (live_id, clone_id) in snapshot.element_pairs() {
        let Some(computed) = styles.get(&live_id) else {
            report.missing_styles += 1;
            continue;
        };
        let Some(clone) = snapshot.document_mut().element_mut(clone_id) else {
            continue;
        };
        for prop in OBSERVED_PROPERTIES {
            let Some(value) = (prop.read)(computed) else { continue };
            let value = match prop.kind {
                ValueKind::Color => {
                    report.colors_resolved += 1;
                    resolver.resolve(value)
                }
                ValueKind::Plain => value.to_string(),
            };
            (prop.write)(&mut clone.style, &value);
            report.properties_written += 1;
        }
        clone.remove_attr("class");
        clone.remove_attr("id");
        report.elements += 1;
    }

    normalize_root(snapshot, resolver, config);

    log::debug!(
        "materialize: registry v{} {} elements, {} properties, {} colors",
        report.registry_version,
        report.elements,
        report.properties_written,
        report.colors_resolved
    );
    report
}

/// Turn the possibly scaled on-screen root into a flat physical page
fn normalize_root(snapshot: &mut Snapshot, resolver: &mut ColorResolver, config: &PipelineConfig) {
    let root = snapshot.root();
    let background = resolver.resolve("#ffffff");
    let Some(el) = snapshot.document_mut().element_mut(root) else {
        return;
    };
    let style = &mut el.style;
    style.set("transform", "none");
    style.set("box-shadow", "none");
    style.set("opacity", "1");
    style.set("position", "static");
    style.set("filter", "none");
    for side in ["margin-top", "margin-right", "margin-bottom", "margin-left"] {
        style.set(side, "0px");
    }
    style.set("background-image", "none");
    style.set("background-color", &background);
    style.set("width", &config.page_width);
    for (name, value) in expand("padding", &config.root_padding) {
        style.set(&name, &value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::LiveDocument;
    use crate::style::{Cascade, ComputedStyle, StyleMap};
    use crate::dom::NodeId;

    fn run(markup: &str, css: &str) -> (LiveDocument, Snapshot, MaterializeReport) {
        let cfg = PipelineConfig::default();
        let live = LiveDocument::mount(markup, css, &cfg);
        let mut snap = Snapshot::capture(&live, &cfg).unwrap();
        let cascade = Cascade::new(live.stylesheet());
        let mut resolver = ColorResolver::new();
        let report = materialize(live.document(), &cascade, &mut snap, &mut resolver, &cfg);
        (live, snap, report)
    }

    #[test]
    fn every_registry_property_is_written() {
        let (_, snap, report) = run("<h1>Jane</h1>", "");
        assert_eq!(report.elements, 2);
        assert_eq!(report.properties_written, 2 * OBSERVED_PROPERTIES.len());
        let (_, h1) = snap.element_pairs()[1];
        let style = &snap.document().element(h1).unwrap().style;
        for prop in OBSERVED_PROPERTIES {
            assert!(style.get(prop.name).is_some(), "{} not materialized", prop.name);
        }
        assert_eq!(style.get("font-size"), Some("32px"));
    }

    #[test]
    fn colors_are_canonical_and_classes_removed() {
        let (_, snap, _) = run(
            "<p class=\"accent\" id=\"lead\">x</p>",
            ".accent { color: teal; border-left: 2px solid hsl(0, 100%, 50%) }",
        );
        let (_, p) = snap.element_pairs()[1];
        let el = snap.document().element(p).unwrap();
        assert_eq!(el.style.get("color"), Some("rgba(0, 128, 128, 1)"));
        assert_eq!(el.style.get("border-left-color"), Some("rgba(255, 0, 0, 1)"));
        assert_eq!(el.style.get("border-left-width"), Some("2px"));
        // transparent backgrounds are kept as-is
        assert_eq!(el.style.get("background-color"), Some("rgba(0, 0, 0, 0)"));
        assert_eq!(el.attr("class"), None);
        assert_eq!(el.attr("id"), None);
    }

    #[test]
    fn root_is_normalized_after_the_pass() {
        let (_, snap, _) = run(
            "<p>x</p>",
            ".document-root { transform: scale(0.6); margin: 20px; background: #eee; box-shadow: 0 0 4px black; opacity: 0.5 }",
        );
        let root = snap.document().element(snap.root()).unwrap();
        assert_eq!(root.style.get("transform"), Some("none"));
        assert_eq!(root.style.get("box-shadow"), Some("none"));
        assert_eq!(root.style.get("opacity"), Some("1"));
        assert_eq!(root.style.get("position"), Some("static"));
        assert_eq!(root.style.get("margin-left"), Some("0px"));
        assert_eq!(root.style.get("background-color"), Some("rgba(255, 255, 255, 1)"));
        assert_eq!(root.style.get("width"), Some("21cm"));
        assert_eq!(root.style.get("padding-bottom"), Some("30px"));
        assert_eq!(root.style.get("padding-top"), Some("0"));
    }

    #[test]
    fn live_document_is_untouched() {
        let (live, _, _) = run("<p class=\"a\">x</p>", ".a { color: red }");
        let root = live.root().unwrap();
        let p = live.document().descendant_elements(root)[0];
        let el = live.document().element(p).unwrap();
        assert!(el.has_class("a"));
        assert!(el.style.is_empty());
    }

    struct FixedStyles;

    impl ComputedStyleSource for FixedStyles {
        fn compute(&self, _document: &Document, root: NodeId) -> StyleMap {
            let mut style = ComputedStyle::default();
            style.set("color", "blue");
            let mut map = StyleMap::new();
            map.insert(root, style);
            map
        }
    }

    #[test]
    fn custom_style_sources_are_honored() {
        let cfg = PipelineConfig::default();
        let live = LiveDocument::mount("<p>x</p>", "", &cfg);
        let mut snap = Snapshot::capture(&live, &cfg).unwrap();
        let report = materialize(live.document(), &FixedStyles, &mut snap, &mut ColorResolver::new(), &cfg);
        assert_eq!(report.elements, 1);
        assert_eq!(report.missing_styles, 1);
        assert_eq!(report.properties_written, 1);
        let root = snap.document().element(snap.root()).unwrap();
        assert_eq!(root.style.get("color"), Some("rgba(0, 0, 255, 1)"));
    }
}
