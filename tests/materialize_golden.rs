use docpress::color::ColorResolver;
use docpress::live::LiveDocument;
use docpress::materialize::materialize;
use docpress::snapshot::Snapshot;
use docpress::style::{Cascade, OBSERVED_PROPERTIES};
use docpress::PipelineConfig;
use std::fs;

#[test]
fn test_materialized_style_golden() {
    let data = fs::read_to_string("tests/fixtures/materialize_golden.json").expect("Failed to read fixtures");
    let fixtures: serde_json::Value = serde_json::from_str(&data).expect("Invalid JSON");
    let cfg = PipelineConfig::default();
    let mut resolver = ColorResolver::new();

    for f in fixtures.as_array().unwrap() {
        let markup = f.get("markup").unwrap().as_str().unwrap();
        let css = f.get("css").unwrap().as_str().unwrap();
        let selector = f.get("selector").unwrap().as_str().unwrap();
        let property = f.get("property").unwrap().as_str().unwrap();
        let expected = f.get("expected").unwrap().as_str().unwrap();

        let live = LiveDocument::mount(markup, css, &cfg);
        let mut snap = Snapshot::capture(&live, &cfg).expect("mounted document");
        materialize(live.document(), &Cascade::new(live.stylesheet()), &mut snap, &mut resolver, &cfg);

        let live_id = live
            .document()
            .select_first(live.root().unwrap(), selector)
            .unwrap_or_else(|| panic!("no match for {}", selector));
        let clone_id = snap.clone_of(live_id).expect("live element has a clone");
        let clone = snap.document().element(clone_id).unwrap();
        assert_eq!(
            clone.style.get(property),
            Some(expected),
            "Mismatch for selector {} property {} (markup {}, css {})",
            selector,
            property,
            markup,
            css
        );
    }
}

#[test]
fn test_clone_is_self_describing() {
    let cfg = PipelineConfig::default();
    let markup = r#"
        <header class="head"><h1 id="name">Jane Q. Public</h1><span class="role">Engineer</span></header>
        <section class="block">
            <h2>Experience</h2>
            <ul><li>Built things</li><li>Shipped things</li></ul>
        </section>"#;
    let css = ".head { border-bottom: 1px solid #ccc; padding: 8px } .role { color: #555 } h2 { text-transform: uppercase }";
    let live = LiveDocument::mount(markup, css, &cfg);
    let mut snap = Snapshot::capture(&live, &cfg).unwrap();
    let report = materialize(
        live.document(),
        &Cascade::new(live.stylesheet()),
        &mut snap,
        &mut ColorResolver::new(),
        &cfg,
    );
    assert_eq!(report.elements, snap.element_count());
    assert_eq!(report.missing_styles, 0);

    let html = snap.to_html();
    assert!(!html.contains("class="));
    assert!(!html.contains("id="));

    // re-mounting the serialized clone without any stylesheet keeps every observed value
    let remounted = LiveDocument::mount(&html, "", &cfg);
    let root = remounted.root().unwrap();
    let first = remounted.document().descendant_elements(root)[0];
    let restored = &remounted.document().element(first).unwrap().style;
    let original = &snap.document().element(snap.root()).unwrap().style;
    for prop in OBSERVED_PROPERTIES {
        assert_eq!(restored.get(prop.name), original.get(prop.name), "{} lost in serialization", prop.name);
    }
}
