use criterion::{criterion_group, criterion_main, Criterion};
use docpress::color::ColorResolver;
use docpress::live::LiveDocument;
use docpress::materialize::materialize;
use docpress::snapshot::Snapshot;
use docpress::style::Cascade;
use docpress::PipelineConfig;

// Run with:
//    cargo bench --bench materialize_bench

fn sample_document() -> (String, String) {
    let mut markup = String::from("<header class=\"head\"><h1>Jane Q. Public</h1><p class=\"role\">Engineer</p></header>");
    for section in 0..8 {
        markup.push_str(&format!("<section class=\"block\"><h2>Section {}</h2><ul>", section));
        for item in 0..10 {
            markup.push_str(&format!("<li><strong>Item {}</strong> <span class=\"muted\">details</span></li>", item));
        }
        markup.push_str("</ul></section>");
    }
    let css = ".head { border-bottom: 2px solid #1e3a8a } .role { color: hsl(220, 60%, 40%) } \
               .block h2 { text-transform: uppercase; margin: 12px 0 4px } .muted { color: rgba(0, 0, 0, 0.6) }";
    (markup, css.to_string())
}

/// Bench: snapshot capture
fn bench_capture(c: &mut Criterion) {
    let cfg = PipelineConfig::default();
    let (markup, css) = sample_document();
    let live = LiveDocument::mount(&markup, &css, &cfg);
    c.bench_function("snapshot_capture", |b| {
        b.iter(|| Snapshot::capture(&live, &cfg).unwrap());
    });
}

/// Bench: capture + full registry materialization
fn bench_materialize(c: &mut Criterion) {
    let cfg = PipelineConfig::default();
    let (markup, css) = sample_document();
    let live = LiveDocument::mount(&markup, &css, &cfg);
    let cascade = Cascade::new(live.stylesheet());
    let mut resolver = ColorResolver::new();
    c.bench_function("materialize", |b| {
        b.iter(|| {
            let mut snap = Snapshot::capture(&live, &cfg).unwrap();
            materialize(live.document(), &cascade, &mut snap, &mut resolver, &cfg)
        });
    });
}

/// Bench: color canonicalization on the reused surface
fn bench_color_resolve(c: &mut Criterion) {
    let mut resolver = ColorResolver::new();
    c.bench_function("color_resolve", |b| {
        b.iter(|| resolver.resolve("hsl(220, 60%, 40%)"));
    });
}

criterion_group!(benches, bench_capture, bench_materialize, bench_color_resolve);
criterion_main!(benches);
