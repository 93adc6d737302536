use docpress::artifact::MemoryArtifactStore;
use docpress::render::flow::FlowEngine;
use docpress::render::page_count;
use docpress::save::DirectorySink;
use docpress::{ActiveSurface, Error, ExportPipeline, JobState, PipelineConfig, RenderEngine, RenderInput, Result};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const CV_MARKUP: &str = r#"
<header class="head" contenteditable="true">
  <h1>Jane Q. Public</h1>
  <p class="role">Staff Engineer</p>
</header>
<section>
  <h2>Experience</h2>
  <ul><li>Led the rendering team</li><li>Shipped the export pipeline</li></ul>
</section>"#;

const CV_CSS: &str = r#"
.head { border-bottom: 2px solid #1e3a8a; padding-bottom: 8px }
h1 { color: #1e3a8a; font-size: 28px }
.role { color: hsl(0, 0%, 40%); text-transform: uppercase }
"#;

/// Flow engine that can be switched into failing mode
#[derive(Default)]
struct FlakyEngine {
    inner: FlowEngine,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl RenderEngine for FlakyEngine {
    fn render(&self, input: RenderInput) -> BoxFuture<'_, Result<Vec<u8>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Box::pin(async { Err(Error::RenderError("renderer unavailable".into())) });
        }
        self.inner.render(input)
    }
}

fn pipeline_in(dir: &std::path::Path) -> (ExportPipeline, Arc<FlakyEngine>, Arc<MemoryArtifactStore>) {
    let engine = Arc::new(FlakyEngine::default());
    let store = Arc::new(MemoryArtifactStore::new());
    let pipeline = ExportPipeline::new(
        PipelineConfig::default(),
        engine.clone(),
        store.clone(),
        Arc::new(DirectorySink::new(dir)),
    );
    (pipeline, engine, store)
}

#[tokio::test(start_paused = true)]
async fn test_preview_cycle_publishes_loadable_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, engine, store) = pipeline_in(dir.path());
    pipeline.set_viewport_width(1440);
    pipeline.update_content(CV_MARKUP, CV_CSS);
    assert!(pipeline.preview_url().is_none());
    pipeline.settled().await;

    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    let url = pipeline.preview_url().expect("preview published");
    let bytes = store.fetch(&url).unwrap();
    assert_eq!(page_count(&bytes).unwrap(), pipeline.page_count());
    assert_eq!(pipeline.page_count(), 1);
    assert!(store.data_url(&url).unwrap().starts_with("data:application/pdf;base64,"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_preview_keeps_previous_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, engine, store) = pipeline_in(dir.path());
    pipeline.update_content(CV_MARKUP, CV_CSS);
    pipeline.settled().await;
    let before = pipeline.preview_url().unwrap();

    engine.fail.store(true, Ordering::SeqCst);
    pipeline.update_content(&CV_MARKUP.replace("Staff", "Principal"), CV_CSS);
    pipeline.settled().await;

    assert_eq!(pipeline.job_state(), JobState::Failed);
    assert_eq!(pipeline.preview_url(), Some(before));
    assert_eq!(store.live_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_export_writes_named_file() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _engine, _store) = pipeline_in(dir.path());
    pipeline.update_content(CV_MARKUP, CV_CSS);

    let outcome = pipeline.export("Jane Q. Public").await.unwrap().unwrap();
    assert_eq!(outcome.file_name, "Jane_Q._Public_CV.pdf");

    let written = std::fs::read(dir.path().join("Jane_Q._Public_CV.pdf")).unwrap();
    assert_eq!(written.len(), outcome.size);
    assert_eq!(page_count(&written).unwrap(), outcome.page_count);
    // exports never touch the preview
    assert!(pipeline.preview_url().is_none());
    assert_eq!(pipeline.page_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_long_document_spans_pages() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _engine, _store) = pipeline_in(dir.path());
    let entries: String = (0..120)
        .map(|i| format!("<p>Entry {}: maintained the build and release tooling for the team.</p>", i))
        .collect();
    pipeline.update_content(&entries, "p { margin: 10px 0 }");
    assert_eq!(pipeline.regenerate_now().await, JobState::Succeeded);
    assert!(pipeline.page_count() > 1);
}

#[tokio::test(start_paused = true)]
async fn test_pane_switch_on_narrow_layout() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, engine, _store) = pipeline_in(dir.path());
    pipeline.set_viewport_width(390);
    pipeline.update_content(CV_MARKUP, CV_CSS);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);

    pipeline.set_active_surface(ActiveSurface::Preview);
    pipeline.settled().await;
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    assert!(!pipeline.is_stale());
}
