//! Renderer invocation
//!
//! Rasterizing and paginating a snapshot is delegated to an external engine
//! behind `RenderEngine`. The invoker prepares the engine input from a
//! materialized snapshot, awaits the engine and reads the page count back from
//! the produced PDF.

#[cfg(feature = "flow-engine")]
pub mod flow;

use crate::dom::{Document, NodeId};
use crate::snapshot::Snapshot;
use crate::{Error, PageFormat, PipelineConfig, RenderMode, Result};
use futures::future::BoxFuture;

/// Fidelity parameters handed to the engine
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub mode: RenderMode,
    /// Raster scale (device pixels per CSS pixel)
    pub scale: f32,
    /// Margin on every page edge in millimetres
    pub margin_mm: f32,
    pub page: PageFormat,
    /// Window width the engine lays the document out against
    pub window_width_px: u32,
    /// Quality of embedded raster images (0..=1)
    pub image_quality: f32,
}

impl RenderOptions {
    /// Options for a job of `mode`: exports trade speed for a higher scale
    pub fn for_mode(mode: RenderMode, config: &PipelineConfig) -> Self {
        let scale = match mode {
            RenderMode::Preview => config.preview_scale,
            RenderMode::Export => config.export_scale,
        };
        Self {
            mode,
            scale,
            margin_mm: config.page_margin_mm,
            page: config.page,
            window_width_px: config.window_width_px,
            image_quality: config.image_quality,
        }
    }
}

/// One regeneration attempt
#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    pub mode: RenderMode,
    /// Staleness generation the snapshot was taken at
    pub generation: u64,
    pub options: RenderOptions,
}

impl RenderJob {
    pub fn new(mode: RenderMode, generation: u64, config: &PipelineConfig) -> Self {
        Self {
            mode,
            generation,
            options: RenderOptions::for_mode(mode, config),
        }
    }
}

/// A self-describing, materialized clone ready for an engine
#[derive(Debug)]
pub struct RenderInput {
    /// Serialized clone with all styles inline
    pub html: String,
    pub document: Document,
    pub root: NodeId,
    pub options: RenderOptions,
}

impl RenderInput {
    pub fn from_snapshot(snapshot: Snapshot, options: RenderOptions) -> Self {
        let html = snapshot.to_html();
        let (document, root) = snapshot.into_parts();
        Self { html, document, root, options }
    }
}

/// The engine's binary document and its page count
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

/// External rasterize-and-paginate engine
///
/// Engines offer no cancellation: once called, the returned future runs to
/// completion and callers discard results they no longer need.
pub trait RenderEngine: Send + Sync {
    /// Render the input to a paginated PDF
    fn render(&self, input: RenderInput) -> BoxFuture<'_, Result<Vec<u8>>>;
}

/// Number of pages in a PDF
pub fn page_count(bytes: &[u8]) -> Result<usize> {
    let doc = lopdf::Document::load_mem(bytes)?;
    Ok(doc.get_pages().len())
}

/// Run `engine` on a materialized snapshot for `job`
pub async fn invoke(engine: &dyn RenderEngine, snapshot: Snapshot, job: &RenderJob) -> Result<RenderOutput> {
    let input = RenderInput::from_snapshot(snapshot, job.options.clone());
    log::trace!(
        "render: {} job (generation {}) input of {} bytes",
        job.mode,
        job.generation,
        input.html.len()
    );
    let bytes = engine.render(input).await?;
    let page_count = page_count(&bytes)?;
    if page_count == 0 {
        return Err(Error::InvalidOutput("document has no pages".into()));
    }
    Ok(RenderOutput { bytes, page_count })
}
