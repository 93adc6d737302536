//! docpress
//!
//! Export pipeline for a live, continuously edited styled document. It keeps
//! a paginated PDF preview up to date while the user edits, and produces the
//! same document at higher fidelity for download.
//!
//! # Pipeline
//!
//! - **Staleness tracking**: every content change flags the preview stale
//!   and bumps a generation token; a debounce timer schedules regeneration
//!   only while the preview is visible
//! - **Snapshot**: the live subtree is deep-copied into an invisible staging
//!   container with an explicit live-to-clone id map
//! - **Materialization**: computed styles are baked onto the clone through
//!   the Observed-Property registry, colors canonicalized on a raster surface
//! - **Rendering**: an external engine behind `RenderEngine` rasterizes and
//!   paginates the clone; the page count is read back from the PDF
//! - **Artifacts**: preview output becomes an RAII `ArtifactHandle`; replacing
//!   it always releases the previous one
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use docpress::{ExportPipeline, PipelineConfig};
//! use docpress::artifact::MemoryArtifactStore;
//! use docpress::render::flow::FlowEngine;
//! use docpress::save::DirectorySink;
//!
//! # async fn run() -> docpress::Result<()> {
//! let pipeline = ExportPipeline::new(
//!     PipelineConfig::default(),
//!     Arc::new(FlowEngine::new()),
//!     Arc::new(MemoryArtifactStore::new()),
//!     Arc::new(DirectorySink::new("out")),
//! );
//! pipeline.update_content("<h1>Jane Q. Public</h1><p>Engineer</p>", "h1 { color: #1e3a8a }");
//! pipeline.settled().await;
//! println!("preview at {:?} ({} pages)", pipeline.preview_url(), pipeline.page_count());
//!
//! if let Some(outcome) = pipeline.export("Jane Q. Public").await? {
//!     println!("saved {}", outcome.file_name);
//! }
//! # Ok(())
//! # }
//! ```

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub mod error;
pub use error::{Error, Result};

pub mod artifact;
pub mod color;
pub mod dom;
pub mod live;
pub mod materialize;
pub mod pipeline;
pub mod render;
pub mod save;
pub mod snapshot;
pub mod staleness;
pub mod style;

pub use artifact::{ArtifactHandle, ArtifactSlot, ArtifactStore};
pub use pipeline::{ExportOutcome, ExportPipeline, JobState};
pub use render::{RenderEngine, RenderInput, RenderJob, RenderOptions, RenderOutput};
pub use staleness::{ActiveSurface, ViewportClass};

/// Configuration for an export pipeline
///
/// Defaults match the editor this pipeline was built for: a 1024 px layout
/// breakpoint, 2 s / 0.5 s debounce delays, A4 portrait pages with 10 mm
/// margins, raster scale 1 for previews and 2 for exports.
///
/// # Examples
///
/// ```
/// let cfg = docpress::PipelineConfig::default();
/// assert_eq!(cfg.wide_delay_ms, 2000);
/// assert_eq!(cfg.page_width, "21cm");
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Debounce delay on a wide (side-by-side) layout
    pub wide_delay_ms: u64,
    /// Debounce delay on a narrow layout while the preview pane is active
    pub narrow_delay_ms: u64,
    /// Window widths at or above this are a wide layout
    pub wide_breakpoint_px: u32,
    /// Raster scale used for previews
    pub preview_scale: f32,
    /// Raster scale used for exports
    pub export_scale: f32,
    /// Page margin on every edge, in millimetres
    pub page_margin_mm: f32,
    /// Physical page size
    pub page: PageFormat,
    /// Fixed width applied to the snapshot root
    pub page_width: String,
    /// Padding applied to the snapshot root after normalization
    pub root_padding: String,
    /// Window width the engine lays the snapshot out against
    pub window_width_px: u32,
    /// Quality for raster images embedded by the engine (0..=1)
    pub image_quality: f32,
    /// Appended to the sanitized subject name for exports
    pub file_suffix: String,
    /// File stem used when the subject has no display name
    pub fallback_file_stem: String,
    /// Attributes used only as live-editor styling hooks
    pub editor_hook_attributes: Vec<String>,
    /// Attribute prefixes used only as live-editor styling hooks
    pub editor_hook_prefixes: Vec<String>,
    /// Tag of the element the markup is mounted under
    pub root_tag: String,
    /// Class of the element the markup is mounted under
    pub root_class: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            wide_delay_ms: 2000,
            narrow_delay_ms: 500,
            wide_breakpoint_px: 1024,
            preview_scale: 1.0,
            export_scale: 2.0,
            page_margin_mm: 10.0,
            page: PageFormat::default(),
            page_width: "21cm".to_string(),
            root_padding: "0 0 30px 0".to_string(),
            window_width_px: 794,
            image_quality: 0.98,
            file_suffix: "_CV.pdf".to_string(),
            fallback_file_stem: "document".to_string(),
            editor_hook_attributes: vec![
                "contenteditable".to_string(),
                "spellcheck".to_string(),
                "draggable".to_string(),
            ],
            editor_hook_prefixes: vec!["data-editor-".to_string()],
            root_tag: "div".to_string(),
            root_class: "document-root".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: PipelineConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.preview_scale > 0.0 && self.export_scale > 0.0) {
            return Err(Error::ConfigError("raster scales must be positive".into()));
        }
        if self.page.width_mm <= 0.0 || self.page.height_mm <= 0.0 {
            return Err(Error::ConfigError("page dimensions must be positive".into()));
        }
        let min_side = self.page.width_mm.min(self.page.height_mm);
        if self.page_margin_mm < 0.0 || self.page_margin_mm * 2.0 >= min_side {
            return Err(Error::ConfigError(format!(
                "page margin {}mm leaves no printable area",
                self.page_margin_mm
            )));
        }
        if !(0.0..=1.0).contains(&self.image_quality) {
            return Err(Error::ConfigError("image quality must be within 0..=1".into()));
        }
        if self.file_suffix.contains(['/', '\\']) {
            return Err(Error::ConfigError("file suffix must not contain path separators".into()));
        }
        Ok(())
    }

    pub fn wide_delay(&self) -> Duration {
        Duration::from_millis(self.wide_delay_ms)
    }

    pub fn narrow_delay(&self) -> Duration {
        Duration::from_millis(self.narrow_delay_ms)
    }

    pub fn viewport_class(&self, window_width_px: u32) -> ViewportClass {
        ViewportClass::from_width(window_width_px, self.wide_breakpoint_px)
    }
}

/// Physical page size in millimetres
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PageFormat {
    pub width_mm: f32,
    pub height_mm: f32,
}

impl Default for PageFormat {
    /// A4 portrait
    fn default() -> Self {
        Self { width_mm: 210.0, height_mm: 297.0 }
    }
}

/// Purpose of a render job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderMode {
    /// Continuous on-screen preview
    Preview,
    /// One-off download
    Export,
}

impl std::fmt::Display for RenderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderMode::Preview => f.write_str("preview"),
            RenderMode::Export => f.write_str("export"),
        }
    }
}
