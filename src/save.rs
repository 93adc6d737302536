//! Save action for exported documents

use crate::{Error, Result};
use std::path::PathBuf;

/// Receives the bytes of a finished export
pub trait SaveSink: Send + Sync {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<()>;
}

/// Writes exports into a directory, creating it on first use
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SaveSink for DirectorySink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
        let to_err = |e: std::io::Error| Error::SaveError {
            file_name: file_name.to_string(),
            reason: e.to_string(),
        };
        std::fs::create_dir_all(&self.dir).map_err(to_err)?;
        std::fs::write(self.dir.join(file_name), bytes).map_err(to_err)?;
        log::info!("saved {} ({} bytes) to {}", file_name, bytes.len(), self.dir.display());
        Ok(())
    }
}

/// File name for an export of `display_name`
///
/// Whitespace runs become `_`, path separators are dropped and `suffix` is
/// appended: `"Jane Q. Public"` becomes `Jane_Q._Public_CV.pdf`.
pub fn export_file_name(display_name: &str, suffix: &str, fallback_stem: &str) -> String {
    let cleaned: String = display_name
        .trim()
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0'))
        .collect();
    let stem = cleaned.split_whitespace().collect::<Vec<_>>().join("_");
    let stem = if stem.is_empty() { fallback_stem } else { stem.as_str() };
    format!("{}{}", stem, suffix)
}
