use std::{fs, path::PathBuf};

use directories::ProjectDirs;

use crate::error::{Result, StudioError};

/// Directory roots and overrides, passed explicitly into every component.
///
/// Nothing in the crate reads a global path constant: tests point
/// `base_dir` at a temp directory and get a fully isolated tree.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Root under which `uploads/`, `output/` and `static/` are created.
    pub base_dir: PathBuf,
    /// Address the web server binds to.
    pub listen_addr: String,
    /// Fetch manifests from this URL instead of the embedded registry.
    pub manifest_url_override: Option<String>,
}

impl AppConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            listen_addr: "0.0.0.0:8000".into(),
            manifest_url_override: None,
        }
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.base_dir.join("uploads")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.base_dir.join("output")
    }

    pub fn static_dir(&self) -> PathBuf {
        self.base_dir.join("static")
    }

    pub fn waveform_dir(&self) -> PathBuf {
        self.static_dir().join("waveforms")
    }

    pub fn spectrogram_dir(&self) -> PathBuf {
        self.static_dir().join("spectrograms")
    }

    /// Create the working tree. Idempotent.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.upload_dir(),
            self.output_dir(),
            self.waveform_dir(),
            self.spectrogram_dir(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}

/// Per-user cache directory for downloaded model weights.
pub fn models_cache_dir() -> Result<PathBuf> {
    let proj = ProjectDirs::from("dev", "StemStudio", "stem-studio")
        .ok_or(StudioError::CacheDirUnavailable)?;
    Ok(proj.cache_dir().join("models"))
}
