use std::{fmt, path::PathBuf, str::FromStr};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::StudioError;

/// Decoded audio: interleaved f32 samples.
#[derive(Clone, Debug)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioData {
    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }
}

/// The stem-count variant of the separation model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum ModelKind {
    #[value(name = "2stems")]
    #[serde(rename = "2stems")]
    TwoStems,
    #[value(name = "4stems")]
    #[serde(rename = "4stems")]
    FourStems,
    #[value(name = "5stems")]
    #[serde(rename = "5stems")]
    FiveStems,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::TwoStems,
        ModelKind::FourStems,
        ModelKind::FiveStems,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::TwoStems => "2stems",
            ModelKind::FourStems => "4stems",
            ModelKind::FiveStems => "5stems",
        }
    }

    /// Instrument names in the order the engine emits them.
    pub fn stems(&self) -> &'static [&'static str] {
        match self {
            ModelKind::TwoStems => &["vocals", "accompaniment"],
            ModelKind::FourStems => &["vocals", "drums", "bass", "other"],
            ModelKind::FiveStems => &["vocals", "drums", "bass", "piano", "other"],
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2stems" => Ok(ModelKind::TwoStems),
            "4stems" => Ok(ModelKind::FourStems),
            "5stems" => Ok(ModelKind::FiveStems),
            other => Err(StudioError::Validation(format!(
                "unknown model `{other}` (expected 2stems, 4stems or 5stems)"
            ))),
        }
    }
}

/// One downloadable file referenced by a model manifest.
#[derive(Clone, Debug, Deserialize)]
pub struct ManifestArtifact {
    pub file: String,
    pub url: String,
    pub sha256: String,
    #[serde(default)]
    pub size_bytes: u64,
}

/// Remote model manifest: where the weights live and how to drive them.
#[derive(Clone, Debug, Deserialize)]
pub struct ModelManifest {
    pub name: String,
    pub version: String,
    pub backend: String,
    pub sample_rate: u32,
    pub window: usize,
    pub hop: usize,
    pub stems: Vec<String>,
    pub input_layout: String,
    pub output_layout: String,
    pub artifacts: Vec<ManifestArtifact>,
}

impl ModelManifest {
    pub fn resolve_primary_artifact(&self) -> Result<&ManifestArtifact, String> {
        self.artifacts
            .first()
            .ok_or_else(|| format!("manifest `{}` lists no artifacts", self.name))
    }
}

/// Per-stem metrics and rendered image locations.
#[derive(Clone, Debug, Serialize)]
pub struct StemSummary {
    pub name: String,
    pub duration: f64,
    pub rms: f64,
    pub peak: f64,
    pub wave_img: PathBuf,
    pub spec_img: PathBuf,
}
