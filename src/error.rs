use thiserror::Error;

/// Central error type for stem-studio.
///
/// `Validation` is user-correctable and rendered inline; `Engine` wraps
/// whatever the separation backend reports; `NotFound` maps to an HTTP 404
/// at the web boundary. Everything else is a model-acquisition failure or
/// falls through the `Anyhow` catch-all.
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    #[error("{0}")]
    Validation(String),

    #[error("separation engine failed: {0}")]
    Engine(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("registry error: {0}")]
    Registry(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("checksum mismatch for {path}")]
    Checksum { path: String },

    #[error("cache dir not available")]
    CacheDirUnavailable,
}

impl From<std::io::Error> for StudioError {
    fn from(e: std::io::Error) -> Self {
        StudioError::Anyhow(e.into())
    }
}

impl From<serde_json::Error> for StudioError {
    fn from(e: serde_json::Error) -> Self {
        StudioError::Anyhow(e.into())
    }
}

impl From<reqwest::Error> for StudioError {
    fn from(e: reqwest::Error) -> Self {
        StudioError::Anyhow(e.into())
    }
}

impl From<hound::Error> for StudioError {
    fn from(e: hound::Error) -> Self {
        StudioError::Anyhow(e.into())
    }
}

impl From<symphonia::core::errors::Error> for StudioError {
    fn from(e: symphonia::core::errors::Error) -> Self {
        StudioError::Anyhow(e.into())
    }
}

impl From<image::ImageError> for StudioError {
    fn from(e: image::ImageError) -> Self {
        StudioError::Anyhow(e.into())
    }
}

#[cfg(all(feature = "onnx", not(feature = "engine-mock")))]
impl From<ort::Error> for StudioError {
    fn from(e: ort::Error) -> Self {
        StudioError::Engine(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;
