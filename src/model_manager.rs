use std::{fs, path::PathBuf};

use crate::{
    config::models_cache_dir,
    error::{Result, StudioError},
    io::{
        crypto::verify_sha256,
        net::{download_with_progress, http_client},
    },
    registry::resolve_manifest_url,
    types::{ModelKind, ModelManifest},
};

/// A fetched manifest plus the verified local weights file.
#[derive(Debug)]
pub struct ModelHandle {
    pub manifest: ModelManifest,
    pub local_path: PathBuf,
}

/// Fetch the manifest for `kind` and make sure its primary artifact is in
/// the local cache with a matching checksum. Re-downloads on mismatch.
pub fn ensure_model(kind: ModelKind, manifest_url_override: Option<&str>) -> Result<ModelHandle> {
    let manifest_url = match manifest_url_override {
        Some(url) => url.to_string(),
        None => resolve_manifest_url(kind)?,
    };

    let client = http_client();
    let manifest: ModelManifest = client
        .get(&manifest_url)
        .send()?
        .error_for_status()?
        .json()?;

    let artifact = manifest
        .resolve_primary_artifact()
        .map_err(StudioError::Manifest)?
        .clone();

    let cache_dir = models_cache_dir()?;
    fs::create_dir_all(&cache_dir)?;

    let ext = artifact
        .file
        .rsplit('.')
        .next()
        .map(|s| format!(".{s}"))
        .unwrap_or_default();
    let local_path = cache_dir.join(format!("{}-{}{}", manifest.name, &artifact.sha256[..8], ext));

    let cached = matches!(verify_sha256(&local_path, &artifact.sha256), Ok(true));
    if cached {
        tracing::debug!(model = %manifest.name, path = %local_path.display(), "model already cached");
    } else {
        tracing::info!(model = %manifest.name, url = %artifact.url, "downloading model weights");
        download_with_progress(&client, &artifact.url, &local_path)?;
        if !verify_sha256(&local_path, &artifact.sha256)? {
            return Err(StudioError::Checksum {
                path: local_path.display().to_string(),
            });
        }
        if artifact.size_bytes > 0 {
            let size = fs::metadata(&local_path).map(|m| m.len()).unwrap_or(0);
            if size != artifact.size_bytes {
                tracing::warn!(
                    path = %local_path.display(),
                    expected = artifact.size_bytes,
                    got = size,
                    "artifact size mismatch"
                );
            }
        }
    }

    Ok(ModelHandle {
        manifest,
        local_path,
    })
}
