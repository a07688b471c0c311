use std::{
    fs,
    path::{Path, PathBuf},
};

use tempfile::tempdir;

use crate::{
    audio::{read_audio, write_audio},
    config::AppConfig,
    core::cache::EngineCache,
    error::{Result, StudioError},
    types::ModelKind,
};

/// Separate `input_path` with the `kind` configuration.
///
/// Output lands in `output/<input-stem>/<kind>/<instrument>.wav`. The
/// directory is derived only from the input's base name, so a later upload
/// sharing that name overwrites earlier output: stems are written to a
/// temp directory first and the destination is replaced wholesale, never
/// merged. Returns the output directory.
pub fn separate(
    input_path: &Path,
    kind: ModelKind,
    engines: &EngineCache,
    cfg: &AppConfig,
) -> Result<PathBuf> {
    if !input_path.is_file() {
        return Err(StudioError::Validation(format!(
            "input file not found: {}",
            input_path.display()
        )));
    }

    let engine = engines.get(kind)?;

    let audio = read_audio(input_path)?;
    let stems = engine.separate(&audio)?;

    let file_stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let out_dir = cfg.output_dir().join(file_stem).join(kind.as_str());

    let staging = tempdir()?;
    let mut staged: Vec<(String, PathBuf)> = Vec::with_capacity(stems.len());
    for (name, stem) in engine.stems().iter().zip(&stems) {
        let file_name = format!("{name}.wav");
        let path = staging.path().join(&file_name);
        write_audio(&path, stem)?;
        staged.push((file_name, path));
    }

    if out_dir.exists() {
        fs::remove_dir_all(&out_dir)?;
    }
    fs::create_dir_all(&out_dir)?;
    for (file_name, src) in &staged {
        fs::copy(src, out_dir.join(file_name))?;
    }

    tracing::info!(
        input = %input_path.display(),
        kind = %kind,
        out_dir = %out_dir.display(),
        stems = staged.len(),
        "separation complete"
    );

    Ok(out_dir)
}

/// WAV files inside a separation output directory, sorted by name.
pub fn stem_files(out_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(out_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("wav"))
        .collect();
    files.sort();
    Ok(files)
}
