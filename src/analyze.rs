use std::path::Path;

use rayon::prelude::*;

use crate::{
    audio::{downmix_to_mono, read_audio},
    config::AppConfig,
    core::{
        dsp::{frame_rms, mel_power_db, ANALYSIS_HOP, ANALYSIS_N_FFT},
        separate::stem_files,
    },
    error::Result,
    types::StemSummary,
};
use crate::render::{render_spectrogram_png, render_waveform_png};

/// Metrics and images for one separated stem.
///
/// Duration is rounded to 2 decimal places, RMS and peak to 5. Images land
/// under `static/waveforms/` and `static/spectrograms/`, named after the
/// stem's file stem; a failed render may leave a partial file behind.
pub fn analyze_stem(stem_path: &Path, cfg: &AppConfig) -> Result<StemSummary> {
    let audio = read_audio(stem_path)?;
    let mono = downmix_to_mono(&audio.samples, audio.channels);

    let duration = mono.len() as f64 / audio.sample_rate.max(1) as f64;

    let frames = frame_rms(&mono, ANALYSIS_N_FFT, ANALYSIS_HOP);
    let rms = if frames.is_empty() {
        0.0
    } else {
        frames.iter().map(|&r| r as f64).sum::<f64>() / frames.len() as f64
    };

    let peak = mono.iter().fold(0.0f32, |a, &s| a.max(s.abs())) as f64;

    let base = stem_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("stem");
    let wave_img = cfg.waveform_dir().join(format!("{base}_wave.png"));
    let spec_img = cfg.spectrogram_dir().join(format!("{base}_spec.png"));

    render_waveform_png(&mono, &wave_img)?;
    render_spectrogram_png(&mel_power_db(&mono, audio.sample_rate), &spec_img)?;

    Ok(StemSummary {
        name: stem_path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("stem.wav")
            .to_string(),
        duration: round_places(duration, 2),
        rms: round_places(rms, 5),
        peak: round_places(peak, 5),
        wave_img,
        spec_img,
    })
}

/// Analyze every stem in a separation output directory, in parallel.
/// Results come back sorted by stem name.
pub fn analyze_dir(out_dir: &Path, cfg: &AppConfig) -> Result<Vec<StemSummary>> {
    let files = stem_files(out_dir)?;

    let mut summaries = files
        .par_iter()
        .map(|path| analyze_stem(path, cfg))
        .collect::<Result<Vec<_>>>()?;

    summaries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(summaries)
}

fn round_places(v: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (v * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_matches_reported_precision() {
        assert_eq!(round_places(1.23456789, 2), 1.23);
        assert_eq!(round_places(0.707106, 5), 0.70711);
        assert_eq!(round_places(0.0, 5), 0.0);
    }
}
