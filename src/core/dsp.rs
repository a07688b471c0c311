use num_complex::Complex32;
use once_cell::sync::Lazy;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::sync::Arc;

/// Analysis frame length for RMS and spectrograms.
pub const ANALYSIS_N_FFT: usize = 2048;
/// Analysis hop length.
pub const ANALYSIS_HOP: usize = 512;
/// Mel bands rendered in spectrogram images.
pub const ANALYSIS_N_MELS: usize = 128;
/// Spectrogram floor in dB relative to the peak bin.
pub const DB_FLOOR: f32 = -80.0;

struct FftCache {
    fft_forward: Arc<dyn Fft<f32>>,
    hann_window: Vec<f32>,
}

static FFT_CACHE_2048: Lazy<FftCache> = Lazy::new(|| {
    let mut planner = FftPlanner::new();
    FftCache {
        fft_forward: planner.plan_fft_forward(ANALYSIS_N_FFT),
        hann_window: hann_window(ANALYSIS_N_FFT),
    }
});

pub fn hann_window(n: usize) -> Vec<f32> {
    if n <= 1 {
        return vec![1.0];
    }
    let denom = (n - 1) as f32;
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * (i as f32) / denom).cos())
        .collect()
}

/// Interleaved samples to planar stereo frames. Mono is duplicated into
/// both channels; extra channels beyond the first two are dropped.
pub fn to_planar_stereo(interleaved: &[f32], channels: u16) -> Vec<[f32; 2]> {
    match channels {
        0 => Vec::new(),
        1 => interleaved.iter().map(|&x| [x, x]).collect(),
        ch => interleaved
            .chunks(ch as usize)
            .filter(|frame| frame.len() >= 2)
            .map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}

/// Frame-wise root-mean-square over `frame`-sized windows, `hop` apart.
/// A signal shorter than one frame yields a single whole-signal frame.
pub fn frame_rms(samples: &[f32], frame: usize, hop: usize) -> Vec<f32> {
    if samples.is_empty() || frame == 0 || hop == 0 {
        return Vec::new();
    }
    if samples.len() < frame {
        return vec![rms(samples)];
    }

    (0..=samples.len() - frame)
        .step_by(hop)
        .map(|start| rms(&samples[start..start + frame]))
        .collect()
}

fn rms(frame: &[f32]) -> f32 {
    let sum: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / frame.len() as f64).sqrt() as f32
}

/// Power spectrogram of a mono signal: frames x (n_fft/2 + 1) bins.
/// Uses the cached 2048-point plan; n_fft is fixed at `ANALYSIS_N_FFT`.
pub fn power_stft(samples: &[f32]) -> Vec<Vec<f32>> {
    let n_fft = ANALYSIS_N_FFT;
    let hop = ANALYSIS_HOP;
    if samples.len() < n_fft {
        return Vec::new();
    }

    let cache = &*FFT_CACHE_2048;
    let fft = &cache.fft_forward;
    let window = &cache.hann_window;

    let num_frames = (samples.len() - n_fft) / hop + 1;
    let mut frames = Vec::with_capacity(num_frames);
    let mut buf = vec![Complex32::zero(); n_fft];

    for fr in 0..num_frames {
        let start = fr * hop;
        for i in 0..n_fft {
            buf[i] = Complex32::new(samples[start + i] * window[i], 0.0);
        }
        fft.process(&mut buf);
        frames.push(buf[..n_fft / 2 + 1].iter().map(|c| c.norm_sqr()).collect());
    }

    frames
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank: n_mels x (n_fft/2 + 1).
pub fn mel_filterbank(n_fft: usize, n_mels: usize, sample_rate: u32) -> Vec<Vec<f32>> {
    let n_freqs = n_fft / 2 + 1;
    let fmax = sample_rate as f32 / 2.0;

    let freq_bins: Vec<f32> = (0..n_freqs)
        .map(|i| i as f32 * sample_rate as f32 / n_fft as f32)
        .collect();

    let mel_max = hz_to_mel(fmax);
    let mel_points: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f32 / (n_mels + 1) as f32))
        .collect();

    let mut filters = vec![vec![0.0; n_freqs]; n_mels];
    for m in 0..n_mels {
        let (left, center, right) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
        for (j, &freq) in freq_bins.iter().enumerate() {
            if freq >= left && freq <= center && center > left {
                filters[m][j] = (freq - left) / (center - left);
            } else if freq > center && freq <= right && right > center {
                filters[m][j] = (right - freq) / (right - center);
            }
        }
    }

    filters
}

/// Log-power mel spectrogram in dB relative to the loudest bin, floored at
/// `DB_FLOOR`. Returns frames x n_mels; silence maps to the floor.
pub fn mel_power_db(samples: &[f32], sample_rate: u32) -> Vec<Vec<f32>> {
    let power = power_stft(samples);
    if power.is_empty() {
        return Vec::new();
    }

    let filters = mel_filterbank(ANALYSIS_N_FFT, ANALYSIS_N_MELS, sample_rate);

    let mel: Vec<Vec<f32>> = power
        .iter()
        .map(|frame| {
            filters
                .iter()
                .map(|filter| filter.iter().zip(frame.iter()).map(|(f, p)| f * p).sum())
                .collect::<Vec<f32>>()
        })
        .collect();

    let max = mel
        .iter()
        .flat_map(|f| f.iter())
        .fold(0.0f32, |a, &b| a.max(b));
    if max <= 0.0 {
        return vec![vec![DB_FLOOR; ANALYSIS_N_MELS]; mel.len()];
    }

    mel.iter()
        .map(|frame| {
            frame
                .iter()
                .map(|&v| (10.0 * (v.max(1e-12) / max).log10()).max(DB_FLOOR))
                .collect()
        })
        .collect()
}
