use std::path::Path;

use image::{ImageBuffer, Rgb};

use crate::{
    core::dsp::DB_FLOOR,
    error::Result,
};

const WAVE_W: u32 = 800;
const WAVE_H: u32 = 220;
const SPEC_W: u32 = 800;
const SPEC_H: u32 = 320;

const WAVE_BG: Rgb<u8> = Rgb([250, 250, 252]);
const WAVE_AXIS: Rgb<u8> = Rgb([208, 210, 216]);
const WAVE_BAR: Rgb<u8> = Rgb([56, 108, 176]);

/// Render a time-domain waveform of a mono signal.
///
/// One column per pixel: the sample range covered by the column is reduced
/// to its min/max and drawn as a vertical bar around the center line.
pub fn render_waveform_png(samples: &[f32], path: &Path) -> Result<()> {
    let mut img = ImageBuffer::from_pixel(WAVE_W, WAVE_H, WAVE_BG);

    let mid = WAVE_H / 2;
    for x in 0..WAVE_W {
        img.put_pixel(x, mid, WAVE_AXIS);
    }

    if !samples.is_empty() {
        let per_px = samples.len().div_ceil(WAVE_W as usize).max(1);
        let scale = (WAVE_H / 2 - 8) as f32;

        for (col, chunk) in samples.chunks(per_px).enumerate() {
            if col >= WAVE_W as usize {
                break;
            }
            let mut min = f32::MAX;
            let mut max = f32::MIN;
            for &s in chunk {
                min = min.min(s);
                max = max.max(s);
            }

            let y_top = (mid as f32 - max.clamp(-1.0, 1.0) * scale) as u32;
            let y_bot = (mid as f32 - min.clamp(-1.0, 1.0) * scale) as u32;
            for y in y_top..=y_bot.min(WAVE_H - 1) {
                img.put_pixel(col as u32, y, WAVE_BAR);
            }
        }
    }

    img.save(path)?;
    Ok(())
}

/// Render a log-power mel spectrogram (frames x mel bands, dB values in
/// `[DB_FLOOR, 0]`). Low bands at the bottom, time left to right.
pub fn render_spectrogram_png(mel_db: &[Vec<f32>], path: &Path) -> Result<()> {
    let frames = mel_db.len();
    let bands = mel_db.first().map(|f| f.len()).unwrap_or(0);

    let mut img = ImageBuffer::from_pixel(SPEC_W, SPEC_H, heat(0.0));

    if frames > 0 && bands > 0 {
        for x in 0..SPEC_W {
            let frame = &mel_db[(x as usize * frames) / SPEC_W as usize];
            for y in 0..SPEC_H {
                let band = ((SPEC_H - 1 - y) as usize * bands) / SPEC_H as usize;
                let t = (frame[band] - DB_FLOOR) / -DB_FLOOR;
                img.put_pixel(x, y, heat(t));
            }
        }
    }

    img.save(path)?;
    Ok(())
}

// Magma-style ramp, dark floor to bright peak.
const HEAT_ANCHORS: [[f32; 3]; 5] = [
    [10.0, 7.0, 35.0],
    [80.0, 18.0, 123.0],
    [182.0, 54.0, 121.0],
    [251.0, 136.0, 97.0],
    [252.0, 253.0, 191.0],
];

fn heat(t: f32) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0) * (HEAT_ANCHORS.len() - 1) as f32;
    let lo = (t as usize).min(HEAT_ANCHORS.len() - 2);
    let frac = t - lo as f32;

    let mut px = [0u8; 3];
    for c in 0..3 {
        let v = HEAT_ANCHORS[lo][c] + (HEAT_ANCHORS[lo + 1][c] - HEAT_ANCHORS[lo][c]) * frac;
        px[c] = v.round() as u8;
    }
    Rgb(px)
}
