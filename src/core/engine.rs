use crate::{
    core::dsp::to_planar_stereo,
    error::{Result, StudioError},
    model_manager::{ensure_model, ModelHandle},
    types::{AudioData, ModelKind, ModelManifest},
};

use ndarray::Array3;

#[cfg(all(feature = "onnx", not(feature = "engine-mock")))]
use once_cell::sync::OnceCell;
#[cfg(all(feature = "onnx", not(feature = "engine-mock")))]
use ort::{
    session::{
        builder::{GraphOptimizationLevel, SessionBuilder},
        Session,
    },
    value::{Tensor, Value},
};
#[cfg(all(feature = "onnx", not(feature = "engine-mock")))]
use std::sync::Mutex;

#[cfg(all(not(feature = "onnx"), not(feature = "engine-mock")))]
compile_error!("stem-studio requires the `onnx` feature (or `engine-mock` for tests)");

#[cfg(all(feature = "onnx", not(feature = "engine-mock")))]
static ORT_INIT: OnceCell<()> = OnceCell::new();

/// A loaded, ready-to-run separation model for one configuration.
///
/// Construction is expensive (downloads weights on a cold cache, then
/// loads them into an ONNX Runtime session); instances are shared through
/// [`crate::core::cache::EngineCache`].
pub struct Engine {
    manifest: ModelManifest,
    #[cfg(all(feature = "onnx", not(feature = "engine-mock")))]
    session: Mutex<Session>,
}

impl Engine {
    /// Resolve, fetch and load the model for `kind`.
    pub fn load(kind: ModelKind, manifest_url_override: Option<&str>) -> Result<Engine> {
        let handle = ensure_model(kind, manifest_url_override)?;
        tracing::info!(model = %handle.manifest.name, kind = %kind, "loading separation engine");
        Engine::from_handle(handle)
    }

    #[cfg(all(feature = "onnx", not(feature = "engine-mock")))]
    fn from_handle(handle: ModelHandle) -> Result<Engine> {
        // Pin error type so `?` is unambiguous.
        ORT_INIT.get_or_try_init::<_, StudioError>(|| {
            let _ = ort::init().commit();
            Ok(())
        })?;

        let session = SessionBuilder::new()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(&handle.local_path)?;

        Ok(Engine {
            manifest: handle.manifest,
            session: Mutex::new(session),
        })
    }

    #[cfg(feature = "engine-mock")]
    fn from_handle(handle: ModelHandle) -> Result<Engine> {
        Ok(Engine {
            manifest: handle.manifest,
        })
    }

    /// Build a mock engine directly from a manifest, skipping the fetch.
    #[cfg(feature = "engine-mock")]
    pub fn from_manifest(manifest: ModelManifest) -> Engine {
        Engine { manifest }
    }

    pub fn manifest(&self) -> &ModelManifest {
        &self.manifest
    }

    /// Instrument names in engine output order.
    pub fn stems(&self) -> &[String] {
        &self.manifest.stems
    }

    /// Run windowed inference over the whole signal, one stereo waveform
    /// per stem. Input is processed in `window`-sized chunks, `hop` apart,
    /// as declared by the manifest.
    pub fn separate(&self, audio: &AudioData) -> Result<Vec<AudioData>> {
        let mf = &self.manifest;

        if audio.sample_rate != mf.sample_rate {
            return Err(StudioError::Engine(format!(
                "model `{}` expects {} Hz input, got {} Hz",
                mf.name, mf.sample_rate, audio.sample_rate
            )));
        }

        let stereo = to_planar_stereo(&audio.samples, audio.channels);
        let n = stereo.len();
        if n == 0 {
            return Err(StudioError::Engine("empty audio input".into()));
        }

        let (win, hop) = (mf.window, mf.hop);
        if win == 0 || hop == 0 || hop > win {
            return Err(StudioError::Manifest(format!(
                "bad window/hop in manifest `{}`: {}/{}",
                mf.name, win, hop
            )));
        }

        let s_count = mf.stems.len().max(1);
        let mut acc: Vec<Vec<[f32; 2]>> = vec![vec![[0f32; 2]; n]; s_count];

        let mut left = vec![0f32; win];
        let mut right = vec![0f32; win];
        let mut pos = 0usize;

        loop {
            for i in 0..win {
                let idx = pos + i;
                if idx < n {
                    left[i] = stereo[idx][0];
                    right[i] = stereo[idx][1];
                } else {
                    left[i] = 0.0;
                    right[i] = 0.0;
                }
            }

            let out = self.run_window(&left, &right, s_count)?;

            let copy_len = out.shape()[2].min(win).min(n - pos);
            for st in 0..s_count.min(out.shape()[0]) {
                for i in 0..copy_len {
                    acc[st][pos + i] = [out[(st, 0, i)], out[(st, 1, i)]];
                }
            }

            if pos + hop >= n {
                break;
            }
            pos += hop;
        }

        Ok(acc
            .into_iter()
            .map(|frames| {
                let mut interleaved = Vec::with_capacity(n * 2);
                for frame in frames {
                    interleaved.push(frame[0]);
                    interleaved.push(frame[1]);
                }
                AudioData {
                    samples: interleaved,
                    sample_rate: mf.sample_rate,
                    channels: 2,
                }
            })
            .collect())
    }

    /// One inference pass: BCT `[1, 2, T]` in, BSCT `[1, S, 2, T]` out.
    #[cfg(all(feature = "onnx", not(feature = "engine-mock")))]
    fn run_window(&self, left: &[f32], right: &[f32], s_count: usize) -> Result<Array3<f32>> {
        let t = left.len();

        let mut planar = Vec::with_capacity(2 * t);
        planar.extend_from_slice(left);
        planar.extend_from_slice(right);
        let input: Value = Tensor::from_array((vec![1, 2, t], planar))?.into_dyn();

        let mut session = self.session.lock().expect("engine session poisoned");

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .ok_or_else(|| StudioError::Engine("model declares no inputs".into()))?;

        let outputs = session.run(vec![(input_name, input)])?;

        let out_value: Value = outputs
            .into_iter()
            .next()
            .map(|(_, v)| v)
            .ok_or_else(|| StudioError::Engine("model returned no outputs".into()))?;

        let (_shape, data) = out_value.try_extract_tensor::<f32>()?;
        if data.len() != s_count * 2 * t {
            return Err(StudioError::Engine(format!(
                "unexpected output length {} (expected {})",
                data.len(),
                s_count * 2 * t
            )));
        }

        Array3::from_shape_vec((s_count, 2, t), data.to_vec())
            .map_err(|e| StudioError::Engine(e.to_string()))
    }

    /// Mock inference: stem `i` is the input attenuated by `1 / (i + 1)`.
    /// Deterministic, so pipeline tests can assert on exact output.
    #[cfg(feature = "engine-mock")]
    fn run_window(&self, left: &[f32], right: &[f32], s_count: usize) -> Result<Array3<f32>> {
        let t = left.len();
        let mut out = Array3::<f32>::zeros((s_count, 2, t));
        for st in 0..s_count {
            let gain = 1.0 / (st as f32 + 1.0);
            for i in 0..t {
                out[(st, 0, i)] = left[i] * gain;
                out[(st, 1, i)] = right[i] * gain;
            }
        }
        Ok(out)
    }
}
