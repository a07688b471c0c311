#![cfg(feature = "engine-mock")]

use std::{f32::consts::PI, fs, path::Path, sync::Arc, sync::Mutex};

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use sha2::{Digest, Sha256};
use tempfile::tempdir;
use tower::ServiceExt;

use stem_studio::audio::write_audio;
use stem_studio::server::{router, AppState};
use stem_studio::{AppConfig, AudioData};

static ENV_LOCK: Mutex<()> = Mutex::new(());

const BOUNDARY: &str = "stem-studio-test-boundary";

fn app_state(base: &Path, manifest_url: Option<String>) -> Arc<AppState> {
    let cfg = AppConfig {
        manifest_url_override: manifest_url,
        ..AppConfig::new(base)
    };
    cfg.ensure_dirs().unwrap();
    Arc::new(AppState::new(cfg))
}

fn multipart_request(parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for (name, filename, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(fname) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{fname}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_string(resp: axum::response::Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn sine_wav_bytes(frames: usize) -> Vec<u8> {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("in.wav");
    let mut samples = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        let t = i as f32 / 44_100.0;
        samples.push((2.0 * PI * 440.0 * t).sin() * 0.3);
        samples.push((2.0 * PI * 660.0 * t).sin() * 0.3);
    }
    write_audio(
        &path,
        &AudioData {
            samples,
            sample_rate: 44_100,
            channels: 2,
        },
    )
    .unwrap();
    fs::read(&path).unwrap()
}

fn mount_model(server: &MockServer) -> String {
    let payload = b"mock weights".to_vec();
    let sha = hex::encode(Sha256::digest(&payload));

    server.mock(|when, then| {
        when.method(GET).path("/model.onnx");
        then.status(200)
            .header("Content-Length", payload.len().to_string().as_str())
            .body(payload.clone());
    });

    let manifest_body = format!(
        r#"{{
  "name": "mock_2",
  "version": "1.0.0",
  "backend": "onnx",
  "sample_rate": 44100,
  "window": 4096,
  "hop": 4096,
  "stems": ["vocals", "accompaniment"],
  "input_layout": "BCT",
  "output_layout": "BSCT",
  "artifacts": [
    {{ "file": "model.onnx", "url": "{url}", "sha256": "{sha}", "size_bytes": 0 }}
  ]
}}"#,
        url = format!("{}/model.onnx", server.base_url()),
    );
    server.mock(|when, then| {
        when.method(GET).path("/manifest.json");
        then.status(200)
            .header("Content-Type", "application/json")
            .body(manifest_body);
    });

    format!("{}/manifest.json", server.base_url())
}

#[tokio::test]
async fn index_renders_the_upload_form() {
    let base = tempdir().unwrap();
    let state = app_state(base.path(), None);

    let resp = router(state)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let page = body_string(resp).await;
    assert!(page.contains("<form"));
    assert!(page.contains("2stems"));
    assert!(page.contains("5stems"));
}

#[tokio::test]
async fn post_without_file_shows_error_and_writes_nothing() {
    let base = tempdir().unwrap();
    let state = app_state(base.path(), None);
    let cfg = state.cfg.clone();

    let resp = router(state)
        .oneshot(multipart_request(&[("model", None, b"4stems")]))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let page = body_string(resp).await;
    assert!(page.contains("Please select a file."), "page: {page}");

    assert_eq!(fs::read_dir(cfg.output_dir()).unwrap().count(), 0);
    assert_eq!(fs::read_dir(cfg.upload_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn post_with_empty_filename_is_rejected() {
    let base = tempdir().unwrap();
    let state = app_state(base.path(), None);
    let cfg = state.cfg.clone();

    let resp = router(state)
        .oneshot(multipart_request(&[
            ("model", None, b"2stems"),
            ("file", Some(""), b"pretend audio"),
        ]))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let page = body_string(resp).await;
    assert!(page.contains("Please select a file."));
    assert_eq!(fs::read_dir(cfg.output_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn download_of_missing_path_is_not_found() {
    let base = tempdir().unwrap();
    let state = app_state(base.path(), None);

    let resp = router(state)
        .oneshot(
            Request::builder()
                .uri("/download/tune/2stems/vocals.wav")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_rejects_path_traversal() {
    let base = tempdir().unwrap();
    let state = app_state(base.path(), None);

    // plant a file outside the output root
    fs::write(base.path().join("secret.txt"), b"do not serve").unwrap();

    let resp = router(state)
        .oneshot(
            Request::builder()
                .uri("/download/tune/../../secret.txt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_streams_existing_stem_as_audio() {
    let base = tempdir().unwrap();
    let state = app_state(base.path(), None);

    let stem_dir = state.cfg.output_dir().join("tune").join("2stems");
    fs::create_dir_all(&stem_dir).unwrap();
    fs::write(stem_dir.join("vocals.wav"), b"RIFF fake wav bytes").unwrap();

    let resp = router(state)
        .oneshot(
            Request::builder()
                .uri("/download/tune/2stems/vocals.wav")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "audio/wav"
    );
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"RIFF fake wav bytes");
}

#[tokio::test]
async fn upload_runs_the_full_pipeline() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
    let cache_tmp = tempdir().unwrap();
    std::env::set_var("XDG_CACHE_HOME", cache_tmp.path());

    let server = MockServer::start();
    let manifest_url = mount_model(&server);

    let base = tempdir().unwrap();
    let state = app_state(base.path(), Some(manifest_url));
    let cfg = state.cfg.clone();

    let wav = sine_wav_bytes(8000);
    let resp = router(state)
        .oneshot(multipart_request(&[
            ("model", None, b"2stems"),
            ("file", Some("tune.wav"), &wav),
        ]))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let page = body_string(resp).await;
    assert!(page.contains("vocals.wav"), "page: {page}");
    assert!(page.contains("accompaniment.wav"));
    assert!(page.contains("/download/tune/2stems/vocals.wav"));

    // upload kept, stems written, images rendered
    assert!(cfg.upload_dir().join("tune.wav").is_file());
    let out_dir = cfg.output_dir().join("tune").join("2stems");
    assert!(out_dir.join("vocals.wav").is_file());
    assert!(out_dir.join("accompaniment.wav").is_file());
    assert!(cfg.waveform_dir().join("vocals_wave.png").is_file());
    assert!(cfg
        .spectrogram_dir()
        .join("accompaniment_spec.png")
        .is_file());
}

#[tokio::test]
async fn engine_failure_is_rendered_not_crashed() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
    let cache_tmp = tempdir().unwrap();
    std::env::set_var("XDG_CACHE_HOME", cache_tmp.path());

    // Manifest endpoint that always 500s: engine construction fails.
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/manifest.json");
        then.status(500);
    });
    let manifest_url = format!("{}/manifest.json", server.base_url());

    let base = tempdir().unwrap();
    let state = app_state(base.path(), Some(manifest_url));

    let wav = sine_wav_bytes(4000);
    let resp = router(state)
        .oneshot(multipart_request(&[
            ("model", None, b"2stems"),
            ("file", Some("tune.wav"), &wav),
        ]))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let page = body_string(resp).await;
    assert!(page.contains("Separation error"), "page: {page}");
}
