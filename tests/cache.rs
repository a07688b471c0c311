#![cfg(feature = "engine-mock")]

use std::sync::{Arc, Mutex};

use httpmock::prelude::*;
use httpmock::Mock;
use sha2::{Digest, Sha256};
use tempfile::tempdir;

use stem_studio::{EngineCache, ModelKind};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn mount_model<'a>(server: &'a MockServer, stems: &[&str]) -> (String, Mock<'a>, Mock<'a>) {
    let payload = b"mock onnx payload".to_vec();
    let sha = hex::encode(Sha256::digest(&payload));

    let prefix = format!("/{}", stems.len());

    let model_mock = server.mock(|when, then| {
        when.method(GET).path(format!("{prefix}/model.onnx"));
        then.status(200)
            .header("Content-Length", payload.len().to_string().as_str())
            .body(payload.clone());
    });

    let stems_json = stems
        .iter()
        .map(|s| format!("\"{s}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let manifest_body = format!(
        r#"{{
  "name": "mock_{n}",
  "version": "1.0.0",
  "backend": "onnx",
  "sample_rate": 44100,
  "window": 4096,
  "hop": 4096,
  "stems": [{stems_json}],
  "input_layout": "BCT",
  "output_layout": "BSCT",
  "artifacts": [
    {{ "file": "model.onnx", "url": "{url}", "sha256": "{sha}", "size_bytes": 0 }}
  ]
}}"#,
        n = stems.len(),
        url = format!("{}{prefix}/model.onnx", server.base_url()),
    );

    let manifest_mock = server.mock(|when, then| {
        when.method(GET).path(format!("{prefix}/manifest.json"));
        then.status(200)
            .header("Content-Type", "application/json")
            .body(manifest_body);
    });

    (
        format!("{}{prefix}/manifest.json", server.base_url()),
        manifest_mock,
        model_mock,
    )
}

#[test]
fn same_configuration_returns_the_same_engine_handle() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
    let tmp = tempdir().unwrap();
    std::env::set_var("XDG_CACHE_HOME", tmp.path());

    let server = MockServer::start();
    let (url, manifest_mock, _model_mock) = mount_model(&server, &["vocals", "accompaniment"]);

    let cache = EngineCache::with_manifest_override(Some(url));

    let first = cache.get(ModelKind::TwoStems).unwrap();
    let second = cache.get(ModelKind::TwoStems).unwrap();

    assert!(Arc::ptr_eq(&first, &second), "expected the cached instance");
    manifest_mock.assert_hits(1); // constructed exactly once
    assert_eq!(cache.loaded(), vec![ModelKind::TwoStems]);
}

#[test]
fn different_configurations_load_distinct_engines() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
    let tmp = tempdir().unwrap();
    std::env::set_var("XDG_CACHE_HOME", tmp.path());

    let server = MockServer::start();
    let (url2, manifest2, _) = mount_model(&server, &["vocals", "accompaniment"]);
    let (url4, manifest4, _) = mount_model(&server, &["vocals", "drums", "bass", "other"]);

    // One override per cache, as the web server wires it; use two caches
    // pointing at the two manifests to load both kinds.
    let cache2 = EngineCache::with_manifest_override(Some(url2));
    let cache4 = EngineCache::with_manifest_override(Some(url4));

    let two = cache2.get(ModelKind::TwoStems).unwrap();
    let four = cache4.get(ModelKind::FourStems).unwrap();

    assert_eq!(two.stems().len(), 2);
    assert_eq!(four.stems().len(), 4);
    manifest2.assert_hits(1);
    manifest4.assert_hits(1);
}

#[test]
fn one_cache_holds_one_engine_per_kind() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
    let tmp = tempdir().unwrap();
    std::env::set_var("XDG_CACHE_HOME", tmp.path());

    let server = MockServer::start();
    let (url, manifest_mock, _) = mount_model(&server, &["vocals", "accompaniment"]);

    let cache = EngineCache::with_manifest_override(Some(url));
    let a = cache.get(ModelKind::TwoStems).unwrap();
    let b = cache.get(ModelKind::FourStems).unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    manifest_mock.assert_hits(2); // one construction per kind
    assert_eq!(
        cache.loaded(),
        vec![ModelKind::TwoStems, ModelKind::FourStems]
    );
}
