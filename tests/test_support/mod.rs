//! Shared helpers for integration tests.

#![allow(dead_code)]

use camino::Utf8PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use specsmith::engine::testing::ScriptedBackend;
use specsmith::{Config, SchemaPolicy, SpecEngine};

/// An isolated state directory. Keep the `TempDir` alive for the test.
pub fn state_dir() -> (TempDir, Utf8PathBuf) {
    let dir = TempDir::new().expect("create temp dir");
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path");
    (dir, path)
}

pub fn config_for(state: &Utf8PathBuf, policy: SchemaPolicy) -> Config {
    Config::builder()
        .state_dir(state.clone())
        .schema_policy(policy)
        .build()
        .expect("valid test config")
}

/// An engine over `state` that replays `script`.
pub fn scripted_engine(
    state: &Utf8PathBuf,
    script: &[&str],
) -> (Arc<ScriptedBackend>, SpecEngine) {
    let backend = Arc::new(ScriptedBackend::new(script.iter().copied()));
    let engine = SpecEngine::with_backend(config_for(state, SchemaPolicy::Advisory), backend.clone())
        .expect("engine");
    (backend, engine)
}
