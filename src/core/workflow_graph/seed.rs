//! Seed state: initial parameters handed to the execution backend as-is.
//!
//! `@seed/<key>` tokens are resolved at execution time, not here; the pipeline
//! only loads the mapping and passes it through.

use crate::utils::{cache_key, OnceCache};
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::debug;

pub type SeedState = Map<String, Value>;

static SEEDS: LazyLock<OnceCache<PathBuf, Result<Arc<SeedState>, String>>> =
    LazyLock::new(OnceCache::new);

/// Load the seed-state file once per canonical path.
///
/// A missing file is an empty mapping. Anything else that is not a JSON
/// object is an error string for the caller to report.
pub fn load_seed_state(path: &Path) -> Result<Arc<SeedState>, String> {
    let key = cache_key(path);
    SEEDS.get_or_init(&key, || read_seed_state(&key))
}

fn read_seed_state(path: &Path) -> Result<Arc<SeedState>, String> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no seed state file");
            return Ok(Arc::new(SeedState::new()));
        }
        Err(err) => return Err(format!("cannot read {}: {}", path.display(), err)),
    };
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => {
            debug!(path = %path.display(), keys = map.len(), "loaded seed state");
            Ok(Arc::new(map))
        }
        Ok(_) => Err(format!("{} must contain a JSON object", path.display())),
        Err(err) => Err(format!("invalid JSON in {}: {}", path.display(), err)),
    }
}
