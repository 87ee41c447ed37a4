//! Registry file loading and shared environment knobs.
//!
//! The registry JSON and its installed-models overlay live in the directory
//! named by `RAEBURN_CONFIG_DIR` (default `./config`). Missing or unparseable
//! files resolve to empty objects so a bare checkout still boots with the
//! synthetic echo model.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const REGISTRY_FILE: &str = "model_registry.json";
pub const INSTALLED_FILE: &str = "models_installed.json";

/// Directory holding `model_registry.json` and `models_installed.json`.
pub fn config_dir() -> PathBuf {
    match std::env::var("RAEBURN_CONFIG_DIR") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from("config"),
    }
}

fn load_json(path: &Path) -> Value {
    let Ok(raw) = std::fs::read_to_string(path) else {
        return Value::Object(Default::default());
    };
    match serde_json::from_str::<Value>(&raw) {
        Ok(v @ Value::Object(_)) => v,
        Ok(_) | Err(_) => {
            tracing::warn!(path = %path.display(), "ignoring non-object config file");
            Value::Object(Default::default())
        }
    }
}

/// The model registry JSON (`{"models": [...]}`), or an empty object.
pub fn load_model_registry() -> Value {
    load_json(&config_dir().join(REGISTRY_FILE))
}

/// The installed-models overlay (`{"<name>": {"installed": ..., "endpoint": ...}}`).
pub fn load_installed_models() -> Value {
    load_json(&config_dir().join(INSTALLED_FILE))
}

/// Per-attempt HTTP ceiling for adapters: `RAEBURN_ROUTER_TIMEOUT` seconds,
/// default 30.
pub fn router_timeout() -> Duration {
    std::env::var("RAEBURN_ROUTER_TIMEOUT")
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|s| *s > 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or(Duration::from_secs(30))
}

/// Truthy env flag helper (`1`, `true`, `yes`, case-insensitive).
pub fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
