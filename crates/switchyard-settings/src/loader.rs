//! Settings loading.
//!
//! Layers, lowest priority first:
//! 1. compiled [`HostSettings::default()`]
//! 2. `~/.switchyard/settings.json`, deep-merged over the defaults
//! 3. `SWITCHYARD_*` environment variables
//!
//! The result is range-checked before it is returned. In the merge, objects
//! merge per key, arrays and scalars are replaced, and `null` keeps the
//! lower layer's value.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::HostSettings;

/// Directory name under `$HOME` holding settings and session state.
pub const HOME_DIR_NAME: &str = ".switchyard";

/// Accepted reconnect delay range in milliseconds.
pub const RECONNECT_DELAY_RANGE_MS: (u64, u64) = (1, 60_000);

/// Resolve the Switchyard home directory (`~/.switchyard`).
pub fn home_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(HOME_DIR_NAME)
}

/// Resolve the path to the settings file (`~/.switchyard/settings.json`).
pub fn settings_path() -> PathBuf {
    home_dir().join("settings.json")
}

/// Resolve a possibly relative path against the Switchyard home directory.
pub fn resolve_path(path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        home_dir().join(p)
    }
}

/// Settings from [`settings_path`], with environment overrides.
pub fn load_settings() -> Result<HostSettings> {
    load_settings_from_path(&settings_path())
}

/// Settings from `path`, with environment overrides.
///
/// A missing file yields the defaults. Unreadable or invalid JSON and
/// out-of-range values are errors.
pub fn load_settings_from_path(path: &Path) -> Result<HostSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Defaults overlaid with the file at `path`, ignoring the environment.
pub fn load_file_layer(path: &Path) -> Result<HostSettings> {
    let defaults = serde_json::to_value(HostSettings::default())?;
    let overlay = match std::fs::read_to_string(path) {
        Ok(text) => {
            debug!(path = %path.display(), "settings file found");
            serde_json::from_str::<Value>(&text)?
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
            Value::Null
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_value(deep_merge(defaults, overlay))?)
}

/// Overlay `source` onto `target`: objects merge key by key, `null` keeps
/// the target, anything else replaces it.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (target, Value::Null) => target,
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None if value.is_null() => continue,
                    None => value,
                };
                let _ = base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, source) => source,
    }
}

/// Reject values the runtime cannot honor.
pub fn validate(settings: &HostSettings) -> Result<()> {
    let (min, max) = RECONNECT_DELAY_RANGE_MS;
    let delay = settings.broker.reconnect.delay_ms;
    if !(min..=max).contains(&delay) {
        return Err(SettingsError::InvalidValue(format!(
            "broker.reconnect.delayMs must be within {min}..={max}, got {delay}"
        )));
    }
    if settings.broker.reconnect.connect_timeout_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "broker.reconnect.connectTimeoutMs must be positive".to_string(),
        ));
    }
    if settings.broker.endpoint.trim().is_empty() {
        return Err(SettingsError::InvalidValue(
            "broker.endpoint must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Overlay `SWITCHYARD_*` variables onto `settings`.
///
/// Invalid values are ignored with a warning (fall back to file/default).
pub fn apply_env_overrides(settings: &mut HostSettings) {
    // ── Broker ──────────────────────────────────────────────────────
    if let Some(v) = read_env_string("SWITCHYARD_BROKER_URL") {
        settings.broker.endpoint = v;
    }
    let (min, max) = RECONNECT_DELAY_RANGE_MS;
    if let Some(v) = read_env_u64("SWITCHYARD_RECONNECT_DELAY_MS", min, max) {
        settings.broker.reconnect.delay_ms = v;
    }
    if let Some(v) = read_env_u32("SWITCHYARD_RECONNECT_MAX_ATTEMPTS", 1, 1_000_000) {
        settings.broker.reconnect.max_attempts = Some(v);
    }

    // ── Session / identity / API ────────────────────────────────────
    if let Some(v) = read_env_string("SWITCHYARD_SESSION_PATH") {
        settings.session.path = v;
    }
    if let Some(v) = read_env_string("SWITCHYARD_TOKEN_URL") {
        settings.identity.token_url = v;
    }
    if let Some(v) = read_env_string("SWITCHYARD_GATEWAY_URL") {
        settings.api.gateway_url = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("SWITCHYARD_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_bool("SWITCHYARD_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Value parsing ───────────────────────────────────────────────────────────

/// Boolean flag: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`, any case.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "yes" => Some(true),
        "0" | "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Number within `min..=max`.
pub fn parse_in_range<T>(val: &str, min: T, max: T) -> Option<T>
where
    T: FromStr + PartialOrd,
{
    val.trim()
        .parse::<T>()
        .ok()
        .filter(|n| (min..=max).contains(n))
}

// ── Environment ─────────────────────────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn read_env_with<T>(name: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    let parsed = parse(&raw);
    if parsed.is_none() {
        warn!(var = name, value = %raw, "ignoring invalid environment override");
    }
    parsed
}

fn read_env_bool(name: &str) -> Option<bool> {
    read_env_with(name, parse_bool)
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    read_env_with(name, |raw| parse_in_range(raw, min, max))
}

fn read_env_u32(name: &str, min: u32, max: u32) -> Option<u32> {
    read_env_with(name, |raw| parse_in_range(raw, min, max))
}
