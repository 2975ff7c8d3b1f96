//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SkystreamSettings::default()`]
//! 2. If `~/.skystream/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `SKYSTREAM_*` environment overrides
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::SkystreamSettings;

/// Resolve the path to the settings file (`~/.skystream/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".skystream").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SkystreamSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<SkystreamSettings> {
    let mut settings = read_settings_file(path)?;
    apply_overrides(&mut settings, |name| std::env::var(name).ok());
    Ok(settings)
}

fn read_settings_file(path: &Path) -> Result<SkystreamSettings> {
    let defaults = serde_json::to_value(SkystreamSettings::default())?;
    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };
    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply overrides read through `lookup` (normally `std::env::var`).
///
/// Invalid values are ignored with a warning.
pub fn apply_overrides(settings: &mut SkystreamSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Stream ──────────────────────────────────────────────────────
    if let Some(v) = read("SKYSTREAM_ENDPOINT") {
        settings.stream.endpoint = v;
    }
    if let Some(v) = read("SKYSTREAM_WANTED_COLLECTIONS") {
        settings.stream.wanted_collections = parse_list(&v);
    }
    if let Some(v) = read("SKYSTREAM_WANTED_DIDS") {
        settings.stream.wanted_dids = parse_list(&v);
    }

    // ── Reconnect ───────────────────────────────────────────────────
    if let Some(v) = read("SKYSTREAM_RECONNECT") {
        match parse_bool(&v) {
            Some(b) => settings.reconnect.enabled = b,
            None => warn!(key = "SKYSTREAM_RECONNECT", value = %v, "invalid boolean env var, ignoring"),
        }
    }
    if let Some(v) = read("SKYSTREAM_MAX_RECONNECT_ATTEMPTS") {
        match parse_u64_range(&v, 0, u64::from(u32::MAX)) {
            Some(n) => settings.reconnect.max_attempts = u32::try_from(n).unwrap_or(u32::MAX),
            None => warn!(key = "SKYSTREAM_MAX_RECONNECT_ATTEMPTS", value = %v, "invalid integer env var, ignoring"),
        }
    }
    if let Some(v) = read("SKYSTREAM_RECONNECT_INITIAL_DELAY_MS") {
        match parse_u64_range(&v, 1, 3_600_000) {
            Some(n) => settings.reconnect.initial_delay_ms = n,
            None => warn!(key = "SKYSTREAM_RECONNECT_INITIAL_DELAY_MS", value = %v, "invalid delay env var, ignoring"),
        }
    }
    if let Some(v) = read("SKYSTREAM_RECONNECT_MAX_DELAY_MS") {
        match parse_u64_range(&v, 1, 3_600_000) {
            Some(n) => settings.reconnect.max_delay_ms = n,
            None => warn!(key = "SKYSTREAM_RECONNECT_MAX_DELAY_MS", value = %v, "invalid delay env var, ignoring"),
        }
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read("SKYSTREAM_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
pub fn parse_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
