//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RelaySettings::default()`]
//! 2. If a settings file exists, deep-merge its values over the defaults
//! 3. Apply `RELAY_*` environment overrides (highest priority)
//!
//! Command-line flags are applied by the binary on top of the result.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::RelaySettings;

/// Environment variable naming an explicit settings file.
pub const CONFIG_ENV: &str = "RELAY_CONFIG";

/// Default settings file location (`~/.relay/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".relay").join("settings.json")
}

/// Load settings from `explicit`, else `$RELAY_CONFIG`, else the default path.
///
/// An explicitly named file must exist; the default path is optional.
pub fn load_settings(explicit: Option<&Path>) -> Result<RelaySettings> {
    let named = explicit
        .map(Path::to_path_buf)
        .or_else(|| read_env_string(CONFIG_ENV).map(PathBuf::from));

    let mut settings = match named {
        Some(path) if !path.exists() => return Err(SettingsError::NotFound(path)),
        Some(path) => load_settings_from_path(&path)?,
        None => load_settings_from_path(&settings_path())?,
    };
    apply_env_overrides(&mut settings, |name| std::env::var(name).ok());
    validate(&settings)?;
    Ok(settings)
}

/// Load settings from a specific path without env overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    let defaults = serde_json::to_value(RelaySettings::default())?;

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
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `RELAY_*` overrides read through `lookup`.
///
/// Invalid values are ignored with a warning and leave the file/default
/// value in place.
pub fn apply_env_overrides(settings: &mut RelaySettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    if let Some(v) = env.string("RELAY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.parsed("RELAY_PORT", parse_u16_range, (0, 65535)) {
        settings.server.port = v;
    }
    if let Some(v) = env.parsed("RELAY_MAX_SEND_QUEUE", parse_usize_range, (1, 1_000_000)) {
        settings.server.max_send_queue = v;
    }
    if let Some(v) = env.parsed("RELAY_HEARTBEAT_INTERVAL_SECS", parse_u64_range, (1, 3600)) {
        settings.server.heartbeat_interval_secs = v;
    }
    if let Some(v) = env.parsed("RELAY_CLIENT_TIMEOUT_SECS", parse_u64_range, (1, 86_400)) {
        settings.server.client_timeout_secs = v;
    }
    if let Some(v) = env.string("RELAY_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("RELAY_LOG_JSON") {
        settings.logging.json = v;
    }
}

/// Reject combinations the server cannot run with.
pub fn validate(settings: &RelaySettings) -> Result<()> {
    let server = &settings.server;
    if server.max_send_queue == 0 {
        return Err(SettingsError::InvalidValue("maxSendQueue must be at least 1".into()));
    }
    if server.heartbeat_interval_secs == 0 {
        return Err(SettingsError::InvalidValue(
            "heartbeatIntervalSecs must be at least 1".into(),
        ));
    }
    if server.client_timeout_secs < server.heartbeat_interval_secs {
        return Err(SettingsError::InvalidValue(format!(
            "clientTimeoutSecs ({}) is shorter than heartbeatIntervalSecs ({})",
            server.client_timeout_secs, server.heartbeat_interval_secs
        )));
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

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

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = self.string(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn parsed<T>(
        &self,
        name: &str,
        parse: fn(&str, T, T) -> Option<T>,
        (min, max): (T, T),
    ) -> Option<T> {
        let val = self.string(name)?;
        let result = parse(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid numeric env var, ignoring");
        }
        result
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 3001, "host": "0.0.0.0"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "0.0.0.0");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    // ── file loading ────────────────────────────────────────────────

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from_path(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, RelaySettings::default());
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"server":{{"port":4100}},"logging":{{"json":true}}}}"#).unwrap();

        let settings = load_settings_from_path(file.path()).unwrap();
        assert_eq!(settings.server.port, 4100);
        assert_eq!(settings.server.max_send_queue, 256);
        assert!(settings.logging.json);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn invalid_json_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = load_settings_from_path(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.json");
        let err = load_settings(Some(path.as_path())).unwrap_err();
        assert!(matches!(err, SettingsError::NotFound(p) if p == path));
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_overrides_apply() {
        let mut settings = RelaySettings::default();
        apply_env_overrides(
            &mut settings,
            env(&[
                ("RELAY_HOST", "127.0.0.1"),
                ("RELAY_PORT", "8088"),
                ("RELAY_MAX_SEND_QUEUE", "16"),
                ("RELAY_HEARTBEAT_INTERVAL_SECS", "5"),
                ("RELAY_CLIENT_TIMEOUT_SECS", "15"),
                ("RELAY_LOG_LEVEL", "debug"),
                ("RELAY_LOG_JSON", "yes"),
            ]),
        );
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8088);
        assert_eq!(settings.server.max_send_queue, 16);
        assert_eq!(settings.server.heartbeat_interval_secs, 5);
        assert_eq!(settings.server.client_timeout_secs, 15);
        assert_eq!(settings.logging.level, "debug");
        assert!(settings.logging.json);
    }

    #[test]
    fn invalid_env_values_ignored() {
        let mut settings = RelaySettings::default();
        apply_env_overrides(
            &mut settings,
            env(&[
                ("RELAY_PORT", "99999"),
                ("RELAY_MAX_SEND_QUEUE", "0"),
                ("RELAY_LOG_JSON", "maybe"),
                ("RELAY_HOST", ""),
            ]),
        );
        assert_eq!(settings, RelaySettings::default());
    }

    // ── validation ──────────────────────────────────────────────────

    #[test]
    fn defaults_validate() {
        assert!(validate(&RelaySettings::default()).is_ok());
    }

    #[test]
    fn timeout_shorter_than_heartbeat_rejected() {
        let mut settings = RelaySettings::default();
        settings.server.client_timeout_secs = 10;
        let err = validate(&settings).unwrap_err();
        assert!(err.to_string().contains("clientTimeoutSecs"));
    }

    #[test]
    fn zero_queue_rejected() {
        let mut settings = RelaySettings::default();
        settings.server.max_send_queue = 0;
        assert!(matches!(validate(&settings), Err(SettingsError::InvalidValue(_))));
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("Off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("80", 1, 65535), Some(80));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u64_range("abc", 0, 10), None);
        assert_eq!(parse_usize_range("11", 0, 10), None);
    }
}
