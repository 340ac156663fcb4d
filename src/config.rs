use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

const APP_DIR: &str = "academic-portal";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub debounce_ms: u64,
    pub timeout_secs: u64,
    pub session_file: PathBuf,
    pub log_json: bool,
    /// Environment overrides that could not be parsed and were skipped.
    /// Loading happens before logging is set up, so callers report these.
    pub ignored_overrides: Vec<String>,
}

/// On-disk settings. Every key is optional; absent keys keep the default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Settings {
    api_url: Option<String>,
    debounce_ms: Option<u64>,
    timeout_secs: Option<u64>,
    session_file: Option<PathBuf>,
    log_json: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            session_file: config_dir().join("session.json"),
            log_json: false,
            ignored_overrides: Vec::new(),
        }
    }
}

impl Config {
    /// Defaults, then the settings file, then `PORTAL_*` environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let settings_path = std::env::var_os("PORTAL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir().join("settings.json"));
        Self::load_with(&settings_path, |name| std::env::var(name).ok())
    }

    pub fn load_with<F>(settings_path: &Path, get_env: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_settings(read_settings(settings_path)?);
        config.apply_env(get_env);
        config.api_url = config.api_url.trim_end_matches('/').to_string();
        Ok(config)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    fn apply_settings(&mut self, settings: Settings) {
        if let Some(url) = settings.api_url {
            self.api_url = url;
        }
        if let Some(ms) = settings.debounce_ms {
            self.debounce_ms = ms;
        }
        if let Some(secs) = settings.timeout_secs {
            self.timeout_secs = secs;
        }
        if let Some(path) = settings.session_file {
            self.session_file = path;
        }
        if let Some(json) = settings.log_json {
            self.log_json = json;
        }
    }

    fn apply_env<F>(&mut self, get_env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = get_env("PORTAL_API_URL").filter(|v| !v.trim().is_empty()) {
            self.api_url = url.trim().to_string();
        }
        if let Some(ms) = self.parse_env(&get_env, "PORTAL_DEBOUNCE_MS") {
            self.debounce_ms = ms;
        }
        if let Some(secs) = self.parse_env(&get_env, "PORTAL_TIMEOUT_SECS") {
            self.timeout_secs = secs;
        }
        if let Some(path) = get_env("PORTAL_SESSION_FILE").filter(|v| !v.trim().is_empty()) {
            self.session_file = PathBuf::from(path);
        }
        if let Some(raw) = get_env("PORTAL_LOG_JSON") {
            match parse_bool(&raw) {
                Some(json) => self.log_json = json,
                None => self.ignore_override("PORTAL_LOG_JSON", &raw),
            }
        }
    }

    fn parse_env<F>(&mut self, get_env: &F, name: &str) -> Option<u64>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = get_env(name)?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                self.ignore_override(name, &raw);
                None
            }
        }
    }

    fn ignore_override(&mut self, name: &str, raw: &str) {
        self.ignored_overrides
            .push(format!("ignoring unparsable {name}={raw:?}"));
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn read_settings(path: &Path) -> anyhow::Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse settings file {}", path.display()))
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_settings_missing() {
        let temp = TempDir::new().expect("tempdir");
        let config =
            Config::load_with(&temp.path().join("settings.json"), env(&[])).expect("load");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert!(!config.log_json);
        assert!(config.ignored_overrides.is_empty());
    }

    #[test]
    fn env_overrides_settings_file() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{ "api_url": "http://portal.local:9000/", "debounce_ms": 250, "log_json": true }"#,
        )
        .expect("write settings");

        let config = Config::load_with(
            &path,
            env(&[("PORTAL_DEBOUNCE_MS", "800"), ("PORTAL_LOG_JSON", "off")]),
        )
        .expect("load");
        assert_eq!(config.api_url, "http://portal.local:9000");
        assert_eq!(config.debounce_ms, 800);
        assert!(!config.log_json);
    }

    #[test]
    fn unparsable_numeric_override_is_ignored() {
        let temp = TempDir::new().expect("tempdir");
        let config = Config::load_with(
            &temp.path().join("missing.json"),
            env(&[("PORTAL_TIMEOUT_SECS", "soon")]),
        )
        .expect("load");
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(
            config.ignored_overrides,
            vec![r#"ignoring unparsable PORTAL_TIMEOUT_SECS="soon""#.to_string()]
        );
    }

    #[test]
    fn every_bad_override_is_reported() {
        let temp = TempDir::new().expect("tempdir");
        let config = Config::load_with(
            &temp.path().join("missing.json"),
            env(&[
                ("PORTAL_DEBOUNCE_MS", "-5"),
                ("PORTAL_LOG_JSON", "maybe"),
                ("PORTAL_TIMEOUT_SECS", "30"),
            ]),
        )
        .expect("load");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.ignored_overrides.len(), 2);
        assert!(config.ignored_overrides[0].contains("PORTAL_DEBOUNCE_MS"));
        assert!(config.ignored_overrides[1].contains("PORTAL_LOG_JSON"));
    }

    #[test]
    fn malformed_settings_file_names_the_path() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("settings.json");
        std::fs::write(&path, "{ not json").expect("write settings");
        let err = Config::load_with(&path, env(&[])).expect_err("should fail");
        assert!(format!("{err:#}").contains("settings.json"));
    }
}
