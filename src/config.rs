//! Configuration.
//!
//! Loads settings from config.json next to the executable. `AppConfig` is
//! the file as written; `MonitorParameters` is the validated form the
//! monitor consumes, published through `SharedParameters` so edits reach a
//! running monitor on its next tick.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use crate::capture::CaptureRegion;
use crate::input::Key;
use crate::log;

/// Shortest allowed pause between ticks.
pub const MIN_INTERVAL: Duration = Duration::from_millis(50);

const DEFAULT_INTERVAL_SECS: f64 = 0.30;
const DEFAULT_COOLDOWN_SECS: f64 = 1.0;
const DEFAULT_CHAT_KEY: &str = "t";
const DEFAULT_OCR_TIMEOUT_MS: u64 = 5000;

/// config.json as written by the user.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Watched chat area. Derived from the screen size when absent.
    #[serde(default)]
    pub region: Option<CaptureRegion>,
    /// Pause between ticks, seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: f64,
    /// Time before the same code may be typed again, seconds
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: f64,
    /// Key that opens the game's chat input
    #[serde(default = "default_chat_key")]
    pub chat_key: String,
    /// Upper bound for one Tesseract run, 0 = unbounded
    #[serde(default = "default_ocr_timeout_ms")]
    pub ocr_timeout_ms: u64,
    /// Explicit Tesseract executable, skips auto-detection
    #[serde(default)]
    pub tesseract_path: Option<PathBuf>,
    /// Start monitoring as soon as the app launches
    #[serde(default = "default_autostart")]
    pub autostart: bool,
}

fn default_interval_secs() -> f64 {
    DEFAULT_INTERVAL_SECS
}

fn default_cooldown_secs() -> f64 {
    DEFAULT_COOLDOWN_SECS
}

fn default_chat_key() -> String {
    DEFAULT_CHAT_KEY.to_string()
}

fn default_ocr_timeout_ms() -> u64 {
    DEFAULT_OCR_TIMEOUT_MS
}

fn default_autostart() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            region: None,
            interval_secs: default_interval_secs(),
            cooldown_secs: default_cooldown_secs(),
            chat_key: default_chat_key(),
            ocr_timeout_ms: default_ocr_timeout_ms(),
            tesseract_path: None,
            autostart: default_autostart(),
        }
    }
}

impl AppConfig {
    /// Validates the monitor settings. `fallback_region` is used when the
    /// file has no region.
    pub fn to_parameters(&self, fallback_region: CaptureRegion) -> Result<MonitorParameters> {
        MonitorParameters::new(
            self.region.unwrap_or(fallback_region),
            self.interval_secs,
            self.cooldown_secs,
            &self.chat_key,
        )
    }

    pub fn ocr_timeout(&self) -> Option<Duration> {
        match self.ocr_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// Everything one monitor tick needs, already validated.
#[derive(Clone, Debug, PartialEq)]
pub struct MonitorParameters {
    pub region: CaptureRegion,
    /// Never below `MIN_INTERVAL`
    pub interval: Duration,
    pub cooldown: Duration,
    pub chat_key: Key,
}

impl MonitorParameters {
    pub fn new(
        region: CaptureRegion,
        interval_secs: f64,
        cooldown_secs: f64,
        chat_key: &str,
    ) -> Result<Self> {
        if !interval_secs.is_finite() || interval_secs < 0.0 {
            return Err(anyhow!("interval_secs must be >= 0, got {}", interval_secs));
        }
        if !cooldown_secs.is_finite() || cooldown_secs < 0.0 {
            return Err(anyhow!("cooldown_secs must be >= 0, got {}", cooldown_secs));
        }

        let chat_key = match chat_key.trim() {
            "" => DEFAULT_CHAT_KEY,
            name => name,
        };
        let chat_key = Key::parse(chat_key).context("Invalid chat_key")?;

        Ok(Self {
            region: region.clamped(),
            interval: Duration::from_secs_f64(interval_secs).max(MIN_INTERVAL),
            cooldown: Duration::from_secs_f64(cooldown_secs),
            chat_key,
        })
    }
}

impl std::fmt::Display for MonitorParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "region {}, interval {}ms, cooldown {}ms, chat key '{}'",
            self.region,
            self.interval.as_millis(),
            self.cooldown.as_millis(),
            self.chat_key
        )
    }
}

/// Latest parameters, replaced wholesale on every publish. Readers get an
/// immutable snapshot and never observe a half-applied edit.
#[derive(Clone)]
pub struct SharedParameters {
    current: Arc<RwLock<Arc<MonitorParameters>>>,
}

impl SharedParameters {
    pub fn new(params: MonitorParameters) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(params))),
        }
    }

    pub fn snapshot(&self) -> Arc<MonitorParameters> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn publish(&self, params: MonitorParameters) {
        let params = Arc::new(params);
        match self.current.write() {
            Ok(mut guard) => *guard = params,
            Err(poisoned) => *poisoned.into_inner() = params,
        }
    }
}

/// Reads and parses a config file.
pub fn read_config(path: &Path) -> Result<AppConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Loads configuration from `path` or returns defaults.
pub fn load_config(path: &Path) -> AppConfig {
    log(&format!("Looking for config at: {}", path.display()));

    if !path.exists() {
        log("config.json not found. Using default config.");
        return AppConfig::default();
    }

    match read_config(path) {
        Ok(config) => {
            log("Config loaded from config.json");
            config
        }
        Err(e) => {
            log(&format!("{:#}. Using defaults.", e));
            AppConfig::default()
        }
    }
}

/// Notices when the config file changes on disk.
pub struct ConfigWatcher {
    path: PathBuf,
    last_seen: Option<(SystemTime, u64)>,
}

impl ConfigWatcher {
    pub fn new(path: PathBuf) -> Self {
        let last_seen = fingerprint(&path);
        Self { path, last_seen }
    }

    /// Returns the re-read config when the file changed since the last call.
    pub fn poll(&mut self) -> Option<Result<AppConfig>> {
        let current = fingerprint(&self.path);
        if current == self.last_seen || current.is_none() {
            return None;
        }
        self.last_seen = current;
        Some(read_config(&self.path))
    }
}

fn fingerprint(path: &Path) -> Option<(SystemTime, u64)> {
    let meta = fs::metadata(path).ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn region() -> CaptureRegion {
        CaptureRegion::new(10, 600, 800, 200)
    }

    #[test]
    fn test_defaults() {
        let params = AppConfig::default().to_parameters(region()).unwrap();
        assert_eq!(params.region, region());
        assert_eq!(params.interval, Duration::from_millis(300));
        assert_eq!(params.cooldown, Duration::from_secs(1));
        assert_eq!(params.chat_key, Key::Char('t'));
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert!(config.region.is_none());
        assert_eq!(config.chat_key, "t");
        assert_eq!(config.ocr_timeout(), Some(Duration::from_millis(5000)));
        assert!(config.autostart);
    }

    #[test]
    fn test_full_json() {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "region": {"left": -4, "top": 700, "width": 0, "height": 150},
                "interval_secs": 0.5,
                "cooldown_secs": 0,
                "chat_key": "Enter",
                "ocr_timeout_ms": 0,
                "autostart": false
            }"#,
        )
        .unwrap();

        let params = config.to_parameters(region()).unwrap();
        assert_eq!(params.region, CaptureRegion::new(0, 700, 1, 150));
        assert_eq!(params.interval, Duration::from_millis(500));
        assert_eq!(params.cooldown, Duration::ZERO);
        assert_eq!(params.chat_key, Key::Enter);
        assert_eq!(config.ocr_timeout(), None);
        assert!(!config.autostart);
    }

    #[test]
    fn test_interval_is_floored() {
        let params = MonitorParameters::new(region(), 0.0, 1.0, "t").unwrap();
        assert_eq!(params.interval, MIN_INTERVAL);
    }

    #[test]
    fn test_blank_chat_key_falls_back() {
        let params = MonitorParameters::new(region(), 0.3, 1.0, "  ").unwrap();
        assert_eq!(params.chat_key, Key::Char('t'));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(MonitorParameters::new(region(), -1.0, 1.0, "t").is_err());
        assert!(MonitorParameters::new(region(), f64::NAN, 1.0, "t").is_err());
        assert!(MonitorParameters::new(region(), 0.3, -0.5, "t").is_err());
        assert!(MonitorParameters::new(region(), 0.3, f64::INFINITY, "t").is_err());
        assert!(MonitorParameters::new(region(), 0.3, 1.0, "not-a-key").is_err());
    }

    #[test]
    fn test_shared_parameters_publish_replaces_snapshot() {
        let shared = SharedParameters::new(AppConfig::default().to_parameters(region()).unwrap());
        let before = shared.snapshot();

        let updated = MonitorParameters::new(region(), 1.0, 5.0, "y").unwrap();
        shared.clone().publish(updated.clone());

        assert_eq!(before.chat_key, Key::Char('t'));
        assert_eq!(*shared.snapshot(), updated);
    }

    #[test]
    fn test_load_config_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(&dir.path().join("config.json"));
        assert_eq!(config.chat_key, "t");
    }

    #[test]
    fn test_load_config_invalid_json_gives_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(read_config(&path).is_err());
        assert_eq!(load_config(&path).interval_secs, 0.30);
    }

    #[test]
    fn test_watcher_reports_changes_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"cooldown_secs": 1.0}"#).unwrap();

        let mut watcher = ConfigWatcher::new(path.clone());
        assert!(watcher.poll().is_none());

        fs::write(&path, r#"{"cooldown_secs": 2.5, "chat_key": "y"}"#).unwrap();
        let config = watcher.poll().expect("change detected").unwrap();
        assert_eq!(config.cooldown_secs, 2.5);
        assert_eq!(config.chat_key, "y");

        assert!(watcher.poll().is_none());
    }

    #[test]
    fn test_watcher_ignores_missing_file() {
        let dir = tempdir().unwrap();
        let mut watcher = ConfigWatcher::new(dir.path().join("config.json"));
        assert!(watcher.poll().is_none());
    }
}
