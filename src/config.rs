//! Configuration management for scenarium.
//!
//! Settings come from three layers: built-in defaults, an optional
//! `config.toml` in the data directory, and `SCENARIUM_*` environment
//! variables. Later layers win.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root directory for locally stored data.
    pub data_dir: PathBuf,

    /// Bounded capacity of the background job queue.
    pub queue_capacity: usize,

    /// Number of dispatcher worker tasks.
    pub dispatch_workers: usize,

    /// TTL for the per-batch import lease, in seconds. Must stay generous
    /// relative to expected import duration: expiry is the only recovery
    /// path after a crash.
    pub import_lock_ttl_secs: u64,

    /// Requests admitted per subject within one rate-limit window.
    pub rate_limit_permits: usize,

    /// Rate-limit window length in seconds.
    pub rate_limit_window_secs: u64,

    /// Lifetime of signed upload URLs, in seconds.
    pub upload_url_ttl_secs: u64,

    /// Lifetime of signed read URLs, in seconds.
    pub read_url_ttl_secs: u64,

    /// Redis connection URL for distributed coordination (locks and rate
    /// limiting). None = in-process backends, safe for a single instance
    /// only. Example: "redis://127.0.0.1:6379/0"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            queue_capacity: 100,
            dispatch_workers: 1,
            import_lock_ttl_secs: 300,
            rate_limit_permits: 120,
            rate_limit_window_secs: 60,
            upload_url_ttl_secs: 900,
            read_url_ttl_secs: 3600,
            redis_url: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("scenarium"))
        .unwrap_or_else(|| PathBuf::from(".scenarium"))
}

impl Settings {
    /// Replace the data directory, expanding `~` in the given path.
    pub fn with_data_dir(mut self, dir: &str) -> Self {
        self.data_dir = PathBuf::from(shellexpand::tilde(dir).as_ref());
        self
    }

    /// Directory holding blob content for the filesystem content store.
    pub fn content_dir(&self) -> PathBuf {
        self.data_dir.join("content")
    }

    /// Path of the optional TOML settings file.
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    pub fn import_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.import_lock_ttl_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn upload_url_ttl(&self) -> Duration {
        Duration::from_secs(self.upload_url_ttl_secs)
    }

    pub fn read_url_ttl(&self) -> Duration {
        Duration::from_secs(self.read_url_ttl_secs)
    }

    /// Create the data and content directories if they do not exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.content_dir())?;
        Ok(())
    }

    fn apply_file(self, path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(self);
        }
        let raw = std::fs::read_to_string(path)?;
        let mut file: Settings = toml::from_str(&raw)?;
        // data_dir from the file is ignored: the file lives inside it.
        file.data_dir = self.data_dir;
        Ok(file)
    }

    fn apply_env<F>(mut self, get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = get("SCENARIUM_DATA_DIR") {
            self = self.with_data_dir(&dir);
        }
        if let Some(v) = get("SCENARIUM_QUEUE_CAPACITY").and_then(|v| v.parse().ok()) {
            self.queue_capacity = v;
        }
        if let Some(v) = get("SCENARIUM_DISPATCH_WORKERS").and_then(|v| v.parse().ok()) {
            self.dispatch_workers = v;
        }
        if let Some(v) = get("SCENARIUM_IMPORT_LOCK_TTL_SECS").and_then(|v| v.parse().ok()) {
            self.import_lock_ttl_secs = v;
        }
        if let Some(v) = get("SCENARIUM_RATE_LIMIT_PERMITS").and_then(|v| v.parse().ok()) {
            self.rate_limit_permits = v;
        }
        if let Some(v) = get("SCENARIUM_RATE_LIMIT_WINDOW_SECS").and_then(|v| v.parse().ok()) {
            self.rate_limit_window_secs = v;
        }
        if let Some(url) = get("SCENARIUM_REDIS_URL") {
            self.redis_url = if url.is_empty() { None } else { Some(url) };
        }
        self
    }
}

/// Load settings: defaults, then `config.toml` from the data directory,
/// then environment overrides.
pub fn load_settings(data_dir: Option<&str>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();
    if let Some(dir) = data_dir {
        settings = settings.with_data_dir(dir);
    }
    let config_path = settings.config_path();
    settings = settings.apply_file(&config_path)?;
    Ok(settings.apply_env(|key| std::env::var(key).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.queue_capacity, 100);
        assert_eq!(settings.dispatch_workers, 1);
        assert_eq!(settings.import_lock_ttl_secs, 300);
        assert_eq!(settings.rate_limit_window_secs, 60);
        assert!(settings.redis_url.is_none());
    }

    #[test]
    fn test_file_layer_keeps_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::default().with_data_dir(dir.path().to_str().unwrap());
        std::fs::write(
            settings.config_path(),
            "queue_capacity = 7\nredis_url = \"redis://localhost/1\"\n",
        )
        .unwrap();

        let loaded = settings.clone().apply_file(&settings.config_path()).unwrap();
        assert_eq!(loaded.queue_capacity, 7);
        assert_eq!(loaded.redis_url.as_deref(), Some("redis://localhost/1"));
        assert_eq!(loaded.data_dir, settings.data_dir);
        // Unspecified fields fall back to defaults.
        assert_eq!(loaded.dispatch_workers, 1);
    }

    #[test]
    fn test_env_overrides() {
        let settings = Settings::default().apply_env(|key| match key {
            "SCENARIUM_QUEUE_CAPACITY" => Some("12".into()),
            "SCENARIUM_RATE_LIMIT_PERMITS" => Some("not-a-number".into()),
            "SCENARIUM_REDIS_URL" => Some("redis://cache:6379".into()),
            _ => None,
        });
        assert_eq!(settings.queue_capacity, 12);
        // Unparseable values are ignored.
        assert_eq!(settings.rate_limit_permits, 120);
        assert_eq!(settings.redis_url.as_deref(), Some("redis://cache:6379"));
    }

    #[test]
    fn test_duration_helpers() {
        let settings = Settings::default();
        assert_eq!(settings.import_lock_ttl(), Duration::from_secs(300));
        assert_eq!(settings.rate_limit_window(), Duration::from_secs(60));
    }
}
