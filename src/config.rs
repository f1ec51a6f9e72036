use crate::haptics::DEFAULT_PATTERN_MS;
use crate::registry::DEFAULT_TIMER_COUNT;
use crate::stopwatch::DEFAULT_LAP_PREFIX;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub timer_count: usize,
    /// Display refresh cadence
    pub frame_interval_ms: u64,
    pub haptics: bool,
    pub haptic_pattern_ms: u64,
    pub lap_label_prefix: String,
    /// Archive a timer's run before resetting it
    pub archive_on_reset: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timer_count: DEFAULT_TIMER_COUNT,
            frame_interval_ms: 16,
            haptics: true,
            haptic_pattern_ms: DEFAULT_PATTERN_MS,
            lap_label_prefix: DEFAULT_LAP_PREFIX.to_string(),
            archive_on_reset: false,
        }
    }
}

impl Config {
    /// Clamp values the app can't run with
    pub fn sanitized(mut self) -> Self {
        self.timer_count = self.timer_count.clamp(1, 9);
        self.frame_interval_ms = self.frame_interval_ms.max(1);
        if self.lap_label_prefix.trim().is_empty() {
            self.lap_label_prefix = DEFAULT_LAP_PREFIX.to_string();
        }
        self
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: crate::app_dirs::AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), %e, "ignoring unreadable config")
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), %e, "could not read config"),
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config {
            timer_count: 2,
            frame_interval_ms: 33,
            haptics: false,
            haptic_pattern_ms: 40,
            lap_label_prefix: "Tour".into(),
            archive_on_reset: true,
        };
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn missing_or_broken_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        assert_eq!(store.load(), Config::default());

        std::fs::write(&path, b"{ not json").unwrap();
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, br#"{ "timer_count": 6 }"#).unwrap();

        let cfg = FileConfigStore::with_path(&path).load();
        assert_eq!(cfg.timer_count, 6);
        assert_eq!(cfg.lap_label_prefix, "Lap");
    }

    #[test]
    fn sanitized_clamps() {
        let cfg = Config {
            timer_count: 0,
            frame_interval_ms: 0,
            lap_label_prefix: "  ".into(),
            ..Config::default()
        }
        .sanitized();
        assert_eq!(cfg.timer_count, 1);
        assert_eq!(cfg.frame_interval_ms, 1);
        assert_eq!(cfg.lap_label_prefix, "Lap");
    }
}
