use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub training_code: String,
    pub overtime_grace_secs: u64,
    pub briefing_secs: u64,
    pub points_per_submission: f64,
    pub upload_latency_ms: u64,
    pub missions_path: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub evidence_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            training_code: "ExcelEscape_202601".to_string(),
            overtime_grace_secs: 120,
            briefing_secs: 300,
            points_per_submission: 1.0,
            upload_latency_ms: 2000,
            missions_path: None,
            db_path: None,
            evidence_dir: None,
        }
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
        let path = if let Some(pd) = ProjectDirs::from("", "", "escaperoom") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("escaperoom_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the config, writing the defaults out first if no file exists yet so
    /// there is something to edit.
    pub fn load_or_init(&self) -> Config {
        if self.path.exists() {
            return self.load();
        }
        let cfg = Config::default();
        match self.save(&cfg) {
            Ok(()) => info!("Wrote default config to {}", self.path.display()),
            Err(err) => warn!(
                "Could not write default config to {}: {err}",
                self.path.display()
            ),
        }
        cfg
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!(
                    "Ignoring unreadable config at {}: {err}",
                    self.path.display()
                );
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).map_err(std::io::Error::other)?;
        fs::write(&self.path, data)
    }
}
