use directories::ProjectDirs;
use std::path::PathBuf;

use crate::config::Config;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("escaperoom"),
            )
        } else {
            ProjectDirs::from("", "", "escaperoom").map(|pd| pd.data_local_dir().to_path_buf())
        }
    }

    pub fn db_path(cfg: &Config) -> PathBuf {
        cfg.db_path.clone().unwrap_or_else(|| {
            Self::state_dir()
                .map(|d| d.join("ledger.db"))
                .unwrap_or_else(|| PathBuf::from("escaperoom_ledger.db"))
        })
    }

    pub fn evidence_dir(cfg: &Config) -> PathBuf {
        cfg.evidence_dir.clone().unwrap_or_else(|| {
            Self::state_dir()
                .map(|d| d.join("evidence"))
                .unwrap_or_else(|| PathBuf::from("evidence"))
        })
    }

    pub fn log_dir() -> PathBuf {
        Self::state_dir()
            .map(|d| d.join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_paths_win() {
        let cfg = Config {
            db_path: Some(PathBuf::from("/tmp/x.db")),
            evidence_dir: Some(PathBuf::from("/tmp/ev")),
            ..Config::default()
        };
        assert_eq!(AppDirs::db_path(&cfg), PathBuf::from("/tmp/x.db"));
        assert_eq!(AppDirs::evidence_dir(&cfg), PathBuf::from("/tmp/ev"));
    }

    #[test]
    fn default_db_file_name() {
        let path = AppDirs::db_path(&Config::default());
        assert!(path.ends_with("ledger.db"));
    }
}
