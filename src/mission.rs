use std::collections::HashSet;
use std::fs;
use std::path::Path;

use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CatalogError;
use crate::util::mission_code;

static DATA_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/data");

/// Contents of a JSON file bundled into the binary from `src/data`.
pub(crate) fn embedded_json(file_name: &str) -> Option<&'static str> {
    DATA_DIR.get_file(file_name)?.contents_utf8()
}

/// One timed task in the challenge sequence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mission {
    pub id: u32,
    pub name: String,
    pub objective: String,
    pub duration_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_url: Option<String>,
}

impl Mission {
    /// Ledger label for this mission. Names already written as a code (`M…`) are kept.
    pub fn ledger_name(&self) -> String {
        let is_code = self.name.len() > 1
            && self.name.starts_with('M')
            && self.name[1..].chars().all(|c| c.is_ascii_digit());
        if is_code {
            self.name.clone()
        } else {
            mission_code(self.id)
        }
    }
}

/// The ordered, immutable list of missions for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct MissionCatalog {
    missions: Vec<Mission>,
}

impl MissionCatalog {
    /// Validates ids and durations and orders missions by id.
    pub fn new(mut missions: Vec<Mission>) -> Result<Self, CatalogError> {
        if missions.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        for mission in &missions {
            if mission.id == 0 {
                return Err(CatalogError::ZeroId);
            }
            if mission.duration_secs == 0 {
                return Err(CatalogError::ZeroDuration(mission.id));
            }
            if !seen.insert(mission.id) {
                return Err(CatalogError::DuplicateId(mission.id));
            }
        }

        missions.sort_by_key(|m| m.id);
        Ok(Self { missions })
    }

    /// The five missions shipped with the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        let raw = embedded_json("missions.json").unwrap_or("[]");
        Self::from_json(raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let missions: Vec<Mission> = serde_json::from_str(raw)?;
        Self::new(missions)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path.as_ref())?;
        let catalog = Self::from_json(&raw)?;
        info!(
            "Loaded {} missions from {}",
            catalog.len(),
            path.as_ref().display()
        );
        Ok(catalog)
    }

    /// Custom catalog when a path is configured, the built-in one otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::builtin(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&Mission> {
        self.missions.get(index)
    }

    pub fn by_id(&self, id: u32) -> Option<&Mission> {
        self.missions.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.missions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.missions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mission> {
        self.missions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn mission(id: u32, duration_secs: u64) -> Mission {
        Mission {
            id,
            name: format!("Mission {id}"),
            objective: "do it".to_string(),
            duration_secs,
            dataset_url: None,
        }
    }

    #[test]
    fn builtin_catalog_has_five_ordered_missions() {
        let catalog = MissionCatalog::builtin().unwrap();
        assert_eq!(catalog.len(), 5);
        let ids: Vec<u32> = catalog.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert!(catalog.iter().all(|m| m.duration_secs == 1800));
    }

    #[test]
    fn catalog_orders_by_id() {
        let catalog = MissionCatalog::new(vec![mission(3, 10), mission(1, 10)]).unwrap();
        assert_eq!(catalog.get(0).unwrap().id, 1);
        assert_eq!(catalog.get(1).unwrap().id, 3);
        assert!(catalog.get(2).is_none());
    }

    #[test]
    fn catalog_rejects_bad_input() {
        assert_matches!(MissionCatalog::new(vec![]), Err(CatalogError::Empty));
        assert_matches!(
            MissionCatalog::new(vec![mission(0, 10)]),
            Err(CatalogError::ZeroId)
        );
        assert_matches!(
            MissionCatalog::new(vec![mission(2, 10), mission(2, 20)]),
            Err(CatalogError::DuplicateId(2))
        );
        assert_matches!(
            MissionCatalog::new(vec![mission(4, 0)]),
            Err(CatalogError::ZeroDuration(4))
        );
    }

    #[test]
    fn catalog_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missions.json");
        std::fs::write(
            &path,
            r#"[{"id": 7, "name": "Pivot", "objective": "pivot it", "duration_secs": 60,
                 "dataset_url": "https://example.com/data.xlsx"}]"#,
        )
        .unwrap();

        let catalog = MissionCatalog::load(Some(path.as_path())).unwrap();
        let m = catalog.by_id(7).unwrap();
        assert_eq!(m.name, "Pivot");
        assert_eq!(m.dataset_url.as_deref(), Some("https://example.com/data.xlsx"));
    }

    #[test]
    fn ledger_name_prefers_codes() {
        let mut m = mission(3, 10);
        assert_eq!(m.ledger_name(), "M03");
        m.name = "M03".to_string();
        assert_eq!(m.ledger_name(), "M03");
        m.name = "Mapping".to_string();
        assert_eq!(m.ledger_name(), "M03");
    }
}
