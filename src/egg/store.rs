//! Config store: persists and hydrates per-instance configurations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use thiserror::Error;

use super::instance::InstanceConfig;
use super::registry::EggRegistry;
use super::validate::{self, RuleViolation};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("instance not found: {0}")]
    NotFound(String),

    #[error("egg {0} does not exist")]
    UnknownEgg(String),

    #[error("port {0} is out of range [1024,65535]")]
    PortOutOfRange(u16),

    #[error("variable {variable}: {violation}")]
    VariableInvalid {
        variable: String,
        violation: RuleViolation,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// On-disk, atomically-rewritten index of per-instance configurations.
pub struct ConfigStore {
    dir: PathBuf,
    configs: RwLock<HashMap<String, InstanceConfig>>,
}

impl ConfigStore {
    pub fn load(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let mut configs = HashMap::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Ok(content) = std::fs::read_to_string(&path) {
                if let Ok(cfg) = serde_json::from_str::<InstanceConfig>(&content) {
                    configs.insert(cfg.id.clone(), cfg);
                }
            }
        }

        Ok(Self {
            dir,
            configs: RwLock::new(configs),
        })
    }

    pub fn list(&self) -> Vec<InstanceConfig> {
        self.configs.read().values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<InstanceConfig> {
        self.configs.read().get(id).cloned()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.configs.read().contains_key(id)
    }

    /// Validate `cfg` against `registry`, then create or overwrite its
    /// persisted document.
    pub fn create(&self, cfg: InstanceConfig, registry: &EggRegistry) -> StoreResult<InstanceConfig> {
        self.validate(&cfg, registry)?;
        self.persist(&cfg)?;
        self.configs.write().insert(cfg.id.clone(), cfg.clone());
        Ok(cfg)
    }

    /// Same validation/persistence path as `create`, named separately to
    /// mirror the external operation vocabulary (`configure` vs `update`).
    pub fn update(&self, cfg: InstanceConfig, registry: &EggRegistry) -> StoreResult<InstanceConfig> {
        self.create(cfg, registry)
    }

    pub fn delete(&self, id: &str) -> StoreResult<()> {
        let mut configs = self.configs.write();
        if configs.remove(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let path = self.path_for(id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn validate(&self, cfg: &InstanceConfig, registry: &EggRegistry) -> StoreResult<()> {
        let egg = registry.get(&cfg.egg_id).ok_or_else(|| StoreError::UnknownEgg(cfg.egg_id.clone()))?;

        if !(1024..=65535).contains(&cfg.port) {
            return Err(StoreError::PortOutOfRange(cfg.port));
        }

        for var in &egg.variables {
            if var.rules.is_empty() {
                continue;
            }
            let value = cfg.variables.get(&var.env_variable).map(|s| s.as_str());
            validate::validate(&var.rules, value).map_err(|violation| StoreError::VariableInvalid {
                variable: var.env_variable.clone(),
                violation,
            })?;
        }

        Ok(())
    }

    fn persist(&self, cfg: &InstanceConfig) -> StoreResult<()> {
        let path = self.path_for(&cfg.id);
        let content = serde_json::to_string_pretty(cfg)?;
        atomic_write(&path, content.as_bytes())?;
        Ok(())
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::egg::instance::Plan;
    use crate::egg::model::{Egg, EggRuntimeConfig};
    use std::collections::HashMap as Map;

    fn registry_with_egg() -> (tempfile::TempDir, EggRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let registry = EggRegistry::load(dir.path()).unwrap();
        registry
            .put(Egg {
                id: "terraria".into(),
                name: "Terraria".into(),
                description: String::new(),
                author: String::new(),
                docker_images: Map::from([("default".to_string(), "img".to_string())]),
                startup: "run".into(),
                config: EggRuntimeConfig::default(),
                scripts: Default::default(),
                variables: vec![crate::egg::model::EggVariable {
                    name: "World Name".into(),
                    env_variable: "WORLD_NAME".into(),
                    default_value: "world".into(),
                    user_viewable: true,
                    user_editable: true,
                    rules: "required|string".into(),
                }],
            })
            .unwrap();
        (dir, registry)
    }

    fn cfg(id: &str) -> InstanceConfig {
        InstanceConfig {
            id: id.into(),
            egg_id: "terraria".into(),
            port: 7777,
            plan: Plan { ram: 1, cpu: 100, disk: 5 },
            location: "node-1".into(),
            name: "s1".into(),
            game: "terraria".into(),
            variables: Map::from([("WORLD_NAME".to_string(), "PyroWorld".to_string())]),
        }
    }

    #[test]
    fn create_then_get_round_trips_with_egg_resolvable() {
        let (_eggs_dir, registry) = registry_with_egg();
        let configs_dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::load(configs_dir.path()).unwrap();

        store.create(cfg("s1"), &registry).unwrap();
        let fetched = store.get("s1").unwrap();
        assert_eq!(fetched.port, 7777);
    }

    #[test]
    fn rejects_unknown_egg() {
        let (_eggs_dir, registry) = registry_with_egg();
        let configs_dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::load(configs_dir.path()).unwrap();

        let mut bad = cfg("s1");
        bad.egg_id = "does-not-exist".into();
        assert!(matches!(store.create(bad, &registry), Err(StoreError::UnknownEgg(_))));
    }

    #[test]
    fn port_boundaries() {
        let (_eggs_dir, registry) = registry_with_egg();
        let configs_dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::load(configs_dir.path()).unwrap();

        let mut low = cfg("low");
        low.port = 1023;
        assert!(store.create(low, &registry).is_err());

        let mut ok = cfg("ok");
        ok.port = 1024;
        assert!(store.create(ok, &registry).is_ok());
    }

    #[test]
    fn enforces_variable_rules() {
        let (_eggs_dir, registry) = registry_with_egg();
        let configs_dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::load(configs_dir.path()).unwrap();

        let mut missing_required = cfg("s2");
        missing_required.variables.clear();
        assert!(store.create(missing_required, &registry).is_err());
    }

    #[test]
    fn reload_rehydrates_persisted_configs() {
        let (_eggs_dir, registry) = registry_with_egg();
        let configs_dir = tempfile::tempdir().unwrap();
        {
            let store = ConfigStore::load(configs_dir.path()).unwrap();
            store.create(cfg("s1"), &registry).unwrap();
        }

        let store = ConfigStore::load(configs_dir.path()).unwrap();
        assert!(store.exists("s1"));
    }
}
