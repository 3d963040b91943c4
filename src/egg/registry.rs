//! Egg registry: loads, persists, and indexes egg descriptors on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{info, warn};

use super::model::Egg;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("egg not found: {0}")]
    NotFound(String),

    #[error("invalid egg: {0}")]
    Invalid(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// In-memory index over the eggs directory, kept in sync on every mutation.
pub struct EggRegistry {
    dir: PathBuf,
    eggs: RwLock<HashMap<String, Egg>>,
}

impl EggRegistry {
    /// Load every `*.json` descriptor under `dir`, seeding built-in defaults
    /// if the directory is empty.
    pub fn load(dir: impl Into<PathBuf>) -> RegistryResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let mut eggs = HashMap::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(content) => match serde_json::from_str::<Egg>(&content) {
                    Ok(egg) => {
                        eggs.insert(egg.id.clone(), egg);
                    }
                    Err(e) => warn!("failed to parse egg descriptor {:?}: {}", path, e),
                },
                Err(e) => warn!("failed to read egg descriptor {:?}: {}", path, e),
            }
        }

        let registry = Self {
            dir,
            eggs: RwLock::new(eggs),
        };

        if registry.eggs.read().is_empty() {
            info!("no eggs found in {:?}, seeding built-in defaults", registry.dir);
            for egg in super::defaults::builtin_eggs() {
                registry.put(egg)?;
            }
        }

        Ok(registry)
    }

    pub fn list(&self) -> Vec<Egg> {
        self.eggs.read().values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<Egg> {
        self.eggs.read().get(id).cloned()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.eggs.read().contains_key(id)
    }

    /// Create or update an egg, rewriting its JSON atomically.
    pub fn put(&self, egg: Egg) -> RegistryResult<()> {
        egg.validate().map_err(RegistryError::Invalid)?;

        let path = self.path_for(&egg.id);
        let content = serde_json::to_string_pretty(&egg)?;
        atomic_write(&path, content.as_bytes())?;

        self.eggs.write().insert(egg.id.clone(), egg);
        Ok(())
    }

    pub fn delete(&self, id: &str) -> RegistryResult<()> {
        let mut eggs = self.eggs.write();
        if eggs.remove(id).is_none() {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        let path = self.path_for(id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

/// Write-to-temp-then-rename so readers never observe a partial file.
fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::egg::model::EggRuntimeConfig;
    use std::collections::HashMap as Map;

    fn sample_egg(id: &str) -> Egg {
        Egg {
            id: id.to_string(),
            name: "Test".into(),
            description: String::new(),
            author: String::new(),
            docker_images: Map::from([("Java 17".to_string(), "img:17".to_string())]),
            startup: "./run".into(),
            config: EggRuntimeConfig::default(),
            scripts: Default::default(),
            variables: vec![],
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let registry = EggRegistry::load(dir.path()).unwrap();
        registry.put(sample_egg("custom")).unwrap();

        let fetched = registry.get("custom").unwrap();
        assert_eq!(fetched.name, "Test");
        assert!(registry.exists("custom"));
    }

    #[test]
    fn reload_picks_up_persisted_eggs() {
        let dir = tempfile::tempdir().unwrap();
        {
            let registry = EggRegistry::load(dir.path()).unwrap();
            registry.put(sample_egg("custom")).unwrap();
        }

        let registry = EggRegistry::load(dir.path()).unwrap();
        assert!(registry.exists("custom"));
    }

    #[test]
    fn put_rejects_invalid_egg() {
        let dir = tempfile::tempdir().unwrap();
        let registry = EggRegistry::load(dir.path()).unwrap();
        let mut egg = sample_egg("bad");
        egg.docker_images.clear();
        assert!(registry.put(egg).is_err());
    }

    #[test]
    fn delete_removes_from_index_and_disk() {
        let dir = tempfile::tempdir().unwrap();
        let registry = EggRegistry::load(dir.path()).unwrap();
        registry.put(sample_egg("custom")).unwrap();
        registry.delete("custom").unwrap();
        assert!(!registry.exists("custom"));
        assert!(registry.delete("custom").is_err());
    }

    #[test]
    fn empty_directory_seeds_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let registry = EggRegistry::load(dir.path()).unwrap();
        assert!(!registry.list().is_empty());
    }
}
