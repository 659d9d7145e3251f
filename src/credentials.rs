use std::fs::OpenOptions;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::data_dir;
use crate::error::{AgentError, Result};

pub const KEY_FILE: &str = "api_keys.json";

/// One stored provider key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: u32,
    pub name: String,
    pub value: String,
}

/// API keys persisted as a JSON list, looked up by provider name.
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open_default() -> Self {
        Self::new(data_dir().join(KEY_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<ApiKey>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.path)?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| {
            AgentError::Credentials(format!("{} is corrupt: {e}", self.path.display()))
        })
    }

    fn store(&self, keys: &[ApiKey]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(&self.path)?;
        // `mode` only applies on creation; tighten files written by older versions too.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        serde_json::to_writer_pretty(file, keys)?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .load()?
            .into_iter()
            .find(|k| k.name == name)
            .map(|k| k.value))
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.get(name)?.is_some())
    }

    /// Insert or replace the key stored under `name`.
    pub fn save(&self, name: &str, value: &str) -> Result<ApiKey> {
        let value = value.trim();
        if value.is_empty() {
            return Err(AgentError::validation("API key cannot be empty"));
        }

        let mut keys = self.load()?;
        let saved = match keys.iter_mut().find(|k| k.name == name) {
            Some(existing) => {
                existing.value = value.to_string();
                existing.clone()
            }
            None => {
                let id = keys.iter().map(|k| k.id).max().unwrap_or(0) + 1;
                let key = ApiKey {
                    id,
                    name: name.to_string(),
                    value: value.to_string(),
                };
                keys.push(key.clone());
                key
            }
        };
        self.store(&keys)?;
        tracing::info!(provider = name, path = %self.path.display(), "api key saved");
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_means_no_keys() {
        let dir = tempdir().unwrap();
        let store = KeyStore::new(dir.path().join("keys.json"));
        assert_eq!(store.get("openai").unwrap(), None);
        assert!(!store.exists("openai").unwrap());
    }

    #[test]
    fn save_then_get_and_upsert() {
        let dir = tempdir().unwrap();
        let store = KeyStore::new(dir.path().join("nested").join("keys.json"));

        let first = store.save("openai", " sk-one ").unwrap();
        let second = store.save("anthropic", "ak-one").unwrap();
        assert_eq!((first.id, second.id), (1, 2));
        assert_eq!(store.get("openai").unwrap().as_deref(), Some("sk-one"));

        let replaced = store.save("openai", "sk-two").unwrap();
        assert_eq!(replaced.id, 1);
        assert_eq!(store.get("openai").unwrap().as_deref(), Some("sk-two"));
        assert!(store.exists("anthropic").unwrap());
    }

    #[test]
    fn empty_key_is_rejected() {
        let dir = tempdir().unwrap();
        let store = KeyStore::new(dir.path().join("keys.json"));
        assert!(matches!(store.save("openai", "   "), Err(AgentError::Validation(_))));
        assert!(!store.path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.json");
        std::fs::write(&path, "[]").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = KeyStore::new(&path);
        store.save("openai", "sk-one").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let fresh = KeyStore::new(dir.path().join("fresh.json"));
        fresh.save("anthropic", "ak-one").unwrap();
        let mode = std::fs::metadata(fresh.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.json");
        std::fs::write(&path, "not json").unwrap();
        let store = KeyStore::new(path);
        assert!(matches!(store.get("openai"), Err(AgentError::Credentials(_))));
    }
}
