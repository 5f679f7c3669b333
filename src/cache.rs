// File: src/cache.rs
use crate::model::AddressEntry;
use crate::paths::AppPaths;
use anyhow::Result;
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

/// On-disk cache for address reference data, one file per lookup.
#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
}

impl Cache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn default_location() -> Result<Self> {
        Ok(Self::new(AppPaths::get_cache_dir()?))
    }

    // Filename from the server URL and the lookup key, e.g. "provinces:13"
    fn get_path(&self, server: &str, key: &str) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        server.hash(&mut hasher);
        key.hash(&mut hasher);
        let label: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.dir
            .join(format!("address_{}_{:x}.json", label, hasher.finish()))
    }

    pub fn save(&self, server: &str, key: &str, entries: &[AddressEntry]) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(self.get_path(server, key), json)?;
        Ok(())
    }

    pub fn load(&self, server: &str, key: &str) -> Result<Option<Vec<AddressEntry>>> {
        let path = self.get_path(server, key);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path)?;
        let entries: Vec<AddressEntry> = serde_json::from_str(&json)?;
        Ok(Some(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: &str, name: &str) -> AddressEntry {
        AddressEntry {
            code: code.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_miss_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path().join("cache"));
        assert_eq!(cache.load("http://a", "regions").unwrap(), None);

        let regions = vec![entry("01", "Ilocos Region"), entry("13", "NCR")];
        cache.save("http://a", "regions", &regions).unwrap();
        assert_eq!(cache.load("http://a", "regions").unwrap(), Some(regions));
    }

    #[test]
    fn test_keys_are_scoped_by_server() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path().to_path_buf());
        cache
            .save("http://a", "provinces:13", &[entry("1339", "Manila")])
            .unwrap();
        assert_eq!(cache.load("http://b", "provinces:13").unwrap(), None);
        assert_eq!(cache.load("http://a", "provinces:01").unwrap(), None);
    }
}
