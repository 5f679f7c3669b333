// File: src/storage.rs
use crate::paths::AppPaths;
use crate::session::TokenStore;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[cfg(not(target_os = "android"))]
use fs2::FileExt;

#[derive(Serialize, Deserialize)]
struct StoredSession {
    token: String,
}

/// Persists the bearer token as a small JSON file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Token file in the platform data dir.
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(AppPaths::get_session_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Helper to get a sidecar lock file path (e.g., "session.json.lock")
    #[cfg(not(target_os = "android"))]
    fn get_lock_path(file_path: &Path) -> PathBuf {
        let mut lock_path = file_path.to_path_buf();
        if let Some(ext) = lock_path.extension() {
            let mut new_ext = ext.to_os_string();
            new_ext.push(".lock");
            lock_path.set_extension(new_ext);
        } else {
            lock_path.set_extension("lock");
        }
        lock_path
    }

    /// Execute a closure while holding an exclusive lock on the sidecar file.
    fn with_lock<F, T>(file_path: &Path, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        #[cfg(target_os = "android")]
        {
            let _ = file_path;
            f()
        }

        #[cfg(not(target_os = "android"))]
        {
            if let Some(parent) = file_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let lock_path = Self::get_lock_path(file_path);
            let file = fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&lock_path)?;

            file.lock_exclusive()?;
            let result = f();
            file.unlock()?;
            result
        }
    }

    /// Atomic write: write to a .tmp file then rename.
    fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, contents)?;
        fs::rename(tmp_path, path)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        Self::with_lock(&self.path, || {
            let json = fs::read_to_string(&self.path)?;
            let stored: StoredSession = serde_json::from_str(&json)?;
            if stored.token.is_empty() {
                return Ok(None);
            }
            Ok(Some(stored.token))
        })
    }

    fn save(&self, token: &str) -> Result<()> {
        Self::with_lock(&self.path, || {
            let json = serde_json::to_string_pretty(&StoredSession {
                token: token.to_string(),
            })?;
            Self::atomic_write(&self.path, json)
        })
    }

    fn clear(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        Self::with_lock(&self.path, || {
            fs::remove_file(&self.path)?;
            Ok(())
        })
    }
}

/// Keeps the token in memory only. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self
            .token
            .lock()
            .map_err(|_| anyhow::anyhow!("token store poisoned"))?
            .clone())
    }

    fn save(&self, token: &str) -> Result<()> {
        *self
            .token
            .lock()
            .map_err(|_| anyhow::anyhow!("token store poisoned"))? = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self
            .token
            .lock()
            .map_err(|_| anyhow::anyhow!("token store poisoned"))? = None;
        Ok(())
    }
}
