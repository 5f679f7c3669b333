// File: src/paths.rs
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Overrides the base dir with the test directory when set.
pub const TEST_DIR_ENV: &str = "LABDESK_TEST_DIR";

// Set once by the mobile shell with its private files dir.
static MOBILE_DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirKind {
    Data,
    Config,
    Cache,
}

impl DirKind {
    fn subdir(self) -> &'static str {
        match self {
            DirKind::Data => "data",
            DirKind::Config => "config",
            DirKind::Cache => "cache",
        }
    }
}

pub struct AppPaths;

impl AppPaths {
    /// Must be called once at startup, before any config or token access.
    pub fn init_mobile_path(path: String) {
        let _ = MOBILE_DATA_DIR.set(PathBuf::from(path));
    }

    /// Mobile files dir, then the test override, then the platform dirs.
    fn locate(kind: DirKind) -> Result<PathBuf> {
        if let Some(root) = MOBILE_DATA_DIR.get() {
            return Ok(root.join(kind.subdir()));
        }
        if let Some(root) = env::var_os(TEST_DIR_ENV) {
            return Ok(PathBuf::from(root).join(kind.subdir()));
        }
        let proj = ProjectDirs::from("com", "labdesk", "labdesk")
            .with_context(|| format!("Could not determine {} directory", kind.subdir()))?;
        Ok(match kind {
            DirKind::Data => proj.data_dir(),
            DirKind::Config => proj.config_dir(),
            DirKind::Cache => proj.cache_dir(),
        }
        .to_path_buf())
    }

    fn ensure(kind: DirKind) -> Result<PathBuf> {
        let path = Self::locate(kind)?;
        fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create directory: {:?}", path))?;
        Ok(path)
    }

    pub fn get_data_dir() -> Result<PathBuf> {
        Self::ensure(DirKind::Data)
    }

    pub fn get_config_dir() -> Result<PathBuf> {
        Self::ensure(DirKind::Config)
    }

    pub fn get_cache_dir() -> Result<PathBuf> {
        Self::ensure(DirKind::Cache)
    }

    pub fn get_config_file_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.toml"))
    }

    /// Bearer token file.
    pub fn get_session_path() -> Result<PathBuf> {
        Ok(Self::get_data_dir()?.join("session.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The only test in the crate that touches the process environment.
    #[test]
    fn test_override_dir_gets_one_subdir_per_kind() {
        let dir = tempfile::tempdir().unwrap();
        unsafe { env::set_var(TEST_DIR_ENV, dir.path()) };

        assert_eq!(
            AppPaths::get_config_file_path().unwrap(),
            dir.path().join("config").join("config.toml")
        );
        assert_eq!(
            AppPaths::get_session_path().unwrap(),
            dir.path().join("data").join("session.json")
        );
        assert_eq!(AppPaths::get_cache_dir().unwrap(), dir.path().join("cache"));
        for sub in ["config", "data", "cache"] {
            assert!(dir.path().join(sub).is_dir(), "{} not created", sub);
        }

        unsafe { env::remove_var(TEST_DIR_ENV) };
    }
}
