// File: src/session.rs
use crate::error::{ApiError, Result};
use crate::storage::MemoryTokenStore;
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Where the bearer token is persisted between runs.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> anyhow::Result<Option<String>>;
    fn save(&self, token: &str) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
}

/// Holds the current bearer token. Written by the auth flow, read by the
/// request builder before every call.
pub struct Session {
    token: RwLock<Option<String>>,
    store: Box<dyn TokenStore>,
}

impl Session {
    pub fn new(store: Box<dyn TokenStore>) -> Self {
        Self {
            token: RwLock::new(None),
            store,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryTokenStore::new()))
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<String>> {
        self.token.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<String>> {
        self.token.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn token(&self) -> Option<String> {
        self.read().clone()
    }

    pub fn has_token(&self) -> bool {
        self.read().is_some()
    }

    /// Applies the token in memory first, then persists it.
    pub fn set_token(&self, token: String) -> Result<()> {
        *self.write() = Some(token.clone());
        self.store
            .save(&token)
            .map_err(|e| ApiError::Storage(e.to_string()))
    }

    /// Always clears the in-memory token. Persistence errors are returned
    /// but the session is already unauthenticated by then.
    pub fn clear_token(&self) -> Result<()> {
        *self.write() = None;
        self.store
            .clear()
            .map_err(|e| ApiError::Storage(e.to_string()))
    }

    /// Loads the persisted token into memory, if any.
    pub fn restore(&self) -> Result<Option<String>> {
        let token = self
            .store
            .load()
            .map_err(|e| ApiError::Storage(e.to_string()))?;
        *self.write() = token.clone();
        Ok(token)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.read().as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileTokenStore;

    struct BrokenStore;

    impl TokenStore for BrokenStore {
        fn load(&self) -> anyhow::Result<Option<String>> {
            Err(anyhow::anyhow!("disk gone"))
        }
        fn save(&self, _: &str) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("disk gone"))
        }
        fn clear(&self) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("disk gone"))
        }
    }

    #[test]
    fn test_set_and_clear() {
        let session = Session::in_memory();
        assert!(!session.has_token());
        session.set_token("tok".to_string()).unwrap();
        assert_eq!(session.token().as_deref(), Some("tok"));
        session.clear_token().unwrap();
        assert_eq!(session.token(), None);
    }

    #[test]
    fn test_restore_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        FileTokenStore::new(path.clone()).save("persisted").unwrap();

        let session = Session::new(Box::new(FileTokenStore::new(path)));
        assert_eq!(session.token(), None);
        assert_eq!(session.restore().unwrap().as_deref(), Some("persisted"));
        assert_eq!(session.token().as_deref(), Some("persisted"));
    }

    #[test]
    fn test_clear_is_unconditional_in_memory() {
        let session = Session::new(Box::new(BrokenStore));
        // Memory is updated even though persistence fails
        assert!(session.set_token("tok".to_string()).is_err());
        assert!(session.has_token());
        assert!(session.clear_token().is_err());
        assert!(!session.has_token());
    }

    #[test]
    fn test_debug_redacts_token() {
        let session = Session::in_memory();
        session.set_token("secret-token".to_string()).unwrap();
        let dbg = format!("{:?}", session);
        assert!(!dbg.contains("secret-token"));
    }
}
