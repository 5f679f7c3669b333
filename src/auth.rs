// File: src/auth.rs
use crate::client::ApiClient;
use crate::error::Result;
use crate::model::{LoginRequest, User};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Uninitialized,
    Hydrating,
    Authenticated(User),
    Unauthenticated,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }
}

/// Login/logout and start-up validation of a persisted token.
///
/// The state lock is never held across a request, so `Hydrating` is visible
/// to other callers while `GET /user` is in flight. Every transition bumps an
/// epoch; a hydrate that finishes after a login or logout is discarded.
#[derive(Debug)]
pub struct Auth {
    client: ApiClient,
    state: RwLock<AuthState>,
    epoch: AtomicU64,
}

impl Auth {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            state: RwLock::new(AuthState::Uninitialized),
            epoch: AtomicU64::new(0),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, AuthState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AuthState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn begin(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    pub fn state(&self) -> AuthState {
        self.read().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        match &*self.read() {
            AuthState::Authenticated(user) => Some(user.clone()),
            _ => None,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    fn drop_session(&self) {
        if let Err(e) = self.client.session().clear_token() {
            log::error!("could not clear stored token: {}", e);
        }
        *self.write() = AuthState::Unauthenticated;
    }

    /// Start-up: restore the persisted token and validate it against the
    /// server. Any failure leaves the session cleared.
    pub async fn hydrate(&self) -> AuthState {
        let epoch = self.begin();
        *self.write() = AuthState::Hydrating;
        let session = self.client.session().clone();

        let token = match session.restore() {
            Ok(token) => token,
            Err(e) => {
                log::warn!("stored session unreadable: {}", e);
                None
            }
        };
        if token.is_none() {
            if self.is_current(epoch) {
                self.drop_session();
            }
            return self.state();
        }

        let result = self.client.me().await;
        if !self.is_current(epoch) {
            log::debug!("hydrate superseded by a login or logout");
            return self.state();
        }
        match result {
            Ok(user) => {
                log::info!("session restored for {}", user.username);
                *self.write() = AuthState::Authenticated(user);
            }
            Err(e) => {
                log::warn!("stored session rejected: {}", e);
                self.drop_session();
            }
        }
        self.state()
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        self.begin();
        let request = LoginRequest {
            username: username.trim().to_string(),
            password: password.to_string(),
        };
        let response = self.client.login(&request).await?;

        // Apply in memory before anything else is sent.
        if let Err(e) = self.client.session().set_token(response.token) {
            log::error!("token could not be persisted: {}", e);
        }
        log::info!("logged in as {}", response.user.username);
        *self.write() = AuthState::Authenticated(response.user.clone());
        Ok(response.user)
    }

    /// Best-effort server revoke; the local session is always cleared. A
    /// token that was persisted but never hydrated is revoked too.
    pub async fn logout(&self) {
        self.begin();
        let session = self.client.session();
        if !session.has_token()
            && let Err(e) = session.restore()
        {
            log::warn!("stored session unreadable: {}", e);
        }
        if session.has_token()
            && let Err(e) = self.client.logout().await
        {
            log::warn!("server logout failed, clearing local session anyway: {}", e);
        }
        self.drop_session();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::session::Session;
    use crate::storage::MemoryTokenStore;
    use std::sync::Arc;

    fn offline_auth(token: Option<&str>) -> Auth {
        // Port 9 (discard) is closed on test hosts; every request fails fast.
        let config = Config {
            url: "http://127.0.0.1:9/api".to_string(),
            request_timeout_secs: 2,
            ..Config::default()
        };
        let store = match token {
            Some(t) => MemoryTokenStore::with_token(t),
            None => MemoryTokenStore::new(),
        };
        let session = Arc::new(Session::new(Box::new(store)));
        Auth::new(ApiClient::new(&config, session).unwrap())
    }

    #[tokio::test]
    async fn test_hydrate_without_token_is_unauthenticated() {
        let auth = offline_auth(None);
        assert_eq!(auth.state(), AuthState::Uninitialized);
        assert_eq!(auth.hydrate().await, AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_hydrate_failure_clears_token() {
        let auth = offline_auth(Some("stale"));
        assert_eq!(auth.hydrate().await, AuthState::Unauthenticated);
        assert!(!auth.client().session().has_token());
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_server_unreachable() {
        let auth = offline_auth(Some("tok"));
        auth.client().session().restore().unwrap();
        assert!(auth.client().session().has_token());

        auth.logout().await;
        assert_eq!(auth.state(), AuthState::Unauthenticated);
        assert!(!auth.client().session().has_token());
    }

    #[tokio::test]
    async fn test_login_rejects_blank_credentials_locally() {
        let auth = offline_auth(None);
        let err = auth.login("  ", "").await.unwrap_err();
        assert!(err.field_message("username").is_some());
        assert!(err.field_message("password").is_some());
        assert!(auth.current_user().is_none());
    }
}
