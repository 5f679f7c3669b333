#![allow(dead_code)]

use labdesk::LabDesk;
use labdesk::client::ApiClient;
use labdesk::config::Config;
use labdesk::session::{Session, TokenStore};
use labdesk::storage::MemoryTokenStore;
use mockito::ServerGuard;
use std::sync::Arc;

pub const USER_JSON: &str =
    r#"{"id": 1, "name": "Maria Santos", "username": "maria", "role": "cashier"}"#;

pub fn config_for(server: &ServerGuard) -> Config {
    Config {
        url: format!("{}/api", server.url()),
        request_timeout_secs: 5,
        ..Config::default()
    }
}

pub fn desk_with(server: &ServerGuard, store: Box<dyn TokenStore>) -> LabDesk {
    LabDesk::with_cache(config_for(server), store, None).unwrap()
}

pub fn desk(server: &ServerGuard) -> LabDesk {
    desk_with(server, Box::new(MemoryTokenStore::new()))
}

/// A client whose session already holds `token`.
pub fn client_with_token(server: &ServerGuard, token: &str) -> ApiClient {
    let session = Arc::new(Session::new(Box::new(MemoryTokenStore::with_token(token))));
    session.restore().unwrap();
    ApiClient::new(&config_for(server), session).unwrap()
}

pub fn reconciliation_json(id: u64, expected: &str, actual: &str, variance: &str, status: &str) -> String {
    format!(
        r#"{{"id": {id}, "date": "2026-10-19", "expected_cash": "{expected}", "actual_cash": "{actual}",
            "variance": "{variance}", "status": "{status}", "transaction_count": 14,
            "cashier": {{"id": 1, "name": "Maria Santos"}}}}"#
    )
}
