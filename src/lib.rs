// File: src/lib.rs
pub mod app;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod paths;
pub mod session;
pub mod storage;
pub mod store;

pub use app::{LabDesk, ListFeed, LoadOutcome};
pub use auth::AuthState;
pub use error::{ApiError, Result};

// --- MOBILE SUPPORT ---
#[cfg(feature = "mobile")]
pub mod mobile;

#[cfg(feature = "mobile")]
uniffi::setup_scaffolding!();
