// File: src/client.rs
mod address;
mod cert;
mod core;
mod endpoints;

pub use address::{ADDRESS_RETRY_DELAY, AddressBook};
pub use self::core::ApiClient;
