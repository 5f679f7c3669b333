// File: src/error.rs
use std::collections::BTreeMap;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Per-field messages, keyed by the request field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Server-side (HTTP 422) or local form validation.
    #[error("{message}")]
    Validation {
        message: String,
        fields: FieldErrors,
    },

    /// HTTP 401. The token is missing, expired or revoked.
    #[error("Unauthenticated")]
    Unauthorized,

    /// Connection, TLS or timeout failure.
    #[error("Connection failed: {0}")]
    Network(String),

    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },

    /// The body did not match the expected schema.
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// The body decoded but breaks a record invariant.
    #[error("Inconsistent record: {0}")]
    Contract(String),

    #[error("Please enter a valid cash amount")]
    InvalidCashAmount,

    #[error("A submission is already in progress")]
    Busy,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ApiError {
    /// Single-field validation error, shaped like a Laravel 422 body.
    pub fn invalid(field: &str, message: &str) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.to_string(), vec![message.to_string()]);
        ApiError::Validation {
            message: message.to_string(),
            fields,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// First message for a field, if the error carries one.
    pub fn field_message(&self, field: &str) -> Option<&str> {
        match self {
            ApiError::Validation { fields, .. } => fields
                .get(field)
                .and_then(|msgs| msgs.first())
                .map(String::as_str),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}

/// Collects field errors from form validation and turns them into one error.
#[derive(Debug, Default)]
pub struct Validator {
    fields: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(&mut self, field: &str, value: &str, label: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.add(field, format!("The {} field is required.", label));
        }
        self
    }

    pub fn check(&mut self, ok: bool, field: &str, message: impl Into<String>) -> &mut Self {
        if !ok {
            self.add(field, message.into());
        }
        self
    }

    fn add(&mut self, field: &str, message: String) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message);
    }

    pub fn finish(&mut self) -> Result<()> {
        if self.fields.is_empty() {
            return Ok(());
        }
        let fields = std::mem::take(&mut self.fields);
        let message = fields
            .values()
            .flatten()
            .next()
            .cloned()
            .unwrap_or_else(|| "The given data was invalid.".to_string());
        Err(ApiError::Validation { message, fields })
    }
}
