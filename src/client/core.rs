// File: src/client/core.rs

use crate::client::cert::NoVerifier;
use crate::config::Config;
use crate::error::{ApiError, FieldErrors, Result};
use crate::model::page::Envelope;
use crate::session::Session;

use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{Method, Request, StatusCode, Uri};
use http_body_util::BodyExt;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

type HttpsClient = Client<
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>,
    String,
>;

/// Laravel error body: `{"message": "...", "errors": {"field": ["..."]}}`.
#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: FieldErrors,
}

fn describe(e: &dyn std::error::Error) -> String {
    let mut out = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}

/// JSON client for the lab back-office API. Cheap to clone; clones share the
/// connection pool and the session.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: HttpsClient,
    base_url: String,
    session: Arc<Session>,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &Config, session: Arc<Session>) -> Result<Self> {
        let base_url = config.url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ApiError::Config("No server URL configured".to_string()));
        }
        let uri: Uri = base_url.parse().map_err(|e: http::uri::InvalidUri| {
            ApiError::Config(format!("Invalid server URL '{}': {}", base_url, e))
        })?;
        let scheme = uri.scheme_str();
        if !matches!(scheme, Some("http") | Some("https")) {
            return Err(ApiError::Config(format!(
                "Server URL must start with http:// or https://: {}",
                base_url
            )));
        }

        let tls_config = if config.allow_insecure_certs {
            log::warn!("TLS certificate verification is disabled for {}", base_url);
            rustls::ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerifier))
                .with_no_client_auth()
        } else {
            let mut root_store = rustls::RootCertStore::empty();
            let result = rustls_native_certs::load_native_certs();
            root_store.add_parsable_certificates(result.certs);
            if root_store.is_empty() && scheme == Some("https") {
                return Err(ApiError::Config(
                    "No valid system certificates found.".to_string(),
                ));
            }
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth()
        };

        let https_connector = HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .build();
        let http = Client::builder(TokioExecutor::new()).build(https_connector);

        Ok(Self {
            http,
            base_url,
            session,
            timeout: config.request_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    // --- REQUEST PLUMBING ---

    /// The bearer token is read from the session here, so a token set or
    /// cleared before this call applies to this request.
    fn build(&self, method: Method, path: &str, body: Option<String>) -> Result<Request<String>> {
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("{}{}", self.base_url, path))
            .header(ACCEPT, "application/json");
        if body.is_some() {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        if let Some(token) = self.session.token() {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        builder
            .body(body.unwrap_or_default())
            .map_err(|e| ApiError::Config(format!("Invalid request for {}: {}", path, e)))
    }

    async fn execute(&self, req: Request<String>) -> Result<(StatusCode, Vec<u8>)> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let roundtrip = async {
            let response = self
                .http
                .request(req)
                .await
                .map_err(|e| ApiError::Network(describe(&e)))?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| ApiError::Network(describe(&e)))?
                .to_bytes();
            Ok::<_, ApiError>((status, body.to_vec()))
        };

        let result = tokio::time::timeout(self.timeout, roundtrip)
            .await
            .map_err(|_| {
                ApiError::Network(format!(
                    "{} {} timed out after {}s",
                    method,
                    path,
                    self.timeout.as_secs()
                ))
            })?;

        match &result {
            Ok((status, _)) => log::debug!("{} {} -> {}", method, path, status),
            Err(e) => log::warn!("{} {} failed: {}", method, path, e),
        }
        result
    }

    fn check_status(status: StatusCode, body: &[u8]) -> Result<()> {
        if status.is_success() {
            return Ok(());
        }
        let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            StatusCode::UNPROCESSABLE_ENTITY => Err(ApiError::Validation {
                message: parsed
                    .message
                    .unwrap_or_else(|| "The given data was invalid.".to_string()),
                fields: parsed.errors,
            }),
            _ => Err(ApiError::Server {
                status: status.as_u16(),
                message: parsed.message.unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Request failed")
                        .to_string()
                }),
            }),
        }
    }

    async fn send_raw(&self, method: Method, path: &str, body: Option<String>) -> Result<Vec<u8>> {
        let req = self.build(method, path, body)?;
        let (status, bytes) = self.execute(req).await?;
        Self::check_status(status, &bytes)?;
        Ok(bytes)
    }

    pub(crate) async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<T> {
        let bytes = self.send_raw(method, path, body).await?;
        serde_json::from_slice::<Envelope<T>>(&bytes)
            .map(Envelope::into_inner)
            .map_err(|e| ApiError::Decode(format!("{}: {}", path, e)))
    }

    /// Sends and ignores the response body.
    pub(crate) async fn send_discarding(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<()> {
        self.send_raw(method, path, body).await.map(|_| ())
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(Method::GET, path, None).await
    }

    pub(crate) async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let json = serde_json::to_string(body)?;
        self.send(Method::POST, path, Some(json)).await
    }

    pub(crate) async fn put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let json = serde_json::to_string(body)?;
        self.send(Method::PUT, path, Some(json)).await
    }

    /// POST without a body, for toggle-style actions.
    pub(crate) async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(Method::POST, path, None).await
    }
}
