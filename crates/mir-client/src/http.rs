//! [`HttpRemote`] – blocking HTTP implementation of [`RemoteInterface`].
//!
//! # Example
//!
//! ```rust,no_run
//! use mir_client::{Credential, HttpRemote, RemoteInterface};
//!
//! let cred = Credential::new("Basic ZGlzdHJpYnV0b3I6...").unwrap();
//! let remote = HttpRemote::new("http://mir.com/api/v2.0.0/", cred).unwrap();
//!
//! // Requires a reachable robot – skipped in unit tests.
//! // let positions = remote.fetch("positions").unwrap();
//! ```

use std::time::Duration;

use mir_types::MirError;
use reqwest::Method;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use serde_json::Value;
use tracing::debug;

use crate::credentials::Credential;
use crate::remote::{RemoteInterface, body_is_empty, interpret_response};

/// Default API root of a MiR robot on the local network.
pub const DEFAULT_HOST: &str = "http://mir.com/api/v2.0.0/";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking client for one robot's REST API.
///
/// Construct once and reuse; every call blocks for its round-trip and is
/// never retried.
pub struct HttpRemote {
    base_url: String,
    authorization: HeaderValue,
    client: Client,
}

impl HttpRemote {
    /// Create a client for `base_url` with the [`DEFAULT_TIMEOUT`].
    pub fn new(base_url: impl Into<String>, credential: Credential) -> Result<Self, MirError> {
        Self::with_timeout(base_url, credential, DEFAULT_TIMEOUT)
    }

    /// Create a client whose requests give up after `timeout`.
    ///
    /// A credential that cannot be sent as a header value is rejected here
    /// with [`MirError::Configuration`].
    pub fn with_timeout(
        base_url: impl Into<String>,
        credential: Credential,
        timeout: Duration,
    ) -> Result<Self, MirError> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(MirError::Configuration("host URL is empty".to_string()));
        }
        let mut authorization = HeaderValue::from_str(credential.expose()).map_err(|_| {
            MirError::Configuration(
                "authorization token contains characters not allowed in an HTTP header"
                    .to_string(),
            )
        })?;
        authorization.set_sensitive(true);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MirError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url,
            authorization,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, MirError> {
        let mut request = self
            .client
            .request(method.clone(), self.url(path))
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, self.authorization.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().map_err(|e| MirError::Transport {
            path: path.to_string(),
            status: None,
            message: e.to_string(),
        })?;
        let status = response.status().as_u16();
        let text = response.text().map_err(|e| MirError::Transport {
            path: path.to_string(),
            status: Some(status),
            message: e.to_string(),
        })?;
        debug!(%method, path, status, "remote call");

        let had_body = body.is_some_and(|b| !body_is_empty(b));
        interpret_response(path, status, had_body, &text)
    }
}

impl RemoteInterface for HttpRemote {
    fn fetch(&self, path: &str) -> Result<Value, MirError> {
        self.send(Method::GET, path, None)
    }

    fn submit(&self, path: &str, body: &Value) -> Result<Value, MirError> {
        self.send(Method::POST, path, Some(body))
    }

    fn update(&self, path: &str, body: &Value) -> Result<Value, MirError> {
        self.send(Method::PUT, path, Some(body))
    }
}
