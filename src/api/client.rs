// file: src/api/client.rs
// version: 1.0.0
// guid: c9e2f5a8-1b4d-4703-86c9-d2e5f8a1b4c7

//! Authenticated HTTP client for the provider webservice

use crate::Result;
use serde_json::Value;
use tracing::debug;

/// Base URL of the provider webservice
pub const WS_URL: &str = "https://robot-ws.your-server.de";

/// HTTP client for the provider API using basic authentication.
///
/// Any non-2xx response is a fatal API error carrying the response body as
/// diagnostic text; there is no retry.
pub struct RobotClient {
    http: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
}

impl RobotClient {
    /// Create a client against the production webservice
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self::with_base_url(WS_URL, user, password)
    }

    /// Create a client against an alternate base URL
    pub fn with_base_url(
        base_url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            user: user.into(),
            password: password.into(),
        }
    }

    /// GET a resource and parse the JSON body
    pub async fn get(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await?;

        self.parse_response(response).await
    }

    /// POST form data to a resource and parse the JSON body
    pub async fn post(&self, path: &str, form: &[(String, String)]) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.user, Some(&self.password))
            .form(form)
            .send()
            .await?;

        self.parse_response(response).await
    }

    async fn parse_response(&self, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response.text().await?;
        debug!("Status code: {}", status);
        debug!("Response: {}", body);

        if !status.is_success() {
            return Err(crate::error::ProvisionError::api(body));
        }

        let value: Value = serde_json::from_str(&body)?;
        Ok(value)
    }
}
