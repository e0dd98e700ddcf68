//! HTTP client for the remote ledger service.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::PendingChange;
use crate::util::{compact_text, is_http_url, normalize_text_option};

use super::remote::{PushOutcome, RemoteSnapshot, RemoteStore};

#[derive(Clone)]
pub struct HttpRemoteStore {
    endpoint: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemoteStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemoteStore")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpRemoteStore {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Result<Self> {
        let endpoint = normalize_endpoint(endpoint.into())?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|error| Error::InvalidInput(format!("HTTP client: {error}")))?;
        Ok(Self {
            endpoint,
            token: normalize_text_option(token),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn profile_url(&self, profile_id: &str, resource: &str) -> String {
        format!(
            "{}/v1/profiles/{}/{resource}",
            self.endpoint,
            urlencoding::encode(profile_id)
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("Accept", "application/json");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::NotAuthenticated);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteUnavailable(parse_api_error(status, &body)));
        }
        response.json::<T>().await.map_err(transport_error)
    }
}

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    changes: &'a [PendingChange],
}

impl RemoteStore for HttpRemoteStore {
    async fn fetch_state(&self, profile_id: &str) -> Result<RemoteSnapshot> {
        let url = self.profile_url(profile_id, "state");
        tracing::debug!(%url, "Fetching remote state");
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(transport_error)?;
        Self::read_json(response).await
    }

    async fn push_changes(&self, profile_id: &str, changes: &[PendingChange]) -> Result<PushOutcome> {
        let url = self.profile_url(profile_id, "changes");
        tracing::debug!(%url, changes = changes.len(), "Pushing pending changes");
        let response = self
            .authorize(self.client.post(&url))
            .json(&PushRequest { changes })
            .send()
            .await
            .map_err(transport_error)?;
        Self::read_json(response).await
    }
}

#[allow(clippy::needless_pass_by_value)]
fn transport_error(error: reqwest::Error) -> Error {
    Error::RemoteUnavailable(error.to_string())
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", compact_text(&message), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_endpoint(raw: String) -> Result<String> {
    let endpoint = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::InvalidInput("remote endpoint must not be empty".to_string()))?;
    if is_http_url(&endpoint) {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(
            "remote endpoint must include http:// or https://".to_string(),
        ))
    }
}
