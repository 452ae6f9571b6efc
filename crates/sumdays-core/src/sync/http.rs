//! HTTP implementation of the sync gateway

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use super::gateway::{GatewayError, SyncGateway};
use super::payload::{PushAck, PushPayload, RemoteSnapshot};
use crate::auth::SessionStore;
use crate::error::{Error, Result};
use crate::util::{compact_text, is_http_url, normalize_text_option};

/// Path of the sync endpoint below the API base URL
pub const SYNC_PATH: &str = "/api/db/sync";

/// Talks to `POST|GET {base}/api/db/sync` with the stored bearer token
pub struct HttpSyncGateway<S: SessionStore> {
    endpoint: String,
    client: Client,
    sessions: S,
}

impl<S: SessionStore> HttpSyncGateway<S> {
    pub fn new(base_url: impl Into<String>, timeout: Duration, sessions: S) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            endpoint: format!("{base_url}{SYNC_PATH}"),
            client,
            sessions,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub const fn sessions(&self) -> &S {
        &self.sessions
    }

    async fn checked(response: Response) -> std::result::Result<String, GatewayError> {
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(GatewayError::Status {
                code: status.as_u16(),
                message: parse_api_error(status, &body),
            })
        }
    }
}

#[async_trait]
impl<S: SessionStore> SyncGateway for HttpSyncGateway<S> {
    async fn access_token(&self) -> Option<String> {
        match self.sessions.load_session() {
            Ok(session) => session.map(|session| session.token),
            Err(error) => {
                tracing::warn!("Failed to load session: {}", error);
                None
            }
        }
    }

    async fn push(
        &self,
        token: &str,
        payload: &PushPayload,
    ) -> std::result::Result<PushAck, GatewayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;

        let body = Self::checked(response).await?;
        serde_json::from_str(&body).map_err(|error| GatewayError::Data(error.to_string()))
    }

    async fn fetch_snapshot(
        &self,
        token: &str,
    ) -> std::result::Result<Option<RemoteSnapshot>, GatewayError> {
        let response = self
            .client
            .get(&self.endpoint)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        let body = Self::checked(response).await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&body).map_err(|error| GatewayError::Data(error.to_string()))
    }
}

fn transport_error(error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Network(format!("request timed out: {error}"))
    } else {
        GatewayError::Network(error.to_string())
    }
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

fn normalize_base_url(raw: String) -> Result<String> {
    let base_url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::Config("API base URL must not be empty".to_string()))?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(
            "API base URL must include http:// or https://".to_string(),
        ))
    }
}
