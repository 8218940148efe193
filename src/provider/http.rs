//! Shared HTTP plumbing: one client per process, every call bounded by the
//! configured timeout, every failure mapped onto [`MediaError`].

use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::MediaError;
use crate::state::HttpConfig;

pub fn build_client(cfg: &HttpConfig) -> Result<Client, MediaError> {
    Client::builder()
        .timeout(cfg.timeout())
        .connect_timeout(cfg.connect_timeout())
        .user_agent(cfg.user_agent.clone())
        .build()
        .map_err(|e| MediaError::Http {
            endpoint: "client".to_string(),
            message: format!("build client: {}", e),
        })
}

pub async fn send(endpoint: &str, request: RequestBuilder) -> Result<Response, MediaError> {
    request
        .send()
        .await
        .map_err(|e| MediaError::from_reqwest(endpoint, e))
}

/// Pass 2xx responses through; anything else becomes a provider error
/// carrying the status and whatever message the body had.
pub async fn expect_success(endpoint: &str, response: Response) -> Result<Response, MediaError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = error_message(status, &text);
    tracing::warn!(endpoint, status = status.as_u16(), "provider error: {}", message);
    Err(MediaError::provider(status.as_u16(), endpoint, message))
}

pub async fn read_json<T: DeserializeOwned>(
    endpoint: &str,
    response: Response,
) -> Result<T, MediaError> {
    let response = expect_success(endpoint, response).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| MediaError::from_reqwest(endpoint, e))?;
    serde_json::from_slice(&bytes).map_err(|e| MediaError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

pub async fn read_text(endpoint: &str, response: Response) -> Result<String, MediaError> {
    let response = expect_success(endpoint, response).await?;
    response
        .text()
        .await
        .map_err(|e| MediaError::from_reqwest(endpoint, e))
}

pub fn accept_json(request: RequestBuilder) -> RequestBuilder {
    request.header(header::ACCEPT, "application/json")
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    /// Web APIs: `{"error": {"status": 404, "message": "..."}}`
    Api { error: ApiErrorDetails },
    /// OAuth endpoints: `{"error": "invalid_grant", "error_description": "..."}`
    OAuth {
        error: String,
        error_description: Option<String>,
    },
}

#[derive(Deserialize)]
struct ApiErrorDetails {
    message: String,
}

/// Pull a readable message out of a provider error body.
pub fn error_message(status: StatusCode, text: &str) -> String {
    match serde_json::from_str::<ErrorBody>(text) {
        Ok(ErrorBody::Api { error }) => error.message,
        Ok(ErrorBody::OAuth {
            error,
            error_description: Some(description),
        }) => format!("{}: {}", error, description),
        Ok(ErrorBody::OAuth { error, .. }) => error,
        Err(_) if !text.trim().is_empty() => text.trim().to_string(),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string(),
    }
}
