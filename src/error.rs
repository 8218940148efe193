use thiserror::Error;

/// Failures surfaced by the media resolution layer.
///
/// Link parse failures and preview scrape misses are not errors; they come
/// back as `None`. Everything here reaches the caller, who decides what the
/// user sees. The type is `Clone` so one failed token refresh can be handed to
/// every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("{endpoint} returned {status_code}: {message}")]
    Provider {
        status_code: u16,
        endpoint: String,
        message: String,
    },
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },
    #[error("http error calling {endpoint}: {message}")]
    Http { endpoint: String, message: String },
    #[error("failed to decode {endpoint} response: {message}")]
    Decode { endpoint: String, message: String },
    #[error("credential storage error: {0}")]
    Storage(String),
    #[error("no {0} provider configured")]
    NotConfigured(String),
}

impl MediaError {
    pub fn provider(status_code: u16, endpoint: &str, message: impl Into<String>) -> Self {
        MediaError::Provider {
            status_code,
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    /// Classify a transport error from `reqwest` against the endpoint it hit.
    pub fn from_reqwest(endpoint: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            MediaError::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else if e.is_decode() {
            MediaError::Decode {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            }
        } else {
            MediaError::Http {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            }
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            MediaError::Provider { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, MediaError::Auth(_))
    }
}

impl From<anyhow::Error> for MediaError {
    fn from(e: anyhow::Error) -> Self {
        MediaError::Storage(format!("{:#}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = MediaError::provider(404, "youtube/videos", "Video not found or is private");
        assert_eq!(
            err.to_string(),
            "youtube/videos returned 404: Video not found or is private"
        );
        assert_eq!(err.status_code(), Some(404));
        assert!(!err.is_auth());
    }

    #[test]
    fn test_auth_error_has_no_status() {
        let err = MediaError::Auth("token rejected twice".to_string());
        assert_eq!(err.status_code(), None);
        assert!(err.is_auth());
    }
}
