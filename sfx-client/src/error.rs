//! Client-side errors.

use sfx_core::FetchError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
    #[error("Config error: {0}")]
    Config(String),
}

impl From<std::convert::Infallible> for ClientError {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}

impl ClientError {
    /// Attach the endpoint and convert into the data-access error the tree
    /// understands.
    pub fn into_fetch_error(self, endpoint: &str) -> FetchError {
        let endpoint = endpoint.to_string();
        match self {
            ClientError::Http(e) if e.is_timeout() => FetchError::Timeout { endpoint },
            ClientError::Http(e) if e.is_decode() => FetchError::InvalidPayload {
                endpoint,
                reason: e.to_string(),
            },
            ClientError::Http(e) => FetchError::Transport {
                endpoint,
                reason: e.to_string(),
            },
            ClientError::Serde(e) => FetchError::InvalidPayload {
                endpoint,
                reason: e.to_string(),
            },
            ClientError::InvalidResponse(reason) => FetchError::InvalidPayload { endpoint, reason },
            ClientError::Status { status, message } => FetchError::Status {
                endpoint,
                status,
                message,
            },
            ClientError::Config(reason) => FetchError::Other(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_maps_to_fetch_status() {
        let err = ClientError::Status {
            status: 404,
            message: "FABRIC_E_APPLICATION_NOT_FOUND: Application not found".to_string(),
        };
        assert_eq!(
            err.into_fetch_error("/Applications/App/$/GetServices"),
            FetchError::Status {
                endpoint: "/Applications/App/$/GetServices".to_string(),
                status: 404,
                message: "FABRIC_E_APPLICATION_NOT_FOUND: Application not found".to_string(),
            }
        );
    }

    #[test]
    fn test_bad_json_maps_to_invalid_payload() {
        let serde_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = ClientError::from(serde_err).into_fetch_error("/Nodes");
        assert!(matches!(err, FetchError::InvalidPayload { endpoint, .. } if endpoint == "/Nodes"));
    }
}
