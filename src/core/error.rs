//! Error taxonomy for the gateway
//!
//! Every variant here is caught at the gateway boundary and turned into a
//! fixed reply; none of them reach the chat surface as text.

use std::time::Duration;
use thiserror::Error;

/// Failures talking to the language-model upstream
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream rate limited the request")]
    RateLimited,

    #[error("upstream unavailable (status {0})")]
    Unavailable(u16),

    #[error("upstream call timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream connection refused")]
    ConnectionRefused,

    #[error("upstream rejected credentials (status {0})")]
    Authentication(u16),

    #[error("upstream returned an empty or undecodable response")]
    EmptyResponse,

    #[error("upstream rejected the request (status {status})")]
    Rejected { status: u16 },

    #[error("upstream transport failure: {0}")]
    Transport(String),
}

impl UpstreamError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            UpstreamError::RateLimited
                | UpstreamError::Unavailable(_)
                | UpstreamError::Timeout(_)
                | UpstreamError::ConnectionRefused
        )
    }

    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not expose the configured value; the gateway
            // reports its own deadline instead
            UpstreamError::Timeout(Duration::ZERO)
        } else if err.is_connect() {
            UpstreamError::ConnectionRefused
        } else if err.is_decode() {
            UpstreamError::EmptyResponse
        } else {
            UpstreamError::Transport(err.to_string())
        }
    }

    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            429 => Some(UpstreamError::RateLimited),
            401 | 403 => Some(UpstreamError::Authentication(status)),
            500..=599 => Some(UpstreamError::Unavailable(status)),
            _ => Some(UpstreamError::Rejected { status }),
        }
    }
}

/// Failures of the probabilistic classifier tier
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier not ready")]
    NotReady,

    #[error("classifier request failed: {0}")]
    Request(String),

    #[error("classifier returned no prediction")]
    NoPrediction,
}

/// Failures loading a rules document
#[derive(Debug, Error)]
pub enum RulesError {
    #[error("failed to read rules document: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse rules document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid rules document: {0}")]
    Invalid(String),
}

/// Administrative operation refusals
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    #[error("only the owner may perform administrative actions")]
    Unauthorized,

    #[error("the owner identity cannot be banned")]
    OwnerImmune,

    #[error("ban duration must be at least 1ms and fit in 64-bit milliseconds")]
    InvalidDuration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(UpstreamError::from_status(200).is_none());
        assert!(matches!(UpstreamError::from_status(429), Some(UpstreamError::RateLimited)));
        assert!(matches!(
            UpstreamError::from_status(401),
            Some(UpstreamError::Authentication(401))
        ));
        assert!(matches!(UpstreamError::from_status(503), Some(UpstreamError::Unavailable(503))));
        assert!(matches!(
            UpstreamError::from_status(400),
            Some(UpstreamError::Rejected { status: 400 })
        ));
    }

    #[test]
    fn test_transient_errors() {
        assert!(UpstreamError::RateLimited.is_transient());
        assert!(UpstreamError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!UpstreamError::Authentication(401).is_transient());
        assert!(!UpstreamError::EmptyResponse.is_transient());
    }
}
