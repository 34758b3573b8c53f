//! Error types for peer session control

use std::time::Duration;

/// Result type alias using peerlink Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a peer session
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unrecoverable transport fault reported by the peer layer
    #[error("Transport error: {0}")]
    Transport(String),

    /// Connect handshake with a remote peer failed
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Roster query failed or temporarily yielded no usable peers
    #[error("Roster unavailable: {0}")]
    RosterUnavailable(String),

    /// Transport never reached the online state within the configured wait
    #[error("Timed out after {0:?} waiting for transport to come online")]
    OnlineTimeout(Duration),

    /// An outbound channel send could not be completed
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The session was stopped and its transport released
    #[error("Session is closed")]
    SessionClosed,

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is absorbed by the negotiation loop and retried.
    ///
    /// Recoverable errors send the state machine back to discovery with
    /// backoff. Everything else terminates the session cycle.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Handshake(_)
                | Error::RosterUnavailable(_)
                | Error::OnlineTimeout(_)
                | Error::SendFailed(_)
        )
    }

    /// Check if this error is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidConfig(_))
    }
}
