//! Connection state machine and peer targeting modes

use serde::{Deserialize, Serialize};

use crate::protocol::PeerRole;

/// State of the session's negotiation cycle
///
/// `Online` is a transient checkpoint, not a terminal state: after the
/// settle delay the cycle returns to `Discovering` so the endpoint stays
/// available for new counterparts. One session therefore represents a
/// sequence of connections over its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Session created, transport not yet opened
    Idle,
    /// Resolving a counterpart (roster query, inbound wait, or immediate)
    Discovering,
    /// Connect handshake with a resolved remote peer in progress
    Connecting,
    /// Handshake done, waiting for the transport to report online
    AwaitingOnline,
    /// Channel established; holding for the settle interval
    Online,
    /// Teardown requested
    Closing,
    /// Transport released, session finished cleanly
    Closed,
    /// Unrecoverable transport fault terminated the cycle
    Failed,
}

impl ConnectionState {
    /// Check if the session has finished and will not negotiate again
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Failed)
    }

    /// Check if a remote peer id may be associated in this state
    pub fn allows_remote(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::AwaitingOnline | ConnectionState::Online
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Discovering => "discovering",
            ConnectionState::Connecting => "connecting",
            ConnectionState::AwaitingOnline => "awaiting-online",
            ConnectionState::Online => "online",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How the session resolves its counterpart, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PeerSelector {
    /// Connect directly to a known remote identifier
    Explicit {
        /// Remote peer id to connect to
        remote_id: String,
    },

    /// Connect to the first available, non-busy peer advertising a role
    RoleFilter {
        /// Role the counterpart must advertise
        role: PeerRole,
    },

    /// Wait for an inbound connection request
    Passive,
}

impl PeerSelector {
    /// Check if this selector waits for inbound connections
    pub fn is_passive(&self) -> bool {
        matches!(self, PeerSelector::Passive)
    }
}
