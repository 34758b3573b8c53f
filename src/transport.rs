//! Peer transport abstraction
//!
//! The session controller drives an external peer library (signaling,
//! discovery, ICE/DTLS, media) through this narrow seam. Implementations
//! wrap a concrete SDK; tests use a scripted double.

use async_trait::async_trait;
use bytes::Bytes;

use crate::protocol::{ChannelMessage, RosterEntry};
use crate::Result;

/// Readiness of the underlying transport channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerReadyState {
    /// Transport handle exists but no connection attempt is in flight
    New,
    /// Connection negotiation in progress
    Connecting,
    /// Channel is established and usable
    Online,
    /// Transport has been torn down
    Closed,
}

/// A decoded media frame delivered by the transport
#[derive(Debug, Clone)]
pub struct MediaFrame {
    /// Capture timestamp in microseconds
    pub timestamp_us: u64,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Decoded pixel data
    pub data: Bytes,
}

/// Inbound events surfaced by the transport
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// An application-data message arrived on the data channel
    Data(serde_json::Value),
    /// A decoded media frame arrived
    Frame(MediaFrame),
    /// The transport was closed and no further events will arrive
    Closed,
}

/// Capability set the session controller consumes from the peer layer
///
/// Methods take `&self`; implementations are expected to use interior
/// mutability so the negotiation loop and the inbound event pump can share
/// one handle. Exactly one transport handle exists per session.
#[async_trait]
pub trait PeerTransport: Send + Sync + 'static {
    /// Open the secure channel to the signaling endpoint
    async fn open(&self) -> Result<()>;

    /// Initiate a connection to a specific remote peer
    async fn connect_to(&self, remote_id: &str) -> Result<()>;

    /// Block until a remote peer requests a connection, returning its id
    async fn listen_connections(&self) -> Result<String>;

    /// Accept the pending inbound connection request
    async fn accept_connection(&self) -> Result<()>;

    /// Fetch the live peer roster from the signaling endpoint
    async fn get_peers(&self) -> Result<Vec<RosterEntry>>;

    /// Send a tagged message to the currently connected peer
    async fn send(&self, message: ChannelMessage) -> Result<()>;

    /// Current readiness of the channel
    async fn ready_state(&self) -> PeerReadyState;

    /// Wait for the next inbound event
    ///
    /// Returns [`TransportEvent::Closed`] once the transport is torn down.
    async fn next_event(&self) -> Result<TransportEvent>;

    /// Tear down the transport; must be idempotent
    async fn close(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_state_equality() {
        assert_eq!(PeerReadyState::Online, PeerReadyState::Online);
        assert_ne!(PeerReadyState::Online, PeerReadyState::Connecting);
    }

    #[test]
    fn test_media_frame_is_cheap_to_clone() {
        let frame = MediaFrame {
            timestamp_us: 42,
            width: 640,
            height: 480,
            data: Bytes::from_static(b"pixels"),
        };
        let clone = frame.clone();
        assert_eq!(clone.timestamp_us, 42);
        assert_eq!(clone.data, frame.data);
    }
}
