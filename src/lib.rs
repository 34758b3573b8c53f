//! Resilient peer session controller
//!
//! This crate keeps one logical session to a remote counterpart alive over
//! an external peer/data-channel library: it drives discovery, connect
//! handshakes, role negotiation and metadata exchange, and restarts the
//! cycle after every disconnection. The hard transport work (media capture,
//! codec negotiation, ICE/DTLS, signaling) belongs to the peer layer, which
//! is consumed through the narrow [`PeerTransport`] trait.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  Owning application                                  │
//! │  ↓ open / run / stop / send_metadata / handlers      │
//! │  SessionController                                   │
//! │  ├─ negotiation loop (Discovering → Connecting →     │
//! │  │   AwaitingOnline → Online → Discovering …)        │
//! │  ├─ HandlerRegistry (ordered data/frame fan-out)     │
//! │  └─ event pump (acknowledge, then deliver)           │
//! │     ↓                                                │
//! │  PeerTransport (external peer SDK behind a trait)    │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use peerlink::{PeerRole, PeerSelector, SessionConfig};
//!
//! let config = SessionConfig::new("deep.example.org", 8443, PeerRole::Capture)
//!     .with_peer_id("cam-7")
//!     .with_metadata(serde_json::json!({"url": "rtsp://cam/7"}))
//!     .with_selector(PeerSelector::RoleFilter {
//!         role: PeerRole::Manager,
//!     });
//!
//! assert!(config.validate().is_ok());
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-exports for public API
pub use config::{SessionConfig, TimingOptions, TlsOptions};
pub use error::{Error, Result};
pub use protocol::{ChannelMessage, PeerRole, RosterEntry};
pub use session::{
    ConnectionState, DataHandler, FrameHandler, PeerSelector, PendingSend, RetryPolicy,
    SessionController,
};
pub use transport::{MediaFrame, PeerReadyState, PeerTransport, TransportEvent};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
