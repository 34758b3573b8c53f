//! Tagged channel message types and roster entries
//!
//! The session controller adds a thin JSON protocol on top of the peer
//! transport's data channel: `metadata`, `source` and `acknowledge` messages
//! are produced by the controller, `data` messages are consumed and trigger
//! the acknowledge reply.

use serde::{Deserialize, Serialize};

/// Role a peer advertises to the rest of the cluster.
///
/// Wire names are fixed (`stream_capture` / `stream_manager`); anything else
/// on the roster is carried through as [`PeerRole::Other`] so unknown peer
/// types never break roster parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PeerRole {
    /// Endpoint that offers a media/data source
    Capture,
    /// Endpoint that consumes and manages sources
    Manager,
    /// Unrecognized role tag, preserved verbatim
    Other(String),
}

impl PeerRole {
    /// Wire representation of this role
    pub fn as_str(&self) -> &str {
        match self {
            PeerRole::Capture => "stream_capture",
            PeerRole::Manager => "stream_manager",
            PeerRole::Other(s) => s,
        }
    }
}

impl From<String> for PeerRole {
    fn from(s: String) -> Self {
        match s.as_str() {
            "stream_capture" => PeerRole::Capture,
            "stream_manager" => PeerRole::Manager,
            _ => PeerRole::Other(s),
        }
    }
}

impl From<PeerRole> for String {
    fn from(role: PeerRole) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for PeerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the live peer roster returned by the transport
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RosterEntry {
    /// Unique peer identifier
    pub id: String,

    /// Advertised role (wire field name is `type`)
    #[serde(rename = "type")]
    pub role: PeerRole,

    /// Whether the peer is already paired with a counterpart
    pub busy: bool,
}

/// Messages the session controller sends over the data channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelMessage {
    /// Acknowledge receipt of an inbound `data` message
    ///
    /// `rec_time` echoes the receipt timestamp of the original message so
    /// the counterpart can correlate the acknowledgment.
    Acknowledge {
        /// Receipt timestamp copied from the acknowledged message
        rec_time: serde_json::Value,
    },

    /// Describe this session's payload to the connected peer
    Metadata {
        /// Opaque metadata value (string or structured record)
        metadata: serde_json::Value,
    },

    /// Announce this peer as a source after a role-filter connect
    Source {
        /// Local peer identifier
        #[serde(rename = "peerId")]
        peer_id: String,
    },
}

impl ChannelMessage {
    /// Build an acknowledge reply echoing the given receipt timestamp
    pub fn acknowledge(rec_time: serde_json::Value) -> Self {
        ChannelMessage::Acknowledge { rec_time }
    }

    /// Build a metadata message
    pub fn metadata(metadata: serde_json::Value) -> Self {
        ChannelMessage::Metadata { metadata }
    }

    /// Build a source announcement
    pub fn source(peer_id: impl Into<String>) -> Self {
        ChannelMessage::Source {
            peer_id: peer_id.into(),
        }
    }

    /// Convert message to JSON string
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| {
            crate::Error::Serialization(format!("Failed to serialize channel message: {}", e))
        })
    }

    /// Parse message from JSON string
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            crate::Error::Serialization(format!("Failed to deserialize channel message: {}", e))
        })
    }

    /// Get the wire tag of this message
    pub fn tag(&self) -> &'static str {
        match self {
            ChannelMessage::Acknowledge { .. } => "acknowledge",
            ChannelMessage::Metadata { .. } => "metadata",
            ChannelMessage::Source { .. } => "source",
        }
    }
}

/// Wire tag of inbound messages that must be acknowledged
pub const DATA_TAG: &str = "data";

/// Check whether an inbound data-channel value is a `data`-tagged message
pub fn is_data_message(value: &serde_json::Value) -> bool {
    value.get("type").and_then(serde_json::Value::as_str) == Some(DATA_TAG)
}
