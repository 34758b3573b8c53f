//! Configuration types for peer sessions

use serde::{Deserialize, Serialize};

use crate::protocol::PeerRole;
use crate::session::{PeerSelector, RetryPolicy};

/// Main configuration for a [`SessionController`](crate::SessionController)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Hostname or IP of the signaling server
    pub server_address: String,

    /// Port of the signaling server
    pub server_port: u16,

    /// Local peer ID, unique cluster-wide (auto-generated if None)
    pub peer_id: Option<String>,

    /// Role this endpoint advertises to the cluster
    pub role: PeerRole,

    /// URL or path of the media source offered by this endpoint (optional)
    pub media_source: Option<String>,

    /// Format hint for the media source (default: autodetect)
    pub media_source_format: Option<String>,

    /// Opaque value describing the session's payload; re-sent on every
    /// successful (re)connection
    pub metadata: serde_json::Value,

    /// How the counterpart is resolved (default: passive)
    pub selector: PeerSelector,

    /// TLS options for the signaling channel
    pub tls: TlsOptions,

    /// Negotiation timing options
    pub timing: TimingOptions,
}

/// TLS options for the signaling channel
///
/// Certificate verification is on by default; callers opt out explicitly
/// per session rather than through any process-wide context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsOptions {
    /// Skip server certificate validation (default: false)
    pub danger_accept_invalid_certs: bool,
}

/// Timing knobs for the negotiation cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingOptions {
    /// Initial discovery backoff in milliseconds (default: 1000)
    pub discover_backoff_initial_ms: u64,

    /// Maximum discovery backoff in milliseconds (default: 30000)
    pub discover_backoff_max_ms: u64,

    /// Discovery backoff multiplier (default: 2.0)
    pub discover_backoff_multiplier: f64,

    /// Whether discovery backoff adds jitter (default: true)
    pub backoff_jitter_enabled: bool,

    /// Interval between transport readiness polls in milliseconds
    /// (default: 1000)
    pub online_poll_interval_ms: u64,

    /// Maximum wait for the transport to come online before the cycle
    /// retries, in milliseconds (default: 30000)
    pub online_wait_timeout_ms: u64,

    /// Hold time after reaching online before the cycle re-enters
    /// discovery, in milliseconds (default: 1000)
    pub settle_delay_ms: u64,
}

impl Default for TimingOptions {
    fn default() -> Self {
        Self {
            discover_backoff_initial_ms: 1000,
            discover_backoff_max_ms: 30000,
            discover_backoff_multiplier: 2.0,
            backoff_jitter_enabled: true,
            online_poll_interval_ms: 1000,
            online_wait_timeout_ms: 30000,
            settle_delay_ms: 1000,
        }
    }
}

impl TimingOptions {
    /// Build the discovery retry policy described by these options
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            backoff_initial_ms: self.discover_backoff_initial_ms,
            backoff_max_ms: self.discover_backoff_max_ms,
            backoff_multiplier: self.discover_backoff_multiplier,
            jitter_enabled: self.backoff_jitter_enabled,
        }
    }
}

impl SessionConfig {
    /// Create a configuration for the given signaling server and role
    ///
    /// The selector defaults to passive; use [`with_selector`] to target a
    /// specific peer or a role.
    ///
    /// [`with_selector`]: SessionConfig::with_selector
    pub fn new(server_address: &str, server_port: u16, role: PeerRole) -> Self {
        Self {
            server_address: server_address.to_string(),
            server_port,
            peer_id: None,
            role,
            media_source: None,
            media_source_format: None,
            metadata: serde_json::Value::Null,
            selector: PeerSelector::Passive,
            tls: TlsOptions::default(),
            timing: TimingOptions::default(),
        }
    }

    /// Set the local peer ID
    pub fn with_peer_id(mut self, peer_id: &str) -> Self {
        self.peer_id = Some(peer_id.to_string());
        self
    }

    /// Set the counterpart selector
    pub fn with_selector(mut self, selector: PeerSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Set the media source locator and optional format hint
    pub fn with_media_source(mut self, source: &str, format: Option<&str>) -> Self {
        self.media_source = Some(source.to_string());
        self.media_source_format = format.map(str::to_string);
        self
    }

    /// Set the session metadata payload
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Signaling endpoint URL for this configuration
    pub fn signaling_url(&self) -> String {
        format!("wss://{}:{}", self.server_address, self.server_port)
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `server_address` is empty or `server_port` is zero
    /// - `peer_id` is set but empty
    /// - the selector names an empty remote id
    /// - `online_poll_interval_ms` is zero or exceeds `online_wait_timeout_ms`
    /// - `discover_backoff_multiplier` is below 1.0
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if self.server_address.is_empty() {
            return Err(Error::InvalidConfig(
                "server_address must not be empty".to_string(),
            ));
        }

        if self.server_port == 0 {
            return Err(Error::InvalidConfig(
                "server_port must be non-zero".to_string(),
            ));
        }

        if let Some(id) = &self.peer_id {
            if id.is_empty() {
                return Err(Error::InvalidConfig(
                    "peer_id must not be empty when set".to_string(),
                ));
            }
        }

        if let PeerSelector::Explicit { remote_id } = &self.selector {
            if remote_id.is_empty() {
                return Err(Error::InvalidConfig(
                    "explicit remote_id must not be empty".to_string(),
                ));
            }
        }

        if self.timing.online_poll_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "online_poll_interval_ms must be non-zero".to_string(),
            ));
        }

        if self.timing.online_poll_interval_ms > self.timing.online_wait_timeout_ms {
            return Err(Error::InvalidConfig(format!(
                "online_poll_interval_ms ({}) must not exceed online_wait_timeout_ms ({})",
                self.timing.online_poll_interval_ms, self.timing.online_wait_timeout_ms
            )));
        }

        if self.timing.discover_backoff_multiplier < 1.0 {
            return Err(Error::InvalidConfig(format!(
                "discover_backoff_multiplier must be at least 1.0, got {}",
                self.timing.discover_backoff_multiplier
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_config() -> SessionConfig {
        SessionConfig::new("deep.example.org", 8443, PeerRole::Capture)
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_empty_server_address_fails() {
        let mut config = base_config();
        config.server_address.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_port_fails() {
        let mut config = base_config();
        config.server_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_peer_id_fails() {
        let config = base_config().with_peer_id("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_explicit_target_fails() {
        let config = base_config().with_selector(PeerSelector::Explicit {
            remote_id: String::new(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_interval_must_fit_timeout() {
        let mut config = base_config();
        config.timing.online_poll_interval_ms = 60000;
        config.timing.online_wait_timeout_ms = 30000;
        assert!(config.validate().is_err());

        config.timing.online_poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_signaling_url() {
        assert_eq!(base_config().signaling_url(), "wss://deep.example.org:8443");
    }

    #[test]
    fn test_builder_chain() {
        let config = base_config()
            .with_peer_id("cam-7")
            .with_media_source("rtsp://cam/7", Some("rtsp"))
            .with_metadata(json!({"url": "rtsp://cam/7"}))
            .with_selector(PeerSelector::RoleFilter {
                role: PeerRole::Manager,
            });

        assert!(config.validate().is_ok());
        assert_eq!(config.peer_id.as_deref(), Some("cam-7"));
        assert_eq!(config.media_source.as_deref(), Some("rtsp://cam/7"));
        assert_eq!(config.metadata["url"], "rtsp://cam/7");
    }

    #[test]
    fn test_tls_verification_on_by_default() {
        assert!(!base_config().tls.danger_accept_invalid_certs);
    }

    #[test]
    fn test_config_serialization() {
        let config = base_config().with_peer_id("cam-7");
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SessionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.peer_id.as_deref(), Some("cam-7"));
        assert_eq!(parsed.role, PeerRole::Capture);
    }
}
