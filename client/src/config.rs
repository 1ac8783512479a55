//! # Client Configuration
//!
//! Network selection and session tuning knobs. The external engine exposes
//! a configuration-builder interface; this module is our side of it, plus
//! the handful of constants the session layer needs.
//!
//! The original deployment pins the test network. Here the network is what
//! it always conceptually was — a configuration option — with the test
//! network as the default.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// How often the session polls the engine for the current block height
/// while connected. 10 seconds keeps the display fresh without nagging
/// the engine.
pub const HEIGHT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Capacity of the recent head-change log. Once full, the oldest record
/// is evicted on every insertion.
pub const RECENT_HEAD_CHANGES_CAPACITY: usize = 10;

/// Default port for the monitor's read-only HTTP API.
pub const DEFAULT_API_PORT: u16 = 8640;

/// Default port for the Prometheus metrics endpoint.
pub const DEFAULT_METRICS_PORT: u16 = 8641;

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// The chain the engine should connect to.
///
/// Identifiers follow the engine's own naming scheme ("albatross" is the
/// consensus family). Unknown strings are rejected rather than guessed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Mainnet. Real money, real consequences.
    #[serde(rename = "mainalbatross")]
    MainAlbatross,
    /// The public test network. Default for this build.
    #[serde(rename = "testalbatross")]
    TestAlbatross,
    /// Local development network.
    #[serde(rename = "devalbatross")]
    DevAlbatross,
}

impl Network {
    /// The identifier string the engine's configuration builder expects.
    pub fn id(&self) -> &'static str {
        match self {
            Network::MainAlbatross => "mainalbatross",
            Network::TestAlbatross => "testalbatross",
            Network::DevAlbatross => "devalbatross",
        }
    }

    /// Parses an engine network identifier. Returns `None` for anything
    /// unrecognized — we don't guess.
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "mainalbatross" => Some(Network::MainAlbatross),
            "testalbatross" => Some(Network::TestAlbatross),
            "devalbatross" => Some(Network::DevAlbatross),
            _ => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// ---------------------------------------------------------------------------
// ClientConfiguration
// ---------------------------------------------------------------------------

/// Configuration handed to the engine connector when a session starts.
///
/// Builder style, mirroring the engine's native configuration object:
///
/// ```
/// use headlight_client::{ClientConfiguration, Network};
///
/// let config = ClientConfiguration::new()
///     .network(Network::TestAlbatross)
///     .build();
/// assert_eq!(config.network, Network::TestAlbatross);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfiguration {
    /// Target network for the engine connection.
    pub network: Network,
    /// Interval between height polls while connected.
    pub poll_interval: Duration,
    /// Capacity of the recent head-change log.
    pub recent_capacity: usize,
}

impl ClientConfiguration {
    /// Starts a configuration builder with the defaults: test network,
    /// 10-second polling, 10 recent head changes.
    pub fn new() -> ClientConfigurationBuilder {
        ClientConfigurationBuilder {
            config: Self::default(),
        }
    }
}

impl Default for ClientConfiguration {
    fn default() -> Self {
        Self {
            network: Network::TestAlbatross,
            poll_interval: HEIGHT_POLL_INTERVAL,
            recent_capacity: RECENT_HEAD_CHANGES_CAPACITY,
        }
    }
}

/// Builder for [`ClientConfiguration`].
#[derive(Debug, Clone)]
pub struct ClientConfigurationBuilder {
    config: ClientConfiguration,
}

impl ClientConfigurationBuilder {
    /// Selects the target network.
    pub fn network(mut self, network: Network) -> Self {
        self.config.network = network;
        self
    }

    /// Overrides the height poll interval. Mostly useful in tests, where
    /// nobody wants to wait 10 real seconds per tick.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Overrides the recent head-change capacity.
    pub fn recent_capacity(mut self, capacity: usize) -> Self {
        self.config.recent_capacity = capacity;
        self
    }

    /// Finalizes the configuration.
    pub fn build(self) -> ClientConfiguration {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_ids_round_trip() {
        for net in [
            Network::MainAlbatross,
            Network::TestAlbatross,
            Network::DevAlbatross,
        ] {
            assert_eq!(Network::from_id(net.id()), Some(net));
        }
    }

    #[test]
    fn unknown_network_id_is_rejected() {
        assert_eq!(Network::from_id("albatross-classic"), None);
        assert_eq!(Network::from_id(""), None);
    }

    #[test]
    fn defaults_match_constants() {
        let config = ClientConfiguration::default();
        assert_eq!(config.network, Network::TestAlbatross);
        assert_eq!(config.poll_interval, HEIGHT_POLL_INTERVAL);
        assert_eq!(config.recent_capacity, RECENT_HEAD_CHANGES_CAPACITY);
    }

    #[test]
    fn builder_overrides_stick() {
        let config = ClientConfiguration::new()
            .network(Network::DevAlbatross)
            .poll_interval(Duration::from_millis(50))
            .recent_capacity(3)
            .build();
        assert_eq!(config.network, Network::DevAlbatross);
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.recent_capacity, 3);
    }

    #[test]
    fn network_serde_uses_engine_ids() {
        let json = serde_json::to_string(&Network::TestAlbatross).unwrap();
        assert_eq!(json, "\"testalbatross\"");
        let back: Network = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Network::TestAlbatross);
    }
}
