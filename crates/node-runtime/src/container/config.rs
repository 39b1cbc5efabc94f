//! # Node Configuration
//!
//! Loaded from a TOML file, then overridden from the environment, then
//! validated.
//!
//! ```toml
//! [channel]
//! name_prefix = "org.peerlink.chat"
//! contact_port = 42
//! multipoint = true
//! traffic = "messages"
//! transports = ["any"]
//! auto_join = true
//!
//! [[peers]]
//! nickname = "alice"
//! host = "lobby"
//! use = "lobby"
//!
//! [[peers]]
//! nickname = "bob"
//! ```
//!
//! ## Environment Overrides
//!
//! - `PEERLINK_CONFIG`: path of the TOML file
//! - `PEERLINK_NAME_PREFIX`
//! - `PEERLINK_CONTACT_PORT`
//! - `PEERLINK_AUTO_JOIN`

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use session_protocol::{ChannelConfig, ProtocolError, DEFAULT_INTERFACE, DEFAULT_MEMBER, DEFAULT_NAME_PREFIX};
use shared_types::entities::{SessionPort, WellKnownName};
use shared_types::session::{Proximity, SessionOptions, TrafficKind, TransportMask};
use thiserror::Error;

/// Environment variable naming the config file.
pub const ENV_CONFIG_PATH: &str = "PEERLINK_CONFIG";
/// Environment override of `channel.name_prefix`.
pub const ENV_NAME_PREFIX: &str = "PEERLINK_NAME_PREFIX";
/// Environment override of `channel.contact_port`.
pub const ENV_CONTACT_PORT: &str = "PEERLINK_CONTACT_PORT";
/// Environment override of `channel.auto_join`.
pub const ENV_AUTO_JOIN: &str = "PEERLINK_AUTO_JOIN";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override could not be parsed.
    #[error("Invalid value for {var}: {value:?}")]
    InvalidOverride {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },

    /// Unknown transport name.
    #[error("Unknown transport: {0}")]
    UnknownTransport(String),

    /// Two peers share a nickname.
    #[error("Duplicate peer nickname: {0}")]
    DuplicateNickname(String),

    /// No peers configured.
    #[error("At least one peer must be configured")]
    NoPeers,

    /// The resulting channel settings are invalid.
    #[error("Invalid channel settings: {0}")]
    Channel(#[from] ProtocolError),
}

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Channel settings shared by every peer.
    pub channel: ChannelSection,
    /// Peers run by this node.
    pub peers: Vec<PeerSection>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            channel: ChannelSection::default(),
            peers: vec![
                PeerSection {
                    nickname: "alice".to_string(),
                    host: Some("lobby".to_string()),
                    use_channel: Some("lobby".to_string()),
                },
                PeerSection::named("bob"),
                PeerSection::named("carol"),
            ],
        }
    }
}

/// `[channel]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSection {
    /// Prefix hosted names are built from and discovered under.
    pub name_prefix: String,
    /// Contact session port.
    pub contact_port: u16,
    /// Multipoint sessions.
    pub multipoint: bool,
    /// Traffic kind.
    pub traffic: TrafficKind,
    /// Transport names: `any`, `local`, `bluetooth`, `wlan`, `wwan`.
    pub transports: Vec<String>,
    /// Join every found channel.
    pub auto_join: bool,
    /// Signal interface of chat messages.
    pub interface: String,
    /// Signal member of chat messages.
    pub member: String,
}

impl Default for ChannelSection {
    fn default() -> Self {
        Self {
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            contact_port: session_protocol::DEFAULT_CONTACT_PORT.get(),
            multipoint: true,
            traffic: TrafficKind::Messages,
            transports: vec!["any".to_string()],
            auto_join: true,
            interface: DEFAULT_INTERFACE.to_string(),
            member: DEFAULT_MEMBER.to_string(),
        }
    }
}

/// `[[peers]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSection {
    /// Name used on stdin (`nickname: text`).
    pub nickname: String,
    /// Instance of the channel this peer hosts, if any.
    #[serde(default)]
    pub host: Option<String>,
    /// Instance of the channel this peer uses at start, if any.
    #[serde(default, rename = "use")]
    pub use_channel: Option<String>,
}

impl PeerSection {
    /// A peer that neither hosts nor uses a channel explicitly.
    pub fn named(nickname: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            host: None,
            use_channel: None,
        }
    }
}

fn parse_transport(name: &str) -> Result<TransportMask, ConfigError> {
    match name.to_ascii_lowercase().as_str() {
        "any" => Ok(TransportMask::ANY),
        "local" => Ok(TransportMask::LOCAL),
        "bluetooth" => Ok(TransportMask::BLUETOOTH),
        "wlan" => Ok(TransportMask::WLAN),
        "wwan" => Ok(TransportMask::WWAN),
        _ => Err(ConfigError::UnknownTransport(name.to_string())),
    }
}

impl ChannelSection {
    /// Combined transport mask.
    pub fn transport_mask(&self) -> Result<TransportMask, ConfigError> {
        self.transports
            .iter()
            .try_fold(TransportMask::NONE, |mask, name| {
                Ok(TransportMask(mask.0 | parse_transport(name)?.0))
            })
    }

    /// Protocol-level channel settings.
    pub fn to_channel_config(&self) -> Result<ChannelConfig, ConfigError> {
        let transports = self.transport_mask()?;
        let config = ChannelConfig {
            name_prefix: self.name_prefix.clone(),
            contact_port: SessionPort::new(self.contact_port),
            session_options: SessionOptions::new(
                self.traffic,
                self.multipoint,
                Proximity::ANY,
                transports,
            ),
            advertise_transports: transports,
            auto_join: self.auto_join,
            interface: self.interface.clone(),
            member: self.member.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}

impl NodeConfig {
    /// Parse a TOML document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Load from `PEERLINK_CONFIG` (or defaults), apply the environment
    /// overrides and validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        let lookup = |var: &str| std::env::var(var).ok();
        let mut config = match lookup(ENV_CONFIG_PATH) {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(prefix) = lookup(ENV_NAME_PREFIX) {
            self.channel.name_prefix = prefix;
        }
        if let Some(value) = lookup(ENV_CONTACT_PORT) {
            self.channel.contact_port =
                value.parse().map_err(|_| ConfigError::InvalidOverride {
                    var: ENV_CONTACT_PORT,
                    value: value.clone(),
                })?;
        }
        if let Some(value) = lookup(ENV_AUTO_JOIN) {
            self.channel.auto_join = match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::InvalidOverride {
                        var: ENV_AUTO_JOIN,
                        value,
                    })
                }
            };
        }
        Ok(())
    }

    /// Check the whole configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let channel = self.channel.to_channel_config()?;
        if self.peers.is_empty() {
            return Err(ConfigError::NoPeers);
        }
        let mut seen = HashSet::new();
        for peer in &self.peers {
            if !seen.insert(peer.nickname.as_str()) {
                return Err(ConfigError::DuplicateNickname(peer.nickname.clone()));
            }
            for instance in peer.host.iter().chain(peer.use_channel.iter()) {
                WellKnownName::from_prefix(&channel.name_prefix, instance)
                    .map_err(ProtocolError::from)?;
            }
        }
        Ok(())
    }
}
