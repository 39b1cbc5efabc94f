//! Channel lifecycle and configuration.

use std::fmt;

use serde::{Deserialize, Serialize};
use shared_types::entities::{validate_prefix, SessionPort};
use shared_types::session::{SessionOptions, TransportMask};

use super::errors::ProtocolError;

/// Default discovery / hosting prefix.
pub const DEFAULT_NAME_PREFIX: &str = "org.peerlink.chat";

/// Default contact port.
pub const DEFAULT_CONTACT_PORT: SessionPort = SessionPort(42);

/// Default signal interface for chat payloads.
pub const DEFAULT_INTERFACE: &str = "org.peerlink.chat";

/// Default signal member for chat payloads.
pub const DEFAULT_MEMBER: &str = "Chat";

/// Lifecycle of the logical channel as seen by one peer.
///
/// `Connected` is reached as soon as any session membership exists, which
/// may happen before the hosted name is advertised (or without hosting at
/// all).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    /// Nothing held.
    #[default]
    Idle,
    /// Hosted name owned.
    Named,
    /// Contact port bound.
    Bound,
    /// Hosted name advertised.
    Advertised,
    /// At least one session membership.
    Connected,
}

impl ChannelState {
    /// Derive the state from what the peer currently holds.
    #[must_use]
    pub fn derive(named: bool, bound: bool, advertised: bool, has_sessions: bool) -> Self {
        if has_sessions {
            Self::Connected
        } else if advertised {
            Self::Advertised
        } else if bound {
            Self::Bound
        } else if named {
            Self::Named
        } else {
            Self::Idle
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Named => "named",
            Self::Bound => "bound",
            Self::Advertised => "advertised",
            Self::Connected => "connected",
        };
        f.write_str(label)
    }
}

/// Per-peer channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Prefix hosted names are built from and discovery runs on.
    pub name_prefix: String,
    /// Port hosts bind and joiners join.
    pub contact_port: SessionPort,
    /// Options template for binding and joining.
    pub session_options: SessionOptions,
    /// Transports hosted names are advertised over.
    pub advertise_transports: TransportMask,
    /// Join every found channel automatically.
    pub auto_join: bool,
    /// Signal interface carrying channel payloads.
    pub interface: String,
    /// Signal member carrying channel payloads.
    pub member: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            contact_port: DEFAULT_CONTACT_PORT,
            session_options: SessionOptions::multipoint_messages(),
            advertise_transports: TransportMask::ANY,
            auto_join: true,
            interface: DEFAULT_INTERFACE.to_string(),
            member: DEFAULT_MEMBER.to_string(),
        }
    }
}

impl ChannelConfig {
    /// Check the settings before a coordinator is built from them.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        validate_prefix(&self.name_prefix)?;
        validate_prefix(&self.interface)?;
        if self.contact_port.is_any() {
            return Err(ProtocolError::invalid_state(
                "configure channel",
                "contact port must be a concrete port",
            ));
        }
        if self.member.is_empty() {
            return Err(ProtocolError::invalid_state(
                "configure channel",
                "signal member is empty",
            ));
        }
        if self.advertise_transports.is_empty() || self.session_options.transports.is_empty() {
            return Err(ProtocolError::invalid_state(
                "configure channel",
                "transport mask is empty",
            ));
        }
        Ok(())
    }
}
