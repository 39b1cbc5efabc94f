//! # Session Options
//!
//! The immutable options value attached to every port binding and join
//! request. Bit values match the ones used on the wire by the bus runtime.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How data moves between session endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrafficKind {
    /// Reliable, message-based traffic.
    #[default]
    Messages,
    /// Unreliable raw socket traffic (no message encapsulation).
    RawUnreliable,
    /// Reliable raw socket traffic (no message encapsulation).
    RawReliable,
}

impl TrafficKind {
    /// Wire bit for this traffic kind.
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::Messages => 0x01,
            Self::RawUnreliable => 0x02,
            Self::RawReliable => 0x04,
        }
    }

    /// Decode a wire bit.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0x01 => Some(Self::Messages),
            0x02 => Some(Self::RawUnreliable),
            0x04 => Some(Self::RawReliable),
            _ => None,
        }
    }
}

/// Spatial scope a session may be joined from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Proximity(pub u8);

impl Proximity {
    /// Joiners may be anywhere.
    pub const ANY: Proximity = Proximity(0xff);
    /// Joiners must be on the same physical machine.
    pub const PHYSICAL: Proximity = Proximity(0x01);
    /// Joiners must be on the local network segment.
    pub const NETWORK: Proximity = Proximity(0x02);

    /// Whether two proximity scopes overlap.
    #[must_use]
    pub const fn intersects(self, other: Proximity) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for Proximity {
    fn default() -> Self {
        Self::ANY
    }
}

/// Bit mask of transports a session or advertisement may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransportMask(pub u16);

impl TransportMask {
    /// No transport.
    pub const NONE: TransportMask = TransportMask(0x0000);
    /// Any available transport.
    pub const ANY: TransportMask = TransportMask(0xffff);
    /// The local (in-process / same host) transport.
    pub const LOCAL: TransportMask = TransportMask(0x0001);
    /// Bluetooth.
    pub const BLUETOOTH: TransportMask = TransportMask(0x0002);
    /// Wireless LAN.
    pub const WLAN: TransportMask = TransportMask(0x0004);
    /// Wide-area wireless.
    pub const WWAN: TransportMask = TransportMask(0x0008);

    /// Whether two masks share at least one transport.
    #[must_use]
    pub const fn intersects(self, other: TransportMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Transports present in both masks.
    #[must_use]
    pub const fn intersection(self, other: TransportMask) -> TransportMask {
        TransportMask(self.0 & other.0)
    }

    /// Whether the mask selects nothing.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for TransportMask {
    fn default() -> Self {
        Self::ANY
    }
}

impl fmt::Display for TransportMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Options of a session port binding or join request.
///
/// Defaults to reliable messages, point-to-point, any proximity, any
/// transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct SessionOptions {
    /// Traffic kind.
    pub traffic: TrafficKind,
    /// Whether more than two peers may share one session.
    pub multipoint: bool,
    /// Spatial scope.
    pub proximity: Proximity,
    /// Allowed transports.
    pub transports: TransportMask,
}

impl SessionOptions {
    /// Create options from explicit values.
    #[must_use]
    pub const fn new(
        traffic: TrafficKind,
        multipoint: bool,
        proximity: Proximity,
        transports: TransportMask,
    ) -> Self {
        Self {
            traffic,
            multipoint,
            proximity,
            transports,
        }
    }

    /// Reliable multipoint messaging over any transport, the template used
    /// by group chat channels.
    #[must_use]
    pub const fn multipoint_messages() -> Self {
        Self::new(
            TrafficKind::Messages,
            true,
            Proximity::ANY,
            TransportMask::ANY,
        )
    }

    /// Whether a join request with `self` can be admitted on a port bound
    /// with `other`.
    ///
    /// Traffic kind and multipoint flag must match; proximity and transports
    /// must overlap.
    #[must_use]
    pub fn is_compatible(&self, other: &SessionOptions) -> bool {
        self.traffic == other.traffic
            && self.multipoint == other.multipoint
            && self.proximity.intersects(other.proximity)
            && self.transports.intersects(other.transports)
    }
}

impl fmt::Display for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "traffic={:?} multipoint={} proximity={:#04x} transports={}",
            self.traffic, self.multipoint, self.proximity.0, self.transports
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = SessionOptions::default();
        assert_eq!(opts.traffic, TrafficKind::Messages);
        assert!(!opts.multipoint);
        assert_eq!(opts.proximity, Proximity::ANY);
        assert_eq!(opts.transports, TransportMask::ANY);
    }

    #[test]
    fn test_traffic_bits() {
        for kind in [
            TrafficKind::Messages,
            TrafficKind::RawUnreliable,
            TrafficKind::RawReliable,
        ] {
            assert_eq!(TrafficKind::from_bits(kind.bits()), Some(kind));
        }
        assert_eq!(TrafficKind::from_bits(0x08), None);
    }

    #[test]
    fn test_compatibility_requires_matching_traffic_and_multipoint() {
        let host = SessionOptions::multipoint_messages();
        assert!(host.is_compatible(&host));

        let raw = SessionOptions {
            traffic: TrafficKind::RawReliable,
            ..host
        };
        assert!(!raw.is_compatible(&host));

        let p2p = SessionOptions {
            multipoint: false,
            ..host
        };
        assert!(!p2p.is_compatible(&host));
    }

    #[test]
    fn test_compatibility_requires_overlap() {
        let host = SessionOptions {
            transports: TransportMask::BLUETOOTH,
            ..SessionOptions::multipoint_messages()
        };
        let wlan_only = SessionOptions {
            transports: TransportMask::WLAN,
            ..host
        };
        assert!(!wlan_only.is_compatible(&host));

        let physical = SessionOptions {
            proximity: Proximity::PHYSICAL,
            ..host
        };
        let network = SessionOptions {
            proximity: Proximity::NETWORK,
            ..host
        };
        assert!(!physical.is_compatible(&network));
        assert!(physical.is_compatible(&host));
    }
}
