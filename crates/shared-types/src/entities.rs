//! # Core Identity Entities
//!
//! Names and identifiers that flow between the bus runtime and the
//! session protocol.
//!
//! ## Entities
//!
//! - [`WellKnownName`]: human-assigned, hierarchical bus name (`prefix.instance`)
//! - [`BusId`]: system-assigned unique name of one bus attachment (`:guid.serial`)
//! - [`SessionPort`]: 16-bit contact port scoped to one attachment
//! - [`SessionId`]: 32-bit session identifier issued by the runtime
//! - [`Advertisement`]: a discovered `(name, transport, prefix)` triple

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::NameError;
use crate::session::TransportMask;

/// Maximum length of any bus name.
pub const MAX_NAME_LEN: usize = 255;

// =============================================================================
// WELL-KNOWN NAMES
// =============================================================================

/// A validated well-known bus name such as `org.peerlink.chat.alice`.
///
/// Rules:
/// - at least two elements separated by `.`
/// - every element is non-empty, made of `[A-Za-z0-9_-]`, and does not
///   start with a digit
/// - at most [`MAX_NAME_LEN`] bytes
/// - never starts with `:` (that form is reserved for [`BusId`])
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WellKnownName(String);

impl WellKnownName {
    /// Parse and validate a well-known name.
    pub fn parse(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        validate_name(&name, 2)?;
        Ok(Self(name))
    }

    /// Build `prefix.instance`, validating the result.
    ///
    /// ```rust
    /// use shared_types::WellKnownName;
    ///
    /// let name = WellKnownName::from_prefix("org.peerlink.chat", "alice").unwrap();
    /// assert_eq!(name.as_str(), "org.peerlink.chat.alice");
    /// assert_eq!(name.instance(), "alice");
    /// ```
    pub fn from_prefix(prefix: &str, instance: &str) -> Result<Self, NameError> {
        if instance.is_empty() || instance.contains('.') {
            return Err(NameError::InvalidInstance(instance.to_string()));
        }
        Self::parse(format!("{prefix}.{instance}"))
    }

    /// The name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last element of the name.
    #[must_use]
    pub fn instance(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Whether this name would be reported for a discovery `prefix`.
    ///
    /// Matching is plain string-prefix matching, so `org.x` matches both
    /// `org.x.alice` and `org.xy`.
    #[must_use]
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for WellKnownName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WellKnownName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for WellKnownName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<WellKnownName> for String {
    fn from(name: WellKnownName) -> Self {
        name.0
    }
}

/// Validate a discovery prefix.
///
/// A prefix follows the element rules of [`WellKnownName`] but a single
/// element is enough (`org` is a valid, if very broad, prefix).
pub fn validate_prefix(prefix: &str) -> Result<(), NameError> {
    validate_name(prefix, 1)
}

fn validate_name(name: &str, min_elements: usize) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(NameError::TooLong { len: name.len() });
    }
    if name.starts_with(':') {
        return Err(NameError::UniqueNameForm(name.to_string()));
    }

    let mut elements = 0;
    for element in name.split('.') {
        elements += 1;
        let Some(first) = element.chars().next() else {
            return Err(NameError::EmptyElement(name.to_string()));
        };
        if first.is_ascii_digit() {
            return Err(NameError::LeadingDigit(name.to_string()));
        }
        if let Some(bad) = element
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(NameError::InvalidCharacter {
                name: name.to_string(),
                character: bad,
            });
        }
    }

    if elements < min_elements {
        return Err(NameError::TooFewElements(name.to_string()));
    }
    Ok(())
}

// =============================================================================
// UNIQUE NAMES
// =============================================================================

/// System-assigned unique identity of a bus attachment, e.g. `:4f1a2b3c.7`.
///
/// Used as the sender of signals and as the joiner identity in admission
/// decisions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BusId(String);

impl BusId {
    /// Build a unique name from a router guid and a per-attachment serial.
    #[must_use]
    pub fn new(guid: &str, serial: u32) -> Self {
        Self(format!(":{guid}.{serial}"))
    }

    /// Parse a unique name; it must start with `:` and carry something after it.
    pub fn parse(id: impl Into<String>) -> Result<Self, NameError> {
        let id = id.into();
        if id.len() < 2 || !id.starts_with(':') {
            return Err(NameError::NotUniqueName(id));
        }
        Ok(Self(id))
    }

    /// The unique name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last ten characters, used by the chat sample as a nickname.
    #[must_use]
    pub fn short(&self) -> &str {
        let start = self
            .0
            .char_indices()
            .rev()
            .nth(9)
            .map_or(0, |(idx, _)| idx);
        &self.0[start..]
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BusId {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<BusId> for String {
    fn from(id: BusId) -> Self {
        id.0
    }
}

// =============================================================================
// PORTS AND SESSIONS
// =============================================================================

/// A session port scoped to one bus attachment.
///
/// Port `0` ([`SessionPort::ANY`]) asks the runtime to pick a free port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionPort(pub u16);

impl SessionPort {
    /// "Let the runtime choose."
    pub const ANY: SessionPort = SessionPort(0);

    /// Wrap a raw port number.
    #[must_use]
    pub const fn new(port: u16) -> Self {
        Self(port)
    }

    /// Whether this is the "any" hint rather than a concrete port.
    #[must_use]
    pub const fn is_any(self) -> bool {
        self.0 == 0
    }

    /// The raw port number.
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for SessionPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an established session. The runtime never issues `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u32);

impl SessionId {
    /// Wrap a raw session id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// The raw id.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// DISCOVERY
// =============================================================================

/// A discovered advertisement. Only meaningful between its found and lost
/// notifications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Advertisement {
    /// The advertised well-known name.
    pub name: WellKnownName,
    /// Transport over which the advertisement was seen.
    pub transport: TransportMask,
    /// The discovery prefix this advertisement matched.
    pub prefix: String,
}

impl Advertisement {
    /// Create a new advertisement triple.
    pub fn new(name: WellKnownName, transport: TransportMask, prefix: impl Into<String>) -> Self {
        Self {
            name,
            transport,
            prefix: prefix.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_name_accepts_dotted_names() {
        let name = WellKnownName::parse("org.peerlink.chat.alice").unwrap();
        assert_eq!(name.instance(), "alice");
        assert!(name.has_prefix("org.peerlink.chat"));
        assert!(!name.has_prefix("org.other"));
    }

    #[test]
    fn test_well_known_name_rejects_bad_forms() {
        assert_eq!(WellKnownName::parse(""), Err(NameError::Empty));
        assert!(matches!(
            WellKnownName::parse("single"),
            Err(NameError::TooFewElements(_))
        ));
        assert!(matches!(
            WellKnownName::parse("org..chat"),
            Err(NameError::EmptyElement(_))
        ));
        assert!(matches!(
            WellKnownName::parse("org.9chat"),
            Err(NameError::LeadingDigit(_))
        ));
        assert!(matches!(
            WellKnownName::parse("org.chat room"),
            Err(NameError::InvalidCharacter { character: ' ', .. })
        ));
        assert!(matches!(
            WellKnownName::parse(":1.42"),
            Err(NameError::UniqueNameForm(_))
        ));
        let long = format!("org.{}", "a".repeat(MAX_NAME_LEN));
        assert!(matches!(
            WellKnownName::parse(long),
            Err(NameError::TooLong { .. })
        ));
    }

    #[test]
    fn test_from_prefix_rejects_dotted_instance() {
        assert!(matches!(
            WellKnownName::from_prefix("org.peerlink.chat", "a.b"),
            Err(NameError::InvalidInstance(_))
        ));
        assert!(matches!(
            WellKnownName::from_prefix("org.peerlink.chat", ""),
            Err(NameError::InvalidInstance(_))
        ));
    }

    #[test]
    fn test_prefix_allows_single_element() {
        assert!(validate_prefix("org").is_ok());
        assert!(validate_prefix("org.peerlink").is_ok());
        assert!(validate_prefix("").is_err());
    }

    #[test]
    fn test_well_known_name_serde_validates() {
        let name: WellKnownName = serde_json::from_str("\"org.peerlink.bob\"").unwrap();
        assert_eq!(name.as_str(), "org.peerlink.bob");
        assert!(serde_json::from_str::<WellKnownName>("\"nodots\"").is_err());
    }

    #[test]
    fn test_bus_id_short_form() {
        let id = BusId::new("4f1a2b3c", 17);
        assert_eq!(id.as_str(), ":4f1a2b3c.17");
        assert_eq!(id.short(), "f1a2b3c.17");

        let tiny = BusId::parse(":1.2").unwrap();
        assert_eq!(tiny.short(), ":1.2");
        assert!(BusId::parse("1.2").is_err());
    }

    #[test]
    fn test_session_port_any() {
        assert!(SessionPort::ANY.is_any());
        assert!(!SessionPort::new(42).is_any());
        assert_eq!(SessionPort::new(42).to_string(), "42");
    }
}
