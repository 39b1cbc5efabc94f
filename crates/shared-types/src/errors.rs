//! # Error Types
//!
//! Errors raised while constructing shared value types.

use thiserror::Error;

/// Reasons a string is not a valid bus name, prefix or unique name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    /// The name is empty.
    #[error("Bus name is empty")]
    Empty,

    /// The name exceeds the maximum length.
    #[error("Bus name too long: {len} bytes (max: 255)")]
    TooLong { len: usize },

    /// A well-known name needs at least two elements.
    #[error("Bus name needs at least two elements: {0}")]
    TooFewElements(String),

    /// Two dots in a row, or a leading/trailing dot.
    #[error("Bus name has an empty element: {0}")]
    EmptyElement(String),

    /// An element starts with a digit.
    #[error("Bus name element starts with a digit: {0}")]
    LeadingDigit(String),

    /// An element contains a character outside `[A-Za-z0-9_-]`.
    #[error("Bus name {name} contains invalid character {character:?}")]
    InvalidCharacter { name: String, character: char },

    /// The `:` form is reserved for unique names.
    #[error("Well-known name may not use the unique-name form: {0}")]
    UniqueNameForm(String),

    /// The instance part appended to a prefix is empty or dotted.
    #[error("Invalid instance name: {0:?}")]
    InvalidInstance(String),

    /// A unique name must start with `:`.
    #[error("Not a unique bus name: {0}")]
    NotUniqueName(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_error_display() {
        assert_eq!(NameError::Empty.to_string(), "Bus name is empty");
        assert_eq!(
            NameError::TooLong { len: 300 }.to_string(),
            "Bus name too long: 300 bytes (max: 255)"
        );
        assert_eq!(
            NameError::InvalidCharacter {
                name: "org.a b".into(),
                character: ' '
            }
            .to_string(),
            "Bus name org.a b contains invalid character ' '"
        );
    }
}
