//! Identifiers and value objects for the booking domain.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw database identifier.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// The raw database identifier.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// Unique identifier for an operator.
    OperatorId
);
id_type!(
    /// Unique identifier for a route.
    RouteId
);
id_type!(
    /// Unique identifier for a trip.
    TripId
);
id_type!(
    /// Unique identifier for a booking.
    BookingId
);
id_type!(
    /// Unique identifier for a ticket attachment.
    AttachmentId
);

/// Opaque owner token stored as the value of a seat lock.
///
/// Typically a chat session id; whoever holds the token may extend or
/// release the locks it owns.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an existing session identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random session identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("sess_{}", Uuid::new_v4()))
    }

    /// The session id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A normalized phone number in E.164-ish form: `+` followed by 8-15 digits.
///
/// All ownership checks compare normalized phones, so two spellings of the
/// same number (`+91 98...`, `0091-98...`) always match.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Phone(String);

impl Phone {
    /// Normalize a raw phone string.
    ///
    /// Strips spaces, dashes, parentheses and a leading `00` international
    /// prefix, then requires 8-15 digits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the input has no usable digits or
    /// an out-of-range length.
    pub fn normalize(raw: &str) -> Result<Self> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

        // "00" prefix is the dial-out spelling of "+".
        let digits = digits.strip_prefix("00").unwrap_or(&digits);

        if digits.len() < 8 || digits.len() > 15 {
            return Err(Error::Validation(format!(
                "phone number must have 8-15 digits, got {}",
                digits.len()
            )));
        }

        Ok(Self(format!("+{digits}")))
    }

    /// The normalized phone as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn phone_normalization_strips_formatting() {
        let a = Phone::normalize("+91 98765-43210").unwrap();
        let b = Phone::normalize("919876543210").unwrap();
        let c = Phone::normalize("0091 (98765) 43210").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.as_str(), "+919876543210");
    }

    #[test]
    fn phone_rejects_garbage() {
        assert!(Phone::normalize("hello").is_err());
        assert!(Phone::normalize("123").is_err());
        assert!(Phone::normalize("1234567890123456789").is_err());
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }

    #[test]
    fn id_display_matches_inner() {
        assert_eq!(BookingId::new(42).to_string(), "42");
        assert_eq!(TripId::from(7).get(), 7);
    }
}
