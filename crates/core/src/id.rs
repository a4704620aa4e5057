//! Strongly-typed, prefixed string identifiers.
//!
//! Identifiers are stored as text (`"U-<uuid>"`, `"C-<uuid>"`, ...) so they can
//! be read at a glance in logs and payment metadata.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::constants::AppConstants;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("{kind}: expected prefix '{prefix}'")]
    WrongPrefix { kind: &'static str, prefix: &'static str },

    #[error("{kind}: identifier is empty")]
    Empty { kind: &'static str },

    #[error("{kind}: identifier exceeds {max} characters")]
    TooLong { kind: &'static str, max: usize },
}

macro_rules! prefixed_id {
    ($t:ident, $prefix:literal, $name:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $t(String);

        impl $t {
            pub const PREFIX: &'static str = $prefix;

            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(format!("{}{}", $prefix, Uuid::new_v4()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $t {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let rest = s.strip_prefix($prefix).ok_or(IdError::WrongPrefix {
                    kind: $name,
                    prefix: $prefix,
                })?;
                if rest.trim().is_empty() {
                    return Err(IdError::Empty { kind: $name });
                }
                if s.len() > AppConstants::MAX_ID_LENGTH {
                    return Err(IdError::TooLong {
                        kind: $name,
                        max: AppConstants::MAX_ID_LENGTH,
                    });
                }
                Ok(Self(s.to_string()))
            }
        }

        impl TryFrom<String> for $t {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }
    };
}

prefixed_id!(UserId, "U-", "UserId");
prefixed_id!(ClientId, "C-", "ClientId");
prefixed_id!(ProductId, "P-", "ProductId");
prefixed_id!(InvoiceId, "I-", "InvoiceId");
prefixed_id!(PaymentId, "PAY-", "PaymentId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_carry_their_prefix() {
        assert!(UserId::new().as_str().starts_with("U-"));
        assert!(ClientId::new().as_str().starts_with("C-"));
        assert!(PaymentId::new().as_str().starts_with("PAY-"));
    }

    #[test]
    fn parse_rejects_foreign_prefix() {
        let client = ClientId::new();
        let err = client.as_str().parse::<InvoiceId>().unwrap_err();
        assert!(matches!(err, IdError::WrongPrefix { prefix: "I-", .. }));
    }

    #[test]
    fn parse_rejects_bare_prefix_and_overlong_values() {
        assert!(matches!("U-".parse::<UserId>(), Err(IdError::Empty { .. })));
        let long = format!("U-{}", "x".repeat(AppConstants::MAX_ID_LENGTH));
        assert!(matches!(long.parse::<UserId>(), Err(IdError::TooLong { .. })));
    }

    #[test]
    fn serde_round_trips_as_plain_string() {
        let id = ProductId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: ProductId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<ProductId>("\"C-123\"").is_err());
    }
}
