//! Serde helpers for settings sections.
//!
//! Environment variables and vault secrets are always strings, so numeric
//! and boolean settings accept either a native value or its text form.

use core::fmt::Display;
use core::str::FromStr;

use serde::de;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOr<T> {
    Native(T),
    Text(String),
}

/// `#[serde(deserialize_with = "kluster_core::settings::from_text")]`
pub fn from_text<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    match TextOr::<T>::deserialize(deserializer)? {
        TextOr::Native(value) => Ok(value),
        TextOr::Text(text) => text.trim().parse().map_err(de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Section {
        #[serde(deserialize_with = "super::from_text")]
        port: u16,
        #[serde(deserialize_with = "super::from_text")]
        enabled: bool,
    }

    #[test]
    fn accepts_native_and_text_values() {
        let native: Section = serde_json::from_value(serde_json::json!({"port": 8080, "enabled": true})).unwrap();
        let text: Section = serde_json::from_value(serde_json::json!({"port": " 8080", "enabled": "false"})).unwrap();
        assert_eq!(native.port, text.port);
        assert!(native.enabled && !text.enabled);
    }

    #[test]
    fn rejects_unparseable_text() {
        let err = serde_json::from_value::<Section>(serde_json::json!({"port": "eighty", "enabled": true})).unwrap_err();
        assert!(err.to_string().contains("invalid digit"));
    }
}
