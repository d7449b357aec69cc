//! Entity identifiers.
//!
//! Identifiers cross the API boundary as text. They are parsed here
//! before any store lookup so that malformed input never reaches a
//! query.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GatehouseError, GatehouseResult};

/// Length of the canonical hyphenated form (`8-4-4-4-12`).
const CANONICAL_LEN: usize = 36;

/// Opaque, immutable identifier of a stored entity.
///
/// Backed by a UUIDv7 so that identifiers sort in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Produce a fresh identifier for a new entity.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parse the canonical hyphenated form. Simple, braced and URN
    /// encodings are rejected so that one entity has exactly one
    /// textual identifier.
    pub fn parse(text: &str) -> GatehouseResult<Self> {
        if text.len() != CANONICAL_LEN {
            return Err(invalid(text));
        }
        Uuid::try_parse(text).map(Self).map_err(|_| invalid(text))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

fn invalid(text: &str) -> GatehouseError {
    GatehouseError::InvalidIdentifier {
        value: text.to_string(),
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.as_hyphenated().fmt(f)
    }
}

impl FromStr for EntityId {
    type Err = GatehouseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_and_ordered() {
        let a = EntityId::generate();
        let b = EntityId::generate();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn display_round_trips_through_parse() {
        let id = EntityId::generate();
        let text = id.to_string();
        assert_eq!(text.len(), CANONICAL_LEN);
        assert_eq!(EntityId::parse(&text).unwrap(), id);
    }

    #[test]
    fn uppercase_is_accepted_and_normalised() {
        let id = EntityId::parse("67E55044-10B1-426F-9247-BB680E5FE0C8").unwrap();
        assert_eq!(id.to_string(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
    }

    #[test]
    fn malformed_input_is_rejected() {
        for text in [
            "",
            "not-a-valid-id",
            "507f1f77bcf86cd799439011",
            "67e5504410b1426f9247bb680e5fe0c8",
            "{67e55044-10b1-426f-9247-bb680e5fe0c8}",
            "67e55044-10b1-426f-9247-bb680e5fe0cz",
            "67e55044-10b1-426f-9247-bb680e5fe0c8 ",
        ] {
            let err = EntityId::parse(text).unwrap_err();
            assert!(
                matches!(err, GatehouseError::InvalidIdentifier { ref value } if value == text),
                "expected InvalidIdentifier for {text:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = EntityId::parse("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"67e55044-10b1-426f-9247-bb680e5fe0c8\"");
    }
}
