//! Prefixed ULID identifiers. Each watch table has its own id type so a
//! ledger id can never be passed where a watch id is expected.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

const ULID_LEN: usize = 26;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("invalid prefix: expected {expected}, got {got}")]
    InvalidPrefix { expected: &'static str, got: String },
    #[error("invalid ulid: {value}")]
    InvalidUlid { value: String },
    #[error("invalid id format: {value}")]
    InvalidFormat { value: String },
}

fn check(value: &str, prefix: &'static str) -> Result<(), IdError> {
    let suffix = value.strip_prefix(prefix).ok_or_else(|| IdError::InvalidPrefix {
        expected: prefix,
        got: value
            .split_once('_')
            .map_or(value, |(head, _)| head)
            .to_string(),
    })?;
    if suffix.len() != ULID_LEN {
        return Err(IdError::InvalidFormat {
            value: value.to_string(),
        });
    }
    match Ulid::from_string(suffix) {
        Ok(_) => Ok(()),
        Err(_) => Err(IdError::InvalidUlid {
            value: value.to_string(),
        }),
    }
}

macro_rules! prefixed_id {
    ($(#[$meta:meta])* $name:ident => $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            pub fn new(value: String) -> Result<Self, IdError> {
                check(&value, Self::PREFIX).map(|()| Self(value))
            }

            pub fn generate() -> Self {
                Self(format!("{}{}", Self::PREFIX, Ulid::new()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s.to_owned())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                String::deserialize(deserializer)
                    .and_then(|raw| Self::new(raw).map_err(serde::de::Error::custom))
            }
        }
    };
}

prefixed_id!(PrWatchId => "prw_");
prefixed_id!(TaskPrId => "tpr_");
prefixed_id!(ReviewWatchId => "rw_");
prefixed_id!(
    /// A row in the review dedup ledger.
    ReviewPrTaskId => "rpt_"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_round_trip_through_parse() {
        let id = ReviewWatchId::generate();
        let parsed: ReviewWatchId = id.as_str().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn rejects_foreign_prefix() {
        let other = PrWatchId::generate();
        let err = TaskPrId::new(other.as_str().to_string()).unwrap_err();
        assert_eq!(
            err,
            IdError::InvalidPrefix {
                expected: "tpr_",
                got: "prw".to_string(),
            }
        );
    }

    #[test]
    fn rejects_short_or_garbled_ulid() {
        let err = ReviewPrTaskId::new("rpt_123".to_string()).unwrap_err();
        assert!(matches!(err, IdError::InvalidFormat { .. }));
        let err = ReviewPrTaskId::new(format!("rpt_{}", "!".repeat(26))).unwrap_err();
        assert!(matches!(err, IdError::InvalidUlid { .. }));
    }

    #[test]
    fn deserialization_validates() {
        let ok: PrWatchId = serde_json::from_value(serde_json::json!(PrWatchId::generate().as_str())).unwrap();
        assert!(ok.as_str().starts_with("prw_"));
        assert!(serde_json::from_value::<PrWatchId>(serde_json::json!("rw_x")).is_err());
    }
}
