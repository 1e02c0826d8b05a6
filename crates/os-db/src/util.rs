use chrono::{DateTime, Utc};
use os_core::error::WatchError;
use rusqlite::ffi;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("json encode failed: {message}")]
    JsonEncode { message: String },
    #[error("json decode failed: {message}")]
    JsonDecode { message: String },
    #[error("invalid enum value: {value}")]
    InvalidEnum { value: String },
    #[error("invalid timestamp: {value}")]
    InvalidTimestamp { value: String },
    #[error("integer out of range: {value}")]
    IntegerRange { value: String },
}

impl From<DbError> for WatchError {
    fn from(err: DbError) -> Self {
        WatchError::Backend {
            reason: err.to_string(),
        }
    }
}

/// Unique and primary-key violations surface as `Conflict`. A foreign-key
/// violation means the parent watch is gone, so it is `NotFound`. Anything
/// else is a storage failure.
pub fn sql_err(err: rusqlite::Error) -> WatchError {
    let extended = match &err {
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            code.extended_code
        }
        _ => {
            return WatchError::Backend {
                reason: err.to_string(),
            };
        }
    };
    match extended {
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => WatchError::Conflict {
            message: err.to_string(),
        },
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => WatchError::NotFound,
        _ => WatchError::Backend {
            reason: err.to_string(),
        },
    }
}

/// SQLite integers are signed; numbers above `i64::MAX` cannot be stored.
pub fn to_sql_int(value: u64) -> Result<i64, DbError> {
    i64::try_from(value).map_err(|_| DbError::IntegerRange {
        value: value.to_string(),
    })
}

pub fn from_sql_int(value: i64) -> Result<u64, DbError> {
    u64::try_from(value).map_err(|_| DbError::IntegerRange {
        value: value.to_string(),
    })
}

pub fn to_rfc3339(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}

pub fn from_rfc3339(value: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DbError::InvalidTimestamp {
            value: value.to_string(),
        })
}

pub fn opt_to_rfc3339(value: Option<&DateTime<Utc>>) -> Option<String> {
    value.map(to_rfc3339)
}

pub fn opt_from_rfc3339(value: Option<String>) -> Result<Option<DateTime<Utc>>, DbError> {
    value.as_deref().map(from_rfc3339).transpose()
}

pub fn encode_json<T: Serialize>(value: &T) -> Result<String, DbError> {
    serde_json::to_string(value).map_err(|err| DbError::JsonEncode {
        message: err.to_string(),
    })
}

pub fn decode_json<T: DeserializeOwned>(value: &str) -> Result<T, DbError> {
    serde_json::from_str(value).map_err(|err| DbError::JsonDecode {
        message: err.to_string(),
    })
}

pub fn encode_enum<T: Serialize>(value: &T) -> Result<String, DbError> {
    let json = serde_json::to_value(value).map_err(|err| DbError::JsonEncode {
        message: err.to_string(),
    })?;
    match json {
        Value::String(value) => Ok(value),
        other => Err(DbError::InvalidEnum {
            value: other.to_string(),
        }),
    }
}

pub fn decode_enum<T: DeserializeOwned>(value: &str) -> Result<T, DbError> {
    let json = Value::String(value.to_string());
    serde_json::from_value(json).map_err(|_| DbError::InvalidEnum {
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use os_core::types::{ChecksState, ReviewScope};

    #[test]
    fn empty_summary_state_survives_storage() {
        let encoded = encode_enum(&ChecksState::None).unwrap();
        assert_eq!(encoded, "");
        let decoded: ChecksState = decode_enum(&encoded).unwrap();
        assert_eq!(decoded, ChecksState::None);
    }

    #[test]
    fn unknown_enum_value_is_rejected() {
        let err = decode_enum::<ReviewScope>("everyone").unwrap_err();
        assert!(matches!(err, DbError::InvalidEnum { .. }));
    }

    #[test]
    fn timestamps_round_trip() {
        let now = Utc::now();
        assert_eq!(from_rfc3339(&to_rfc3339(&now)).unwrap(), now);
        assert!(from_rfc3339("yesterday").is_err());
    }

    #[test]
    fn integers_outside_sqlite_range_are_rejected() {
        assert_eq!(to_sql_int(u64::MAX >> 1).unwrap(), i64::MAX);
        assert!(matches!(to_sql_int(u64::MAX), Err(DbError::IntegerRange { .. })));
        assert_eq!(from_sql_int(i64::MAX).unwrap(), u64::MAX >> 1);
        assert!(matches!(from_sql_int(-1), Err(DbError::IntegerRange { .. })));
    }
}
