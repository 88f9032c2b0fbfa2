//! Change-data-capture events delivered on the persistence notification
//! channel.

use serde::{Deserialize, Serialize};

/// Operation carried by a change event. Unknown values deserialize to an
/// error the Orchestrator logs and skips rather than propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Insert,
    Delete,
}

/// Payload of a single notification: `{"device_id": "...", "operation": "INSERT"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub device_id: String,
    pub operation: Operation,
}

impl ChangeEvent {
    /// Parse a raw notification payload. Malformed JSON or an unrecognized
    /// `operation` both return an error for the caller to log and skip —
    /// never panics, never propagates as fatal.
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_insert() {
        let event = ChangeEvent::parse(r#"{"device_id":"dev-2","operation":"INSERT"}"#).unwrap();
        assert_eq!(event.device_id, "dev-2");
        assert_eq!(event.operation, Operation::Insert);
    }

    #[test]
    fn parses_delete() {
        let event = ChangeEvent::parse(r#"{"device_id":"dev-2","operation":"DELETE"}"#).unwrap();
        assert_eq!(event.operation, Operation::Delete);
    }

    #[test]
    fn rejects_unknown_operation() {
        assert!(ChangeEvent::parse(r#"{"device_id":"dev-2","operation":"TRUNCATE"}"#).is_err());
    }

    #[test]
    fn rejects_malformed_payload() {
        assert!(ChangeEvent::parse("not json").is_err());
    }
}
