// common/src/models/session.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable numeric identity of a signed-in user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(pub u64);

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session record stored under an opaque token at login time.
///
/// The login flow writes the identity under `id`; `identity_id` is accepted
/// as well. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "id", alias = "identity_id")]
    pub identity_id: IdentityId,
}

/// A stored record that does not match the session schema
#[derive(Debug, Error)]
#[error("malformed session record: {0}")]
pub struct MalformedSession(#[from] serde_json::Error);

impl SessionRecord {
    pub fn new(identity_id: u64) -> Self {
        Self {
            identity_id: IdentityId(identity_id),
        }
    }

    /// Decode a raw stored value
    pub fn decode(raw: &str) -> Result<Self, MalformedSession> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Serialized form as written to the token store
    pub fn encode(&self) -> String {
        serde_json::json!({ "id": self.identity_id.0 }).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_login_record() {
        let record = SessionRecord::decode(r#"{"id":42,"email":"ops@example.com"}"#).unwrap();
        assert_eq!(record.identity_id, IdentityId(42));
        assert_eq!(record.identity_id.to_string(), "42");
    }

    #[test]
    fn test_decode_alias() {
        let record = SessionRecord::decode(r#"{"identity_id":7}"#).unwrap();
        assert_eq!(record, SessionRecord::new(7));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        for raw in ["", "null", "{}", r#"{"id":"42"}"#, r#"{"id":-1}"#, r#"{"id":null}"#] {
            assert!(SessionRecord::decode(raw).is_err(), "accepted {:?}", raw);
        }
    }

    #[test]
    fn test_encode_matches_login_shape() {
        let raw = SessionRecord::new(42).encode();
        assert_eq!(raw, r#"{"id":42}"#);
        assert_eq!(SessionRecord::decode(&raw).unwrap(), SessionRecord::new(42));
    }
}
