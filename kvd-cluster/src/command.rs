//! Commands replicated through the Raft log and their wire codec.
//!
//! Every mutation of the key-value map is a [`Command`]. Commands are encoded
//! into an [`EncodedCommand`] before they are proposed, stored in the Raft log
//! as opaque bytes, and decoded again by the state machine once the entry is
//! committed. Only [`encode`] ever produces log payloads, so a payload that
//! fails to [`decode`] means the log is corrupt.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tag written for [`Command::Set`].
pub const OP_SET: &str = "set";

/// Tag written for [`Command::Delete`].
pub const OP_DELETE: &str = "delete";

/// A single-key mutation of the replicated map.
///
/// The JSON encoding carries an `op` discriminator next to the
/// operation-specific fields:
///
/// ```text
/// {"op":"set","key":"a","value":"1"}
/// {"op":"delete","key":"a"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Command {
    /// Insert or overwrite `key`.
    Set {
        /// Key to write.
        key: String,
        /// New value.
        value: String,
    },

    /// Remove `key`. Removing an absent key is a no-op.
    Delete {
        /// Key to remove.
        key: String,
    },
}

impl Command {
    /// Build a `Set` command.
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Command::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Build a `Delete` command.
    pub fn delete(key: impl Into<String>) -> Self {
        Command::Delete { key: key.into() }
    }

    /// The wire tag of this command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Set { .. } => OP_SET,
            Command::Delete { .. } => OP_DELETE,
        }
    }

    /// The key this command touches.
    pub fn key(&self) -> &str {
        match self {
            Command::Set { key, .. } | Command::Delete { key } => key,
        }
    }
}

/// Encoded command bytes, the application payload of a Raft log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedCommand(Vec<u8>);

impl EncodedCommand {
    /// Wrap raw payload bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Borrow the payload.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Errors produced by the command codec.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload has no `op` field.
    #[error("command payload has no op tag")]
    MissingTag,

    /// The `op` field names no known command.
    #[error("unknown command op: {0}")]
    UnknownTag(String),

    /// The payload is not valid JSON or the fields do not match the tag.
    #[error("malformed command payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Encode a command into a log payload.
pub fn encode(command: &Command) -> Result<EncodedCommand, CodecError> {
    Ok(EncodedCommand(serde_json::to_vec(command)?))
}

/// Decode a log payload produced by [`encode`].
///
/// The tag is read first so that a missing or unknown tag is reported as
/// such instead of as a generic field mismatch.
pub fn decode(bytes: &[u8]) -> Result<Command, CodecError> {
    #[derive(Deserialize)]
    struct Envelope {
        op: Option<String>,
    }

    let envelope: Envelope = serde_json::from_slice(bytes)?;
    match envelope.op.as_deref() {
        None => Err(CodecError::MissingTag),
        Some(OP_SET) | Some(OP_DELETE) => Ok(serde_json::from_slice(bytes)?),
        Some(other) => Err(CodecError::UnknownTag(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(command: Command) {
        let encoded = encode(&command).expect("encode");
        let decoded = decode(encoded.as_bytes()).expect("decode");
        assert_eq!(decoded, command);
    }

    #[test]
    fn set_and_delete_round_trip() {
        round_trip(Command::set("a", "1"));
        round_trip(Command::delete("a"));
    }

    #[test]
    fn empty_key_and_value_round_trip() {
        round_trip(Command::set("", ""));
        round_trip(Command::delete(""));
    }

    #[test]
    fn unicode_round_trip() {
        round_trip(Command::set("ключ", "значение 🚀"));
        round_trip(Command::delete("鍵"));
    }

    #[test]
    fn wire_format_carries_op_tag() {
        let encoded = encode(&Command::set("a", "1")).expect("encode");
        let json: serde_json::Value = serde_json::from_slice(encoded.as_bytes()).expect("json");
        assert_eq!(json["op"], "set");
        assert_eq!(json["key"], "a");
        assert_eq!(json["value"], "1");

        let encoded = encode(&Command::delete("a")).expect("encode");
        let json: serde_json::Value = serde_json::from_slice(encoded.as_bytes()).expect("json");
        assert_eq!(json["op"], "delete");
        assert!(json.get("value").is_none());
    }

    #[test]
    fn decodes_literal_wire_payloads() {
        let cmd = decode(br#"{"op":"set","key":"k","value":"v"}"#).expect("decode set");
        assert_eq!(cmd, Command::set("k", "v"));

        let cmd = decode(br#"{"op":"delete","key":"k"}"#).expect("decode delete");
        assert_eq!(cmd, Command::delete("k"));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = decode(br#"{"op":"increment","key":"k"}"#).unwrap_err();
        assert!(matches!(err, CodecError::UnknownTag(ref op) if op == "increment"));
    }

    #[test]
    fn missing_tag_is_rejected() {
        let err = decode(br#"{"key":"k","value":"v"}"#).unwrap_err();
        assert!(matches!(err, CodecError::MissingTag));
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(matches!(decode(b"not json"), Err(CodecError::Malformed(_))));
        assert!(matches!(decode(b"42"), Err(CodecError::Malformed(_))));
        // Tag is valid but the set shape is incomplete.
        assert!(matches!(
            decode(br#"{"op":"set","key":"k"}"#),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn command_accessors() {
        let cmd = Command::set("a", "1");
        assert_eq!(cmd.name(), "set");
        assert_eq!(cmd.key(), "a");

        let cmd = Command::delete("b");
        assert_eq!(cmd.name(), "delete");
        assert_eq!(cmd.key(), "b");
    }
}
