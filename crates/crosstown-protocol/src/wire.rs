use rmp_serde::{decode, encode};
use thiserror::Error;

use crate::{Command, Event, Snapshot};

#[derive(Debug, Error)]
pub enum WireError {
    #[error("encode error: {0}")]
    Encode(#[from] encode::Error),
    #[error("decode error: {0}")]
    Decode(#[from] decode::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn serialize_command(cmd: &Command) -> Result<Vec<u8>, WireError> {
    Ok(encode::to_vec_named(cmd)?)
}

pub fn deserialize_command(bytes: &[u8]) -> Result<Command, WireError> {
    Ok(decode::from_slice(bytes)?)
}

pub fn serialize_events(events: &[Event]) -> Result<Vec<u8>, WireError> {
    Ok(encode::to_vec_named(events)?)
}

pub fn deserialize_events(bytes: &[u8]) -> Result<Vec<Event>, WireError> {
    Ok(decode::from_slice(bytes)?)
}

pub fn serialize_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>, WireError> {
    Ok(encode::to_vec_named(snapshot)?)
}

pub fn deserialize_snapshot(bytes: &[u8]) -> Result<Snapshot, WireError> {
    Ok(decode::from_slice(bytes)?)
}

/// Deterministic snapshot hash for desync detection.
///
/// Hashes the MessagePack-serialized snapshot using FNV-1a 64-bit.
pub fn snapshot_hash(snapshot: &Snapshot) -> Result<u64, WireError> {
    let bytes = serialize_snapshot(snapshot)?;
    Ok(hash_bytes_fnv1a64(&bytes))
}

/// Deterministic, stable 64-bit hash for raw bytes (FNV-1a).
pub fn hash_bytes_fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    let mut hash = OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

pub fn serialize_command_json(cmd: &Command) -> Result<String, WireError> {
    Ok(serde_json::to_string(cmd)?)
}

pub fn deserialize_command_json(json: &str) -> Result<Command, WireError> {
    Ok(serde_json::from_str(json)?)
}

pub fn serialize_events_json(events: &[Event]) -> Result<String, WireError> {
    Ok(serde_json::to_string(events)?)
}

pub fn serialize_snapshot_json(snapshot: &Snapshot) -> Result<String, WireError> {
    Ok(serde_json::to_string(snapshot)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Direction, FieldIndex, PlayerId};

    #[test]
    fn fnv_known_vectors() {
        assert_eq!(hash_bytes_fnv1a64(b""), 0xcbf29ce484222325);
        assert_eq!(hash_bytes_fnv1a64(b"a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn command_json_uses_type_tag() {
        let json = serialize_command_json(&Command::ChooseDirection {
            direction: Direction::Down,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"ChooseDirection","direction":"Down"}"#);

        let parsed = deserialize_command_json(r#"{"type":"Invest","field":12}"#).unwrap();
        assert_eq!(
            parsed,
            Command::Invest {
                field: FieldIndex(12),
                sacrifice: None
            }
        );
    }

    #[test]
    fn events_survive_msgpack() {
        let events = vec![Event::Moved {
            player: PlayerId(1),
            path: vec![FieldIndex(4), FieldIndex(5), FieldIndex(49)],
            rest: true,
            turned_to_center: true,
            passed_start: false,
        }];
        let bytes = serialize_events(&events).unwrap();
        assert_eq!(deserialize_events(&bytes).unwrap(), events);
    }
}
