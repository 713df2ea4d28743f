//! Canonical CBOR encoding for events and calls.
//!
//! This module implements the subset of RFC 8949 Core Deterministic Encoding
//! the registry needs:
//! - Maps with unsigned integer keys, sorted ascending
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (timestamps are i64 milliseconds)
//!
//! The same event always encodes to the same bytes, so event digests are
//! stable across platforms and across store backends.

use ciborium::value::Value;

use crate::call::Call;
use crate::crypto::Identity;
use crate::error::CoreError;
use crate::event::{EventKind, RegistryEvent};
use crate::types::{DataHash, ProofId};

/// Event field keys. Keys 0-23 encode as single bytes.
mod event_keys {
    pub const KIND: u64 = 0;
    pub const ID: u64 = 1;
    pub const ACTOR: u64 = 2;
    pub const TIMESTAMP: u64 = 3;
    pub const DATA_HASH: u64 = 4;
    pub const SUBJECT: u64 = 5;
    pub const CONTEXT: u64 = 6;
    pub const NEW_ADMIN: u64 = 7;
}

/// Call field keys.
mod call_keys {
    pub const OP: u64 = 0;
    pub const DATA_HASH: u64 = 1;
    pub const SUBJECT: u64 = 2;
    pub const CONTEXT: u64 = 3;
    pub const ID: u64 = 4;
    pub const NEW_ADMIN: u64 = 5;
}

/// The values we ever encode. Keeping this closed makes encoding infallible.
enum Cbor<'a> {
    Uint(u64),
    Int(i64),
    Bytes(&'a [u8]),
    Text(&'a str),
    Map(Vec<(u64, Cbor<'a>)>),
}

/// Encode an event to canonical bytes.
pub fn event_bytes(event: &RegistryEvent) -> Vec<u8> {
    use event_keys::*;

    let kind = Cbor::Uint(event.kind().to_u16().into());
    let entries = match event {
        RegistryEvent::ProofRegistered {
            id,
            submitter,
            data_hash,
            subject,
            context,
            timestamp,
        } => vec![
            (KIND, kind),
            (ID, Cbor::Uint(id.0)),
            (ACTOR, Cbor::Bytes(submitter.as_bytes())),
            (TIMESTAMP, Cbor::Int(*timestamp)),
            (DATA_HASH, Cbor::Bytes(data_hash.as_bytes())),
            (SUBJECT, Cbor::Text(subject)),
            (CONTEXT, Cbor::Text(context)),
        ],
        RegistryEvent::ProofDeactivated {
            id,
            caller,
            timestamp,
        } => vec![
            (KIND, kind),
            (ID, Cbor::Uint(id.0)),
            (ACTOR, Cbor::Bytes(caller.as_bytes())),
            (TIMESTAMP, Cbor::Int(*timestamp)),
        ],
        RegistryEvent::AdminTransferred {
            previous,
            new_admin,
            timestamp,
        } => vec![
            (KIND, kind),
            (ACTOR, Cbor::Bytes(previous.as_bytes())),
            (TIMESTAMP, Cbor::Int(*timestamp)),
            (NEW_ADMIN, Cbor::Bytes(new_admin.as_bytes())),
        ],
    };

    encode(&Cbor::Map(entries))
}

/// Decode an event from canonical bytes.
pub fn decode_event(bytes: &[u8]) -> Result<RegistryEvent, CoreError> {
    use event_keys::*;

    let map = decode_map(bytes)?;

    let code = get_uint(&map, KIND, "kind")?;
    let kind = u16::try_from(code)
        .ok()
        .and_then(EventKind::from_u16)
        .ok_or_else(|| CoreError::DecodingError(format!("unknown event kind: {}", code)))?;
    let actor = Identity(get_bytes32(&map, ACTOR, "actor")?);
    let timestamp = get_int(&map, TIMESTAMP, "timestamp")?;

    Ok(match kind {
        EventKind::ProofRegistered => RegistryEvent::ProofRegistered {
            id: ProofId(get_uint(&map, ID, "id")?),
            submitter: actor,
            data_hash: DataHash(get_bytes32(&map, DATA_HASH, "data_hash")?),
            subject: get_text(&map, SUBJECT, "subject")?,
            context: get_text(&map, CONTEXT, "context")?,
            timestamp,
        },
        EventKind::ProofDeactivated => RegistryEvent::ProofDeactivated {
            id: ProofId(get_uint(&map, ID, "id")?),
            caller: actor,
            timestamp,
        },
        EventKind::AdminTransferred => RegistryEvent::AdminTransferred {
            previous: actor,
            new_admin: Identity(get_bytes32(&map, NEW_ADMIN, "new_admin")?),
            timestamp,
        },
    })
}

/// Encode a call to canonical bytes.
pub fn call_bytes(call: &Call) -> Vec<u8> {
    use call_keys::*;

    let entries = match call {
        Call::Register {
            data_hash,
            subject,
            context,
        } => vec![
            (OP, Cbor::Uint(1)),
            (DATA_HASH, Cbor::Bytes(data_hash.as_bytes())),
            (SUBJECT, Cbor::Text(subject)),
            (CONTEXT, Cbor::Text(context)),
        ],
        Call::Deactivate { id } => vec![(OP, Cbor::Uint(2)), (ID, Cbor::Uint(id.0))],
        Call::TransferAdmin { new_admin } => vec![
            (OP, Cbor::Uint(3)),
            (NEW_ADMIN, Cbor::Bytes(new_admin.as_bytes())),
        ],
    };

    encode(&Cbor::Map(entries))
}

/// Decode a call from canonical bytes.
pub fn decode_call(bytes: &[u8]) -> Result<Call, CoreError> {
    use call_keys::*;

    let map = decode_map(bytes)?;

    match get_uint(&map, OP, "op")? {
        1 => Ok(Call::Register {
            data_hash: DataHash(get_bytes32(&map, DATA_HASH, "data_hash")?),
            subject: get_text(&map, SUBJECT, "subject")?,
            context: get_text(&map, CONTEXT, "context")?,
        }),
        2 => Ok(Call::Deactivate {
            id: ProofId(get_uint(&map, ID, "id")?),
        }),
        3 => Ok(Call::TransferAdmin {
            new_admin: Identity(get_bytes32(&map, NEW_ADMIN, "new_admin")?),
        }),
        op => Err(CoreError::DecodingError(format!("unknown call op: {}", op))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Encoding
// ─────────────────────────────────────────────────────────────────────────────

fn encode(value: &Cbor<'_>) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value);
    buf
}

fn encode_value_to(buf: &mut Vec<u8>, value: &Cbor<'_>) {
    match value {
        Cbor::Uint(n) => encode_uint(buf, 0, *n),
        Cbor::Int(n) if *n >= 0 => encode_uint(buf, 0, *n as u64),
        // CBOR encodes -1 as 0, -2 as 1, etc.
        Cbor::Int(n) => encode_uint(buf, 1, (-1 - *n) as u64),
        Cbor::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Cbor::Text(s) => {
            encode_uint(buf, 3, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        Cbor::Map(entries) => {
            // Unsigned keys in smallest encoding sort the same numerically
            // and by encoded bytes.
            let mut sorted: Vec<&(u64, Cbor<'_>)> = entries.iter().collect();
            sorted.sort_by_key(|(k, _)| *k);

            encode_uint(buf, 5, sorted.len() as u64);
            for (key, value) in sorted {
                encode_uint(buf, 0, *key);
                encode_value_to(buf, value);
            }
        }
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoding
// ─────────────────────────────────────────────────────────────────────────────

type Entries = Vec<(Value, Value)>;

fn decode_map(bytes: &[u8]) -> Result<Entries, CoreError> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))?;

    let map = match value {
        Value::Map(m) => m,
        _ => return Err(CoreError::DecodingError("expected map".into())),
    };

    // Reject anything that would not re-encode to the same bytes.
    let canonical = encode_entries_for_check(&map)?;
    if canonical != bytes {
        return Err(CoreError::DecodingError("non-canonical encoding".into()));
    }

    Ok(map)
}

fn encode_entries_for_check(map: &Entries) -> Result<Vec<u8>, CoreError> {
    let mut entries = Vec::with_capacity(map.len());
    for (key, value) in map {
        let key = match key {
            Value::Integer(i) => u64::try_from(*i)
                .map_err(|_| CoreError::DecodingError("negative map key".into()))?,
            _ => return Err(CoreError::DecodingError("non-integer map key".into())),
        };
        let value = match value {
            Value::Integer(i) => match u64::try_from(*i) {
                Ok(n) => Cbor::Uint(n),
                Err(_) => Cbor::Int(
                    i64::try_from(*i)
                        .map_err(|_| CoreError::DecodingError("integer out of range".into()))?,
                ),
            },
            Value::Bytes(b) => Cbor::Bytes(b),
            Value::Text(s) => Cbor::Text(s),
            _ => return Err(CoreError::DecodingError("unsupported value type".into())),
        };
        entries.push((key, value));
    }

    if entries.windows(2).any(|w| w[0].0 >= w[1].0) {
        return Err(CoreError::DecodingError("map keys not sorted".into()));
    }

    Ok(encode(&Cbor::Map(entries)))
}

fn get<'m>(map: &'m Entries, key: u64) -> Option<&'m Value> {
    map.iter()
        .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == i128::from(key)))
        .map(|(_, v)| v)
}

fn missing(field: &str) -> CoreError {
    CoreError::DecodingError(format!("missing or invalid {}", field))
}

fn get_uint(map: &Entries, key: u64, field: &str) -> Result<u64, CoreError> {
    match get(map, key) {
        Some(Value::Integer(i)) => u64::try_from(*i).map_err(|_| missing(field)),
        _ => Err(missing(field)),
    }
}

fn get_int(map: &Entries, key: u64, field: &str) -> Result<i64, CoreError> {
    match get(map, key) {
        Some(Value::Integer(i)) => i64::try_from(*i).map_err(|_| missing(field)),
        _ => Err(missing(field)),
    }
}

fn get_bytes32(map: &Entries, key: u64, field: &str) -> Result<[u8; 32], CoreError> {
    match get(map, key) {
        Some(Value::Bytes(b)) => b.as_slice().try_into().map_err(|_| missing(field)),
        _ => Err(missing(field)),
    }
}

fn get_text(map: &Entries, key: u64, field: &str) -> Result<String, CoreError> {
    match get(map, key) {
        Some(Value::Text(s)) => Ok(s.clone()),
        _ => Err(missing(field)),
    }
}
