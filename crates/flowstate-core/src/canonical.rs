//! Canonical CBOR encoding for deterministic serialization.
//!
//! This module implements RFC 8949 Core Deterministic Encoding for the
//! subset of CBOR flow state objects use:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats, no text in entries
//!
//! An entry is a map with integer keys. A group is an array of entry maps.
//! Two nodes holding the same entry produce identical bytes for it.

use ciborium::value::{Integer, Value};

use crate::entry::{FlowStateEntry, FlowStateGroup};
use crate::error::{CoreError, Result};
use crate::types::{Address, PortId};

/// Entry field keys (integer keys for compact encoding).
///
/// Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const ADDRESS: u64 = 0;
    pub const PORT_ID: u64 = 1;
    pub const NEIGHBOR_ADDRESS: u64 = 2;
    pub const NEIGHBOR_PORT_ID: u64 = 3;
    pub const STATE: u64 = 4;
    pub const SEQUENCE_NUMBER: u64 = 5;
    pub const AGE: u64 = 6;
}

/// Encode one entry to canonical CBOR bytes.
pub fn canonical_entry_bytes(entry: &FlowStateEntry) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, &entry_to_cbor_value(entry))?;
    Ok(buf)
}

/// Encode a group to canonical CBOR bytes.
///
/// Entry order inside the group is preserved; groups are unordered by
/// meaning, but a fixed order keeps the encoding reproducible.
pub fn canonical_group_bytes(group: &FlowStateGroup) -> Result<Vec<u8>> {
    let array = Value::Array(group.iter().map(entry_to_cbor_value).collect());
    let mut buf = Vec::new();
    encode_value_to(&mut buf, &array)?;
    Ok(buf)
}

/// Decode one entry from CBOR bytes.
pub fn decode_entry(bytes: &[u8]) -> Result<FlowStateEntry> {
    let value = read_value(bytes)?;
    cbor_value_to_entry(&value)
}

/// Decode a group from CBOR bytes.
pub fn decode_group(bytes: &[u8]) -> Result<FlowStateGroup> {
    let value = read_value(bytes)?;
    let items = match value {
        Value::Array(items) => items,
        _ => return Err(CoreError::DecodingError("expected array of entries".into())),
    };

    items
        .iter()
        .map(cbor_value_to_entry)
        .collect::<Result<Vec<_>>>()
        .map(FlowStateGroup::new)
}

fn read_value(bytes: &[u8]) -> Result<Value> {
    if bytes.is_empty() {
        return Err(CoreError::DecodingError("empty payload".into()));
    }
    ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
}

/// Convert an entry to a CBOR Value (map with integer keys).
fn entry_to_cbor_value(entry: &FlowStateEntry) -> Value {
    let uint = |k: u64, v: u64| (Value::Integer(k.into()), Value::Integer(v.into()));

    Value::Map(vec![
        uint(keys::ADDRESS, entry.address.get()),
        uint(keys::PORT_ID, entry.port_id.get()),
        uint(keys::NEIGHBOR_ADDRESS, entry.neighbor_address.get()),
        uint(keys::NEIGHBOR_PORT_ID, entry.neighbor_port_id.get()),
        (Value::Integer(keys::STATE.into()), Value::Bool(entry.state)),
        uint(keys::SEQUENCE_NUMBER, entry.sequence_number),
        uint(keys::AGE, entry.age),
    ])
}

/// Convert a CBOR Value (map) back to an entry.
fn cbor_value_to_entry(value: &Value) -> Result<FlowStateEntry> {
    let map = match value {
        Value::Map(m) => m,
        _ => return Err(CoreError::MalformedEntry("expected map".into())),
    };

    let get = |key: u64| -> Option<&Value> {
        map.iter()
            .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == key as i128))
            .map(|(_, v)| v)
    };

    let uint = |key: u64, name: &str| -> Result<u64> {
        match get(key) {
            Some(Value::Integer(i)) => u64::try_from(*i)
                .map_err(|_| CoreError::MalformedEntry(format!("{name} out of range"))),
            Some(_) => Err(CoreError::MalformedEntry(format!("invalid {name}"))),
            None => Err(CoreError::MalformedEntry(format!("missing {name}"))),
        }
    };

    let state = match get(keys::STATE) {
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(CoreError::MalformedEntry("invalid state".into())),
        None => return Err(CoreError::MalformedEntry("missing state".into())),
    };

    Ok(FlowStateEntry {
        address: Address(uint(keys::ADDRESS, "address")?),
        port_id: PortId(uint(keys::PORT_ID, "port_id")?),
        neighbor_address: Address(uint(keys::NEIGHBOR_ADDRESS, "neighbor_address")?),
        neighbor_port_id: PortId(uint(keys::NEIGHBOR_PORT_ID, "neighbor_port_id")?),
        state,
        sequence_number: uint(keys::SEQUENCE_NUMBER, "sequence_number")?,
        age: uint(keys::AGE, "age")?,
    })
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item)?;
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries)?,
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        _ => {
            return Err(CoreError::EncodingError(
                "unsupported CBOR value type".into(),
            ))
        }
    }
    Ok(())
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
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

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<()> {
    let mut pairs = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        pairs.push((key_buf, v));
    }

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}
