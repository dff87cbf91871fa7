//! Golden test vectors for deterministic verification.
//!
//! These vectors pin the canonical CBOR bytes of entries and groups so
//! that every node, whatever it runs on, produces identical writes.

use serde::Serialize;

use flowstate_core::{
    canonical_entry_bytes, canonical_group_bytes, Address, FlowStateEntry, FlowStateGroup, PortId,
};

/// What a vector encodes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorKind {
    Entry,
    Group,
}

/// A golden test vector.
#[derive(Debug, Clone, Serialize)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub kind: VectorKind,
    /// Entries; an entry vector holds exactly one.
    pub entries: Vec<FlowStateEntry>,
    /// Expected canonical bytes (hex).
    pub expected_hex: &'static str,
}

impl GoldenVector {
    /// Encode the vector's input.
    pub fn encode(&self) -> flowstate_core::Result<Vec<u8>> {
        match self.kind {
            VectorKind::Entry => match self.entries.first() {
                Some(entry) => canonical_entry_bytes(entry),
                None => Err(flowstate_core::CoreError::EncodingError(format!(
                    "vector '{}' has no entry",
                    self.name
                ))),
            },
            VectorKind::Group => canonical_group_bytes(&FlowStateGroup::new(self.entries.clone())),
        }
    }
}

fn fresh() -> FlowStateEntry {
    FlowStateEntry::new(Address(1), PortId(1), Address(2), PortId(1))
}

fn tombstone() -> FlowStateEntry {
    FlowStateEntry::new(Address(1), PortId(3), Address(2), PortId(7))
        .with_state(false)
        .with_sequence_number(2)
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    let mut aged = tombstone();
    aged.age = 5;

    let wide = FlowStateEntry {
        address: Address(500),
        port_id: PortId(24),
        neighbor_address: Address(65536),
        neighbor_port_id: PortId(1),
        state: true,
        sequence_number: 1 << 32,
        age: 23,
    };

    vec![
        GoldenVector {
            name: "fresh allocation",
            kind: VectorKind::Entry,
            entries: vec![fresh()],
            expected_hex: "a7000101010202030104f505010600",
        },
        GoldenVector {
            name: "aged tombstone",
            kind: VectorKind::Entry,
            entries: vec![aged],
            expected_hex: "a7000101030202030704f405020605",
        },
        GoldenVector {
            name: "wide integers",
            kind: VectorKind::Entry,
            entries: vec![wide],
            expected_hex: "a7001901f4011818021a00010000030104f5051b00000001000000000617",
        },
        GoldenVector {
            name: "empty group",
            kind: VectorKind::Group,
            entries: vec![],
            expected_hex: "80",
        },
        GoldenVector {
            name: "two-entry group",
            kind: VectorKind::Group,
            entries: vec![fresh(), tombstone()],
            expected_hex: "82a7000101010202030104f505010600a7000101030202030704f405020600",
        },
    ]
}

/// Verify all golden vectors against the encoder.
///
/// Returns `(name, matches, actual_hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let actual = v.encode().map(hex::encode).unwrap_or_default();
            (v.name.to_string(), actual == v.expected_hex, actual)
        })
        .collect()
}

/// All vectors as pretty JSON, for sharing with other implementations.
pub fn vectors_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&all_vectors())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowstate_core::{decode_entry, decode_group};

    #[test]
    fn test_all_vectors_match() {
        for (name, ok, actual) in verify_all_vectors() {
            assert!(ok, "vector '{name}' encoded as {actual}");
        }
    }

    #[test]
    fn test_vectors_decode_back() {
        for vector in all_vectors() {
            let bytes = hex::decode(vector.expected_hex).unwrap();
            match vector.kind {
                VectorKind::Entry => assert_eq!(decode_entry(&bytes).unwrap(), vector.entries[0]),
                VectorKind::Group => {
                    assert_eq!(decode_group(&bytes).unwrap().into_entries(), vector.entries)
                }
            }
        }
    }

    #[test]
    fn test_vectors_json() {
        let json = vectors_json().unwrap();
        assert!(json.contains("\"fresh allocation\""));
        assert!(json.contains("\"kind\": \"group\""));
    }
}
