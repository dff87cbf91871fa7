//! # Flowstate Testkit
//!
//! Testing utilities for flowstate.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known entries and groups with their expected CBOR bytes
//! - **Generators**: Proptest strategies for entries, groups and topologies
//! - **Fixtures**: Recording collaborators and a multi-node mesh over the
//!   in-memory network
//!
//! ## Golden Vectors
//!
//! ```rust
//! use flowstate_testkit::vectors::verify_all_vectors;
//!
//! for (name, ok, hex) in verify_all_vectors() {
//!     assert!(ok, "{name}: {hex}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use flowstate_testkit::generators::entry;
//!
//! proptest! {
//!     #[test]
//!     fn entry_round_trips(e in entry()) {
//!         let bytes = flowstate_core::canonical_entry_bytes(&e).unwrap();
//!         prop_assert_eq!(flowstate_core::decode_entry(&bytes).unwrap(), e);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use flowstate_testkit::fixtures::TestFixture;
//! use flowstate_core::{Address, PortId};
//!
//! let fixture = TestFixture::new(Address(1));
//! fixture.allocate(PortId(1), Address(2));
//! assert_eq!(fixture.node.database().len(), 1);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{Mesh, MeshNode, RecordingMessenger, RecordingRib, SentWrite, TestFixture};
pub use generators::{entry, group, EntryParams};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
