//! Integration test framework for nextgup
//!
//! Provides a scripted PFCP peer and test helpers used by the scenario
//! tests under `tests/`.
//!
//! # Components
//!
//! - [`mock_peer`] - UDP PFCP peer that tests drive message by message
//! - [`test_utils`] - logging setup and test timeouts
//!
//! The tunnel scenarios use the in-memory devices from `nextgup-gtp`, re-exported
//! here as [`MemoryDevice`] and [`MemoryOpener`].

#![allow(missing_docs)]

pub mod mock_peer;
pub mod test_utils;

pub use mock_peer::{open_association, raw, MockPeer, Received, FIRST_PEER_SEID};
pub use nextgup_gtp::{MemoryDevice, MemoryOpener, MemoryPort};
pub use test_utils::{init_test_logging, TestResult, DEFAULT_TEST_TIMEOUT};
