//! Common test utilities for relay integration tests
//!
//! In-process participants that talk to a `SessionManager` directly, and a
//! real listener plus WebSocket client for end-to-end tests.

#![allow(unused_imports)]

pub mod helpers;

pub use helpers::*;
