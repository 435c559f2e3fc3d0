//! Test helper modules for vox-player integration tests
//!
//! Provides reusable test infrastructure components:
//! - Mock drivers: connector, resource factory, metadata service
//! - TestHarness: an AudioManager wired to the mocks with short timeouts
//! - Event-wait utilities for observing engine events

#![allow(dead_code)]

pub mod mocks;

pub use mocks::{
    expect_event, harness, settle, MockConnector, MockFactory, MockMetadata, MockResource,
    TestHarness,
};
