//! Shared helpers for labcompare integration tests.
//!
//! - Builders for structured reports and upload files
//! - `TestHarness`: a session over a temp-file SQLite backend
//! - `ScriptedApi`: a backend whose `get` answers come from a script

#![allow(dead_code)]

pub mod builders;
pub mod harness;
pub mod scripted;

pub use builders::*;
pub use harness::TestHarness;
pub use scripted::ScriptedApi;
