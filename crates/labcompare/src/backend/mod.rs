//! In-process comparison backend.

mod local;

pub use local::LocalBackend;
