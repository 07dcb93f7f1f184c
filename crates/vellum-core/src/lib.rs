//! vellum-core: shared error taxonomy, config schema, and time helpers

pub mod config;
pub mod error;
pub mod time;

pub use error::{VellumError, VellumResult};
pub use time::{now_ms, Timestamp};
