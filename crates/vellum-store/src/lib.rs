//! vellum-store: the two blob ports
//!
//! The local cache and the untrusted remote speak the same artifact
//! namespace through [`Store`], a thin opendal wrapper with role-aware
//! error mapping: cache failures are `Storage`, remote failures are
//! `Network`. Absence is always `Ok(None)`, so callers distinguish
//! "not there" from "could not reach".

pub mod artifact;
pub mod operator;
pub mod store;

pub use operator::{fs_store, memory_store, s3_store};
pub use store::{Store, StoreRole};
