//! Core foundations for the Luxera lighting-design engine
//!
//! - `error`: structured error types using thiserror
//! - `identity`: content-addressed ids and canonical hashing
//! - `tolerance`: geometric epsilons shared by all predicates

pub mod error;
pub mod identity;
pub mod tolerance;

pub use error::{LuxeraError, Result};
pub use identity::{
    canonical_bytes, canonicalize, content_hash_of, derived_id, sha256_file, sha256_hex, stable_id,
};
pub use tolerance::{EPS_PLANE, EPS_POS};
