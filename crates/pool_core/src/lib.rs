//! # pool_core
//!
//! Error types shared by the `slotpool` crates. Split out on its own so a
//! downstream crate that only needs the error type (e.g. to match on it in
//! `From` impls) doesn't have to pull in the allocator itself.

mod error;

pub use error::{PoolError, Result};
