//! Durable storage for a single opaque session identifier.
//!
//! The store holds exactly one value in a plain-text file. Writes replace the
//! file atomically so a concurrent reader never observes a torn identifier,
//! and a crash between turns loses at most the in-flight turn.

mod error;
mod store;

pub use error::SessionStoreError;
pub use store::SessionStore;
