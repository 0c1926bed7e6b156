//! Shared types for the factory realtime sync layer.
//!
//! Wire payloads, snapshot values and error types used by `factory-client`
//! and by anything that consumes its stores.

pub mod error;
pub mod models;
pub mod protocol;
pub mod snapshot;

pub use error::*;
pub use models::*;
pub use protocol::*;
pub use snapshot::*;
