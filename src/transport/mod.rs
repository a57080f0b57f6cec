//! Transport implementations.
//!
//! Concrete implementations of the domain-level `Transport` trait, exposed
//! only through their constructor functions.
//!
//! Domain code must not depend on transport-specific types.

mod memory;
mod tls;
mod websocket;

pub use memory::{create_memory_transport, MemoryPeer};
pub use websocket::create_websocket_transport;
