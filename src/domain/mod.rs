//! Domain layer public interface.
//!
//! Abstractions here are independent of the concrete socket, TLS stack, and
//! wire protocol. Consumers import through this module, not the files.

mod transport;

pub use transport::{
    //
    Frame,
    Inbound,
    LinkStatus,
    Transport,
    TransportBase,
    TransportPtr,
};
