//! The TCP transport (C8, ambient): wire codec, handshake, and the `Peer`/`Server`/`Connector`
//! adapters that let `tessera-core`'s exchanger run against a real socket.
//!
//! The core crate only ever sees the `Peer`/`Server`/`Connector` traits; everything here is
//! plumbing so the workspace is a runnable node, not a rule about how the exchanger behaves.

pub mod codec;
mod connector;
mod handshake;
mod peer;
mod server;

pub use connector::{TcpConnector, DEFAULT_DIAL_TIMEOUT};
pub use peer::TcpPeer;
pub use server::{SharedFileRegistry, TcpServer};
