use std::sync::Arc;

use async_trait::async_trait;
use tessera_types::{Hash, Hasher, Message, PeerId};
use tokio_util::sync::CancellationToken;

use crate::SharedFile;

/// Per-session state carried alongside a [`Peer`]: the shared file the session concerns,
/// and room for whatever else a concrete transport or handler wants to attach.
pub struct Context<H: Hasher> {
    /// The file this session is serving or downloading.
    pub shared_file: Arc<SharedFile<H>>,
}

impl<H: Hasher> Context<H> {
    /// Wraps a shared file into a fresh session context.
    pub fn new(shared_file: Arc<SharedFile<H>>) -> Self {
        Self { shared_file }
    }
}

/// A live, bidirectional session with one remote peer (C4, external).
///
/// Implementations are expected to support concurrent callers of [`Peer::send`] and
/// [`Peer::recv`]: a download session runs a receive task and a send task against the same
/// peer at once.
#[async_trait]
pub trait Peer<H: Hasher>: Send + Sync {
    /// The session state this peer was accepted or dialed with.
    fn context(&self) -> &Context<H>;

    /// Sends one message, suspending until it is written (or framing fails).
    async fn send(&self, message: Message) -> anyhow::Result<()>;

    /// Awaits the next inbound message.
    ///
    /// Returns `None` once the peer is closed and no further messages will arrive; `Some(Err)`
    /// for one malformed or unreadable frame, which does not end the session.
    async fn recv(&self) -> Option<anyhow::Result<Message>>;

    /// Tears the session down. Idempotent.
    async fn close(&self);

    /// `true` once a prior close or fatal error has torn the session down.
    fn is_closed(&self) -> bool;
}

/// Accepts inbound peer sessions (C5, external).
#[async_trait]
pub trait Server<H: Hasher>: Send + Sync {
    /// Awaits the next inbound connection.
    ///
    /// `downloading_file_hash` is the exchanger's current download target, passed through as
    /// an opaque hint the server may use however it likes (e.g. peer advertisement); it is
    /// never a filter on what gets served.
    async fn accept(
        &self,
        peer_id: PeerId,
        downloading_file_hash: Option<Hash>,
        ct: CancellationToken,
    ) -> anyhow::Result<Arc<dyn Peer<H>>>;
}

/// Dials outbound peer sessions (C5, external).
#[async_trait]
pub trait Connector<H: Hasher>: Send + Sync {
    /// Dials `host` for `shared_file`.
    ///
    /// Implementations must surface an unreachable host as a distinguished dial-timeout
    /// failure (see [`tessera_types::is_dial_timeout`]) so the exchanger can move on to the
    /// next host rather than abandon the download.
    async fn connect(
        &self,
        shared_file: Arc<SharedFile<H>>,
        host: &str,
        ct: CancellationToken,
    ) -> anyhow::Result<Arc<dyn Peer<H>>>;
}
