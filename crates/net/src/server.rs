use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tessera_core::{Context, Peer, Server, SharedFile};
use tessera_types::{Hash, Hasher, PeerId};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::handshake;
use crate::peer::TcpPeer;

/// The set of files this node is currently willing to serve, keyed by root hash.
///
/// A [`TcpServer`] has no notion of which files exist on its own; the CLI (or any other
/// caller) registers a [`SharedFile`] here once it has been seeded or fully downloaded, and
/// the accept loop looks a connecting peer's declared file of interest up in it.
#[derive(Default)]
pub struct SharedFileRegistry<H: Hasher> {
    files: Mutex<HashMap<Hash, Arc<SharedFile<H>>>>,
}

impl<H: Hasher> SharedFileRegistry<H> {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `file` servable to peers that declare interest in its hash.
    pub fn register(&self, file: Arc<SharedFile<H>>) {
        self.files.lock().insert(file.hash, file);
    }

    /// Stops serving `hash`, if it was registered.
    pub fn unregister(&self, hash: &Hash) {
        self.files.lock().remove(hash);
    }

    fn get(&self, hash: &Hash) -> Option<Arc<SharedFile<H>>> {
        self.files.lock().get(hash).cloned()
    }
}

/// A [`Server`] implementation that accepts TCP connections, handshakes, and binds each
/// accepted peer to whichever registered [`SharedFile`] the remote side declared interest in.
pub struct TcpServer<H: Hasher> {
    listener: TcpListener,
    registry: Arc<SharedFileRegistry<H>>,
}

impl<H: Hasher> TcpServer<H> {
    /// Binds a listener at `addr`, serving files out of `registry`.
    pub async fn bind(addr: &str, registry: Arc<SharedFileRegistry<H>>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;

        Ok(Self { listener, registry })
    }

    /// The local address this server is bound to.
    pub fn local_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

#[async_trait]
impl<H> Server<H> for TcpServer<H>
where
    H: Hasher + Send + Sync + 'static,
{
    /// Accepts connections until one declares interest in a file this node currently serves.
    ///
    /// A connection whose declared file isn't registered is handshaken, logged, and dropped;
    /// the loop keeps accepting rather than surfacing that as a fatal error, since one
    /// uninteresting peer shouldn't stall `start_distributing` for every other peer.
    async fn accept(&self, peer_id: PeerId, downloading_file_hash: Option<Hash>, ct: CancellationToken) -> anyhow::Result<Arc<dyn Peer<H>>> {
        loop {
            let (mut socket, remote_addr) = tokio::select! {
                _ = ct.cancelled() => anyhow::bail!("accept cancelled"),
                accepted = self.listener.accept() => accepted?,
            };

            let remote = match handshake::exchange(&mut socket, peer_id, downloading_file_hash).await {
                Ok(remote) => remote,
                Err(err) => {
                    tracing::debug!("handshake with {remote_addr} failed: {err:#}");
                    continue;
                }
            };

            let Some(file_hash) = remote.file_hash else {
                tracing::debug!("{remote_addr} declared no file of interest; dropping");
                continue;
            };

            let Some(shared_file) = self.registry.get(&file_hash) else {
                tracing::debug!("{remote_addr} asked for an unknown file {file_hash}; dropping");
                continue;
            };

            tracing::info!("accepted {remote_addr} ({}) for file {file_hash}", remote.peer_id);

            return Ok(Arc::new(TcpPeer::new(Context::new(shared_file), socket)));
        }
    }
}
