//! Mocks for the interfaces of the system.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tessera_merkle::MerkleTree;
use tessera_types::{DialTimeout, Hash, Hasher, Message, PeerId, PieceIndex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{Connector, Context, HashTreeRepository, Peer, PieceStore, Server, SharedFile};

/// An in-memory peer session, wired to a counterpart [`MockPeer`] via an unbounded channel
/// in each direction.
pub struct MockPeer<H: Hasher> {
    context: Context<H>,
    outgoing: mpsc::UnboundedSender<Message>,
    incoming: Mutex<mpsc::UnboundedReceiver<Message>>,
    closed: AtomicBool,
}

impl<H: Hasher> MockPeer<H> {
    /// Creates two ends of one session, each wrapping `context_a`/`context_b` respectively.
    pub fn pair(context_a: Context<H>, context_b: Context<H>) -> (Arc<Self>, Arc<Self>) {
        let (tx_a, rx_b) = mpsc::unbounded_channel();
        let (tx_b, rx_a) = mpsc::unbounded_channel();

        let a = Arc::new(Self {
            context: context_a,
            outgoing: tx_a,
            incoming: Mutex::new(rx_a),
            closed: AtomicBool::new(false),
        });

        let b = Arc::new(Self {
            context: context_b,
            outgoing: tx_b,
            incoming: Mutex::new(rx_b),
            closed: AtomicBool::new(false),
        });

        (a, b)
    }
}

#[async_trait]
impl<H: Hasher + Send + Sync + 'static> Peer<H> for MockPeer<H> {
    fn context(&self) -> &Context<H> {
        &self.context
    }

    async fn send(&self, message: Message) -> anyhow::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            anyhow::bail!("send on a closed mock peer");
        }

        self.outgoing.send(message).ok();

        Ok(())
    }

    async fn recv(&self) -> Option<anyhow::Result<Message>> {
        self.incoming.lock().recv().await.map(Ok)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Hands out pre-registered sessions one at a time from a queue, in accept order.
pub struct MockServer<H: Hasher> {
    queue: Mutex<mpsc::UnboundedReceiver<Arc<dyn Peer<H>>>>,
    register: mpsc::UnboundedSender<Arc<dyn Peer<H>>>,
}

impl<H: Hasher> MockServer<H> {
    /// Builds an empty server; use [`Self::push`] to queue sessions it will hand out.
    pub fn new() -> Self {
        let (register, queue) = mpsc::unbounded_channel();

        Self {
            queue: Mutex::new(queue),
            register,
        }
    }

    /// Queues `peer` to be returned by the next [`Server::accept`] call.
    pub fn push(&self, peer: Arc<dyn Peer<H>>) {
        self.register.send(peer).ok();
    }
}

impl<H: Hasher> Default for MockServer<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<H: Hasher + Send + Sync + 'static> Server<H> for MockServer<H> {
    async fn accept(&self, _peer_id: PeerId, _downloading_file_hash: Option<Hash>, ct: CancellationToken) -> anyhow::Result<Arc<dyn Peer<H>>> {
        tokio::select! {
            _ = ct.cancelled() => anyhow::bail!("accept cancelled"),
            next = async { self.queue.lock().recv().await } => next.ok_or_else(|| anyhow::anyhow!("no more queued sessions")),
        }
    }
}

/// Dials by looking `host` up in a registry of pre-built peer factories.
///
/// A host with no registered factory, or one explicitly marked unreachable via
/// [`Self::mark_unreachable`], fails with [`DialTimeout`] so callers exercising host-order
/// fallback (P5) don't need a real network.
pub struct MockConnector<H: Hasher> {
    peers: Mutex<HashMap<String, Arc<dyn Peer<H>>>>,
    unreachable: Mutex<std::collections::HashSet<String>>,
    dialed: Mutex<Vec<String>>,
}

impl<H: Hasher> MockConnector<H> {
    /// An empty connector; use [`Self::register`] to make hosts dialable.
    pub fn new() -> Self {
        Self {
            peers: Mutex::new(HashMap::new()),
            unreachable: Mutex::new(std::collections::HashSet::new()),
            dialed: Mutex::new(Vec::new()),
        }
    }

    /// Makes `host` dial successfully to `peer`.
    pub fn register(&self, host: impl Into<String>, peer: Arc<dyn Peer<H>>) {
        self.peers.lock().insert(host.into(), peer);
    }

    /// Makes `host` fail every dial with [`DialTimeout`].
    pub fn mark_unreachable(&self, host: impl Into<String>) {
        self.unreachable.lock().insert(host.into());
    }

    /// Every host `connect` has been called with, in call order. Lets a test assert a host
    /// was (or wasn't) dialed at all, not just what it returned.
    pub fn dialed(&self) -> Vec<String> {
        self.dialed.lock().clone()
    }
}

impl<H: Hasher> Default for MockConnector<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<H: Hasher + Send + Sync + 'static> Connector<H> for MockConnector<H> {
    async fn connect(&self, _shared_file: Arc<SharedFile<H>>, host: &str, _ct: CancellationToken) -> anyhow::Result<Arc<dyn Peer<H>>> {
        self.dialed.lock().push(host.to_string());

        if self.unreachable.lock().contains(host) {
            return Err(anyhow::Error::new(DialTimeout));
        }

        self.peers
            .lock()
            .get(host)
            .cloned()
            .ok_or_else(|| anyhow::Error::new(DialTimeout))
    }
}

/// An in-memory hash-tree repository, keyed by root hash.
pub struct MockHashTreeRepository<H: Hasher> {
    trees: Mutex<HashMap<Hash, MerkleTree<H>>>,
    calls: Mutex<u64>,
}

impl<H: Hasher> MockHashTreeRepository<H> {
    /// An empty repository.
    pub fn new() -> Self {
        Self {
            trees: Mutex::new(HashMap::new()),
            calls: Mutex::new(0),
        }
    }

    /// How many times [`HashTreeRepository::create_or_replace`] has been called. Distinct
    /// hash values overwriting the same key wouldn't otherwise show up in `trees`' length.
    pub fn call_count(&self) -> u64 {
        *self.calls.lock()
    }
}

impl<H: Hasher> Default for MockHashTreeRepository<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<H: Hasher + Send + Sync + 'static> HashTreeRepository<H> for MockHashTreeRepository<H> {
    async fn create_or_replace(&self, tree: &MerkleTree<H>) -> anyhow::Result<()> {
        *self.calls.lock() += 1;
        self.trees.lock().insert(tree.root_hash(), tree.clone());

        Ok(())
    }

    async fn load(&self, root_hash: &Hash) -> anyhow::Result<Option<MerkleTree<H>>> {
        Ok(self.trees.lock().get(root_hash).cloned())
    }
}

/// An in-memory piece store, keyed by `(file hash, piece index)`.
#[derive(Default)]
pub struct MockPieceStore {
    pieces: Mutex<HashMap<(Hash, PieceIndex), Vec<u8>>>,
}

impl MockPieceStore {
    /// An empty piece store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PieceStore for MockPieceStore {
    async fn read_piece(&self, file_hash: &Hash, index: PieceIndex) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.pieces.lock().get(&(*file_hash, index)).cloned())
    }

    async fn write_piece(&self, file_hash: &Hash, index: PieceIndex, bytes: &[u8]) -> anyhow::Result<()> {
        self.pieces.lock().insert((*file_hash, index), bytes.to_vec());

        Ok(())
    }
}
