use std::sync::Arc;

use parking_lot::Mutex;
use tessera_types::{is_dial_timeout, Hash, Hasher, Message, PeerId};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{Connector, Context, HandlerResolver, HashTreeRepository, Peer, Server, SharedFile};

/// Mutable state tracking the single in-flight download, if any (C7).
///
/// Held behind a [`parking_lot::Mutex`] on [`Exchanger`] rather than split into several
/// fields: the three pieces of state (target file, cancellation handle, task handle) are
/// only ever meaningful together, and `start_downloading` needs to swap all three out
/// atomically when retargeting.
#[derive(Default)]
struct DownloadState {
    downloading_file_hash: Option<Hash>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

/// Orchestrates concurrent serving and downloading sessions over one peer identity (C7).
///
/// Generic over the hash function (`H`), the server and connector transports (`Srv`,
/// `Conn`), and the hash-tree repository (`Repo`), so a caller can wire in the concrete
/// `tessera-net`/`tessera-store` types, or mocks for testing.
pub struct Exchanger<H: Hasher, Srv, Conn, Repo> {
    peer_id: PeerId,
    server: Arc<Srv>,
    connector: Arc<Conn>,
    repository: Arc<Repo>,
    resolver: Arc<HandlerResolver<H>>,
    state: Arc<Mutex<DownloadState>>,
}

impl<H, Srv, Conn, Repo> Exchanger<H, Srv, Conn, Repo>
where
    H: Hasher + Send + Sync + 'static,
    Srv: Server<H> + 'static,
    Conn: Connector<H> + 'static,
    Repo: HashTreeRepository<H> + 'static,
{
    /// Builds an exchanger for `peer_id`, backed by the given transport and repository.
    pub fn new(peer_id: PeerId, server: Arc<Srv>, connector: Arc<Conn>, repository: Arc<Repo>, resolver: HandlerResolver<H>) -> Self {
        Self {
            peer_id,
            server,
            connector,
            repository,
            resolver: Arc::new(resolver),
            state: Arc::new(Mutex::new(DownloadState::default())),
        }
    }

    /// This node's peer identity.
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// The file currently being downloaded, if any.
    pub fn get_downloading_file(&self) -> Option<Hash> {
        self.state.lock().downloading_file_hash
    }

    /// Accepts and serves inbound connections until `ct` is cancelled.
    ///
    /// Each accepted session is handled on its own detached task (`tokio::spawn`, never
    /// joined): a server has no notion of "done", and there is nothing useful to do with a
    /// serving task's result except let it run until the peer disconnects or `ct` fires.
    /// This is the deliberate asymmetry with [`Self::start_downloading`], whose task is
    /// joined so retargeting can wait for the old download to actually stop.
    pub async fn start_distributing(&self, ct: CancellationToken) -> anyhow::Result<()> {
        loop {
            let downloading = self.get_downloading_file();

            let peer = tokio::select! {
                _ = ct.cancelled() => return Ok(()),
                accepted = self.server.accept(self.peer_id, downloading, ct.child_token()) => accepted?,
            };

            let resolver = self.resolver.clone();
            let session_ct = ct.child_token();

            tokio::spawn(async move {
                if let Err(err) = serve_session(peer, resolver, session_ct).await {
                    tracing::warn!("serving session ended with an error: {err:#}");
                }
            });
        }
    }

    /// Retargets the exchanger at a new download.
    ///
    /// If a download is already in flight, its task is cancelled and awaited to completion
    /// *before* the new one starts, so the method is idempotent: calling it twice in a row
    /// with the same target leaves exactly one download running, never two racing over the
    /// same [`SharedFile`].
    pub async fn start_downloading(&self, hosts: Vec<String>, shared_file: Arc<SharedFile<H>>, ct: CancellationToken) {
        let prior = {
            let mut state = self.state.lock();
            state.cancel.take().map(|c| c.cancel());
            state.task.take()
        };

        if let Some(task) = prior {
            let _ = task.await;
        }

        let file_hash = shared_file.hash;
        let session_ct = ct.child_token();

        let connector = self.connector.clone();
        let repository = self.repository.clone();
        let resolver = self.resolver.clone();
        let state_for_task = self.state.clone();

        // Publish before spawning: the spawned task clears this same state on completion, and
        // on a multi-threaded runtime it can reach that cleanup before we'd otherwise get the
        // lock back, which would wipe out state for a task that was never made visible.
        let mut state = self.state.lock();
        state.downloading_file_hash = Some(file_hash);
        state.cancel = Some(session_ct.clone());

        let task = tokio::spawn(try_download(connector, repository, resolver, hosts, shared_file, session_ct, state_for_task));
        state.task = Some(task);
    }
}

/// Walks `hosts` in order, dialing each until one accepts, then runs the download session
/// against it. A [`tessera_types::DialTimeout`] moves on to the next host (P5: host order is
/// significant, and a dead host must not abort the whole download); any other dial error is
/// treated the same way, since there's nothing more specific the exchanger can do about it.
///
/// Stops at the first host that successfully connects, persists once, and returns — whether
/// or not the session served any pieces. A host that accepts and then serves nothing still
/// counts as "tried"; the remaining hosts are never contacted for this download attempt.
///
/// Clears the shared download state when done, whether by exhausting `hosts`, succeeding,
/// or being cancelled, so a finished download doesn't linger as "still downloading".
async fn try_download<H, Conn, Repo>(
    connector: Arc<Conn>,
    repository: Arc<Repo>,
    resolver: Arc<HandlerResolver<H>>,
    hosts: Vec<String>,
    shared_file: Arc<SharedFile<H>>,
    ct: CancellationToken,
    state: Arc<Mutex<DownloadState>>,
) where
    H: Hasher + Send + Sync + 'static,
    Conn: Connector<H>,
    Repo: HashTreeRepository<H>,
{
    for host in &hosts {
        if ct.is_cancelled() {
            break;
        }

        let peer = match connector.connect(shared_file.clone(), host, ct.child_token()).await {
            Ok(peer) => peer,
            Err(err) if is_dial_timeout(&err) => {
                tracing::debug!("dial to {host} timed out, trying next host");
                continue;
            }
            Err(err) => {
                tracing::warn!("dial to {host} failed: {err:#}");
                continue;
            }
        };

        if let Err(err) = handle_downloading_peer(peer, resolver.clone(), ct.child_token()).await {
            tracing::warn!("download session with {host} ended with an error: {err:#}");
        }

        if let Err(err) = repository.create_or_replace(&shared_file.snapshot()).await {
            tracing::warn!("failed to persist hash tree for {}: {err:#}", shared_file.hash);
        }

        break;
    }

    let mut state = state.lock();
    state.downloading_file_hash = None;
    state.cancel = None;
    state.task = None;
}

/// Runs one download session: a receive task verifying and absorbing incoming pieces, and a
/// send task requesting whichever pieces are still missing, concurrently against the same
/// peer.
///
/// Uses `tokio::select!` to race the two: whichever finishes first (the send task runs out
/// of pieces to request, or the receive task sees the peer close) cancels the other's child
/// token, then the loser is *awaited* rather than abandoned, so neither task is ever leaked
/// running after this function returns.
async fn handle_downloading_peer<H>(peer: Arc<dyn Peer<H>>, resolver: Arc<HandlerResolver<H>>, ct: CancellationToken) -> anyhow::Result<()>
where
    H: Hasher + Send + Sync + 'static,
{
    let receive_ct = ct.child_token();
    let send_ct = ct.child_token();

    let recv_peer = peer.clone();
    let mut receive_task = tokio::spawn(start_receiving(recv_peer, resolver, receive_ct.clone()));

    let send_peer = peer.clone();
    let mut send_task = tokio::spawn(send_requests(send_peer, send_ct.clone()));

    let result = tokio::select! {
        r = &mut receive_task => {
            send_ct.cancel();
            let _ = send_task.await;
            r
        }
        r = &mut send_task => {
            receive_ct.cancel();
            let _ = receive_task.await;
            r
        }
    };

    peer.close().await;

    result?
}

/// Receives messages from `peer` until it closes or `ct` is cancelled, dispatching each to
/// the resolver. A malformed frame (`Some(Err)`) is logged and skipped rather than ending
/// the session: one bad frame from an otherwise-useful peer shouldn't cost the whole
/// connection.
async fn start_receiving<H>(peer: Arc<dyn Peer<H>>, resolver: Arc<HandlerResolver<H>>, ct: CancellationToken) -> anyhow::Result<()>
where
    H: Hasher + Send + Sync + 'static,
{
    loop {
        let received = tokio::select! {
            _ = ct.cancelled() => return Ok(()),
            received = peer.recv() => received,
        };

        match received {
            None => return Ok(()),
            Some(Err(err)) => {
                tracing::debug!("malformed frame from peer: {err:#}");
                continue;
            }
            Some(Ok(message)) => {
                let outcome = resolver.dispatch(peer.context(), &message).await?;

                if outcome.needs_reply {
                    if let Some(reply) = outcome.payload {
                        peer.send(reply).await?;
                    }
                }
            }
        }
    }
}

/// Sends a [`Message::PieceRequest`] for every piece not yet held, then closes the peer if
/// nothing else has already done so.
///
/// Leaf states are read once, up front: new pieces arriving mid-loop (via the concurrently
/// running receive task) are simply picked up on the *next* download attempt against this or
/// another host, not mid-request-burst. This keeps one send pass's piece list stable.
async fn send_requests<H>(peer: Arc<dyn Peer<H>>, ct: CancellationToken) -> anyhow::Result<()>
where
    H: Hasher + Send + Sync + 'static,
{
    let leaf_states = peer.context().shared_file.with_tree(|tree| tree.get_leaf_states());

    for (index, held) in leaf_states.iter().enumerate() {
        if *held {
            continue;
        }

        if ct.is_cancelled() {
            return Ok(());
        }

        peer.send(Message::PieceRequest { index: index as u64 }).await?;
    }

    if !peer.is_closed() {
        peer.close().await;
    }

    Ok(())
}

/// Serves one accepted peer session until it closes or `ct` is cancelled.
async fn serve_session<H>(peer: Arc<dyn Peer<H>>, resolver: Arc<HandlerResolver<H>>, ct: CancellationToken) -> anyhow::Result<()>
where
    H: Hasher + Send + Sync + 'static,
{
    start_receiving(peer, resolver, ct).await
}
