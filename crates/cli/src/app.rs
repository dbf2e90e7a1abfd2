use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tessera_core::{Exchanger, HandlerResolver, HashTreeRepository, PieceRequestHandler, PieceResponseHandler, PieceStore, SharedFile};
use tessera_net::{SharedFileRegistry, TcpConnector, TcpServer};
use tessera_store::{DataBackendHashTreeRepository, FilePieceStore, SledBackend};
use tessera_types::{Blake3Hasher, Hash, Hasher as _, PeerId};
use tokio_util::sync::CancellationToken;

use crate::config::Config;

type Repository = DataBackendHashTreeRepository<SledBackend>;
type NodeExchanger = Exchanger<Blake3Hasher, TcpServer<Blake3Hasher>, TcpConnector, Repository>;

/// Wires the exchanger, transport, and storage ports together into one runnable node.
///
/// This is the ambient "ties it all together" layer the core deliberately has no opinion
/// about: everything it holds is a concrete adapter built against the trait ports
/// `tessera-core` defines.
pub struct App {
    registry: Arc<SharedFileRegistry<Blake3Hasher>>,
    repository: Arc<Repository>,
    piece_store: Arc<FilePieceStore>,
    exchanger: Arc<NodeExchanger>,
}

impl App {
    /// Binds the server, opens the data directory, and builds the exchanger.
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let peer_id = PeerId::random();
        tracing::info!("starting node {peer_id}");

        let registry = Arc::new(SharedFileRegistry::new());
        let server = Arc::new(TcpServer::bind(&config.listen_addr, registry.clone()).await?);
        let connector = Arc::new(TcpConnector::with_dial_timeout(peer_id, Duration::from_secs(config.dial_timeout_secs)));

        let backend = SledBackend::open(config.data_dir.join("hash-trees"))?;
        let repository = Arc::new(DataBackendHashTreeRepository::new(backend));

        let piece_store = Arc::new(FilePieceStore::with_piece_size(config.data_dir.join("pieces"), config.piece_size));

        let resolver = HandlerResolver::new()
            .with_handler("piece-request", PieceRequestHandler::new(piece_store.clone()))
            .with_handler("piece-response", PieceResponseHandler::new(piece_store.clone()));

        let exchanger = Arc::new(Exchanger::new(peer_id, server, connector, repository.clone(), resolver));

        Ok(Self {
            registry,
            repository,
            piece_store,
            exchanger,
        })
    }

    /// Hashes `file` into pieces, persists the resulting tree, registers it as servable, and
    /// serves it until interrupted.
    pub async fn seed(&self, file: &Path, piece_size: usize) -> anyhow::Result<()> {
        let bytes = tokio::fs::read(file).await?;
        let pieces = bytes.chunks(piece_size.max(1)).map(|c| c.to_vec()).collect::<Vec<_>>();

        anyhow::ensure!(!pieces.is_empty(), "{} is empty; nothing to seed", file.display());

        let hashes = pieces.iter().map(|p| Blake3Hasher::hash(p)).collect::<Vec<_>>();
        let shared_file = Arc::new(SharedFile::<Blake3Hasher>::from_pieces(&hashes));

        for (index, piece) in pieces.iter().enumerate() {
            self.piece_store.write_piece(&shared_file.hash, index as u64, piece).await?;
        }

        self.repository.create_or_replace(&shared_file.snapshot()).await?;
        self.registry.register(shared_file.clone());

        tracing::info!("seeding {} as {} ({} pieces)", file.display(), shared_file.hash, pieces.len());

        self.run_until_interrupted().await
    }

    /// Registers `root_hash` as a download target, starts serving (so already-downloaded
    /// pieces become available to other peers immediately), and downloads from `hosts` in
    /// order until the download session completes or the process is interrupted.
    pub async fn download(&self, root_hash: Hash, piece_count: u64, hosts: Vec<String>) -> anyhow::Result<()> {
        let shared_file = match self.repository.load(&root_hash).await? {
            Some(tree) => Arc::new(SharedFile::new(root_hash, tree)),
            None => Arc::new(SharedFile::<Blake3Hasher>::empty(root_hash, piece_count)),
        };

        self.registry.register(shared_file.clone());

        let distribute_ct = CancellationToken::new();
        let exchanger = self.exchanger.clone();
        let serve_ct = distribute_ct.clone();

        tokio::spawn(async move {
            if let Err(err) = exchanger.start_distributing(serve_ct).await {
                tracing::warn!("serving loop ended with an error: {err:#}");
            }
        });

        let download_ct = CancellationToken::new();
        self.exchanger.start_downloading(hosts, shared_file, download_ct.clone()).await;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("interrupted; cancelling download");
                    download_ct.cancel();
                    break;
                }
                _ = tokio::time::sleep(Duration::from_millis(200)) => {
                    if self.exchanger.get_downloading_file().is_none() {
                        break;
                    }
                }
            }
        }

        distribute_ct.cancel();

        Ok(())
    }

    /// Runs the serving loop only, against whatever this node has already registered.
    pub async fn serve(&self) -> anyhow::Result<()> {
        self.run_until_interrupted().await
    }

    async fn run_until_interrupted(&self) -> anyhow::Result<()> {
        let ct = CancellationToken::new();
        let serve_ct = ct.clone();

        let serving = tokio::spawn({
            let exchanger = self.exchanger.clone();
            async move { exchanger.start_distributing(serve_ct).await }
        });

        tokio::signal::ctrl_c().await?;
        tracing::info!("interrupted; shutting down");
        ct.cancel();

        serving.await??;

        Ok(())
    }
}
