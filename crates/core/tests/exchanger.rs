use std::sync::Arc;
use std::time::Duration;

use tessera_core::mocks::{MockConnector, MockHashTreeRepository, MockPeer, MockPieceStore, MockServer};
use tessera_core::{Context, Exchanger, HandlerResolver, Peer, PieceRequestHandler, PieceResponseHandler, PieceStore, SharedFile};
use tessera_types::{Blake3Hasher, Hash, Hasher, Message, PeerId};
use tokio_util::sync::CancellationToken;

fn resolver(piece_store: Arc<MockPieceStore>) -> HandlerResolver<Blake3Hasher> {
    HandlerResolver::new()
        .with_handler("piece-request", PieceRequestHandler::new(piece_store.clone()))
        .with_handler("piece-response", PieceResponseHandler::new(piece_store))
}

fn pieces(n: usize) -> Vec<Vec<u8>> {
    (0..n).map(|i| vec![i as u8; 16]).collect()
}

async fn seed_piece_store(store: &MockPieceStore, file_hash: Hash, bytes: &[Vec<u8>]) {
    for (index, piece) in bytes.iter().enumerate() {
        store.write_piece(&file_hash, index as u64, piece).await.unwrap();
    }
}

/// Drives one side of a [`MockPeer`] pair: replies to every inbound message via `resolver`
/// until the peer closes.
async fn pump<H: Hasher + Send + Sync + 'static>(peer: Arc<MockPeer<H>>, resolver: Arc<HandlerResolver<H>>) {
    while let Some(received) = peer.recv().await {
        let message = received.expect("mock peer never produces malformed frames");
        let outcome = resolver.dispatch(peer.context(), &message).await.expect("handler must not fail in this test");

        if let Some(reply) = outcome.payload {
            peer.send(reply).await.expect("mock peer send never fails while open");
        }
    }
}

#[tokio::test]
async fn a_download_session_fetches_every_piece_from_one_seeder() {
    let bytes = pieces(5);
    let hashes = bytes.iter().map(|b| Blake3Hasher::hash(b)).collect::<Vec<_>>();
    let seeder_file = Arc::new(SharedFile::<Blake3Hasher>::from_pieces(&hashes));
    let file_hash = seeder_file.hash;

    let seeder_store = Arc::new(MockPieceStore::new());
    seed_piece_store(&seeder_store, file_hash, &bytes).await;

    let downloader_file = Arc::new(SharedFile::<Blake3Hasher>::empty(file_hash, 5));
    let downloader_store = Arc::new(MockPieceStore::new());

    let (seeder_peer, downloader_peer) = MockPeer::pair(Context::new(seeder_file.clone()), Context::new(downloader_file.clone()));

    let seeder_resolver = Arc::new(resolver(seeder_store.clone()));
    let downloader_resolver = Arc::new(resolver(downloader_store.clone()));

    let seeder_task = tokio::spawn(pump(seeder_peer.clone(), seeder_resolver));

    for index in 0..5u64 {
        downloader_peer.send(Message::PieceRequest { index }).await.unwrap();
    }

    for _ in 0..5 {
        let message = downloader_peer.recv().await.unwrap().unwrap();
        let outcome = downloader_resolver.dispatch(downloader_peer.context(), &message).await.unwrap();
        assert!(outcome.payload.is_none());
    }

    assert!(downloader_file.with_tree(|t| t.get_leaf_states().iter().all(|&h| h)));

    for index in 0..5u64 {
        let got = downloader_store.read_piece(&file_hash, index).await.unwrap().unwrap();
        assert_eq!(got, bytes[index as usize]);
    }

    downloader_peer.close().await;
    let _ = seeder_task.await;
}

#[tokio::test]
async fn retargeting_a_download_waits_for_the_prior_one_to_stop() {
    let bytes = pieces(1);
    let hashes = bytes.iter().map(|b| Blake3Hasher::hash(b)).collect::<Vec<_>>();
    let seeder_file = Arc::new(SharedFile::<Blake3Hasher>::from_pieces(&hashes));
    let file_hash = seeder_file.hash;

    let server = Arc::new(MockServer::<Blake3Hasher>::new());
    let connector = Arc::new(MockConnector::<Blake3Hasher>::new());
    let repository = Arc::new(MockHashTreeRepository::<Blake3Hasher>::new());
    let piece_store = Arc::new(MockPieceStore::new());

    connector.mark_unreachable("ghost-host");

    let exchanger = Exchanger::new(PeerId::random(), server, connector, repository, resolver(piece_store));

    let downloader_file = Arc::new(SharedFile::<Blake3Hasher>::empty(file_hash, 1));

    let ct = CancellationToken::new();
    exchanger.start_downloading(vec!["ghost-host".to_string()], downloader_file.clone(), ct.clone()).await;

    tokio::time::sleep(Duration::from_millis(50)).await;

    // Retargeting at the same file while the (doomed) download is winding down must not panic
    // or deadlock, and must leave exactly one download in flight afterwards.
    exchanger.start_downloading(vec!["ghost-host".to_string()], downloader_file, ct.clone()).await;

    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(exchanger.get_downloading_file(), None);

    ct.cancel();
}

#[tokio::test]
async fn try_download_stops_at_the_first_host_that_connects_even_if_it_serves_nothing() {
    let bytes = pieces(1);
    let hashes = bytes.iter().map(|b| Blake3Hasher::hash(b)).collect::<Vec<_>>();
    let seeder_file = Arc::new(SharedFile::<Blake3Hasher>::from_pieces(&hashes));
    let file_hash = seeder_file.hash;

    let server = Arc::new(MockServer::<Blake3Hasher>::new());
    let connector = Arc::new(MockConnector::<Blake3Hasher>::new());
    let repository = Arc::new(MockHashTreeRepository::<Blake3Hasher>::new());
    let piece_store = Arc::new(MockPieceStore::new());

    connector.mark_unreachable("h1");

    let downloader_file = Arc::new(SharedFile::<Blake3Hasher>::empty(file_hash, 1));

    // h2 accepts the dial but serves nothing: the remote end is dropped immediately, so the
    // downloader's receive task observes a clean close with zero messages delivered.
    let (h2_peer, h2_remote) = MockPeer::pair(Context::new(downloader_file.clone()), Context::new(seeder_file.clone()));
    connector.register("h2", h2_peer);
    drop(h2_remote);

    let exchanger = Exchanger::new(PeerId::random(), server, connector.clone(), repository.clone(), resolver(piece_store));

    let ct = CancellationToken::new();
    exchanger
        .start_downloading(vec!["h1".to_string(), "h2".to_string(), "h3".to_string()], downloader_file, ct.clone())
        .await;

    tokio::time::sleep(Duration::from_millis(50)).await;

    // h1 timed out, h2 was dialed and ran a (empty) session, h3 must never be contacted even
    // though it's next in the host list.
    assert_eq!(connector.dialed(), vec!["h1".to_string(), "h2".to_string()]);
    assert_eq!(repository.call_count(), 1);
    assert_eq!(exchanger.get_downloading_file(), None);

    ct.cancel();
}
