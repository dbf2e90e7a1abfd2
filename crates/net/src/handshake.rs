use tessera_types::{Hash, Message, PeerId};
use tokio::net::TcpStream;

use crate::codec::{read_frame, write_frame};

/// The peer identity and declared download target learned from the other side's handshake.
pub struct RemoteHandshake {
    pub peer_id: PeerId,
    pub file_hash: Option<Hash>,
}

/// Exchanges handshakes over `socket`: writes ours first, then reads theirs.
///
/// Both sides of a connection run this the same way, so there's no "server always reads
/// first" special case to get wrong; the order only matters between the two frames of a
/// single side, not between sides.
pub async fn exchange(socket: &mut TcpStream, our_peer_id: PeerId, our_file_hash: Option<Hash>) -> anyhow::Result<RemoteHandshake> {
    write_frame(
        socket,
        &Message::Handshake {
            peer_id: our_peer_id,
            file_hash: our_file_hash,
        },
    )
    .await?;

    let message = read_frame(socket).await?.ok_or_else(|| anyhow::anyhow!("peer closed before completing the handshake"))?;

    match message {
        Message::Handshake { peer_id, file_hash } => Ok(RemoteHandshake { peer_id, file_hash }),
        other => anyhow::bail!("expected a handshake, got a {}", other.tag()),
    }
}
