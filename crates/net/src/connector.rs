use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tessera_core::{Connector, Context, Peer, SharedFile};
use tessera_types::{DialTimeout, Hasher, PeerId};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::handshake;
use crate::peer::TcpPeer;

/// Default bound on how long a single dial may take before it's treated as a dead host.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// A [`Connector`] implementation that dials TCP, bounded by a connect timeout, and
/// handshakes as the dialing side.
pub struct TcpConnector {
    peer_id: PeerId,
    dial_timeout: Duration,
}

impl TcpConnector {
    /// A connector identifying itself as `peer_id`, using [`DEFAULT_DIAL_TIMEOUT`].
    pub fn new(peer_id: PeerId) -> Self {
        Self::with_dial_timeout(peer_id, DEFAULT_DIAL_TIMEOUT)
    }

    /// A connector identifying itself as `peer_id`, bounding each dial by `dial_timeout`.
    pub fn with_dial_timeout(peer_id: PeerId, dial_timeout: Duration) -> Self {
        Self { peer_id, dial_timeout }
    }
}

#[async_trait]
impl<H> Connector<H> for TcpConnector
where
    H: Hasher + Send + Sync + 'static,
{
    async fn connect(&self, shared_file: Arc<SharedFile<H>>, host: &str, ct: CancellationToken) -> anyhow::Result<Arc<dyn Peer<H>>> {
        let dial = TcpStream::connect(host);

        let mut socket = tokio::select! {
            _ = ct.cancelled() => anyhow::bail!("connect to {host} cancelled"),
            result = tokio::time::timeout(self.dial_timeout, dial) => match result {
                Ok(Ok(socket)) => socket,
                Ok(Err(err)) => return Err(err.into()),
                Err(_) => return Err(anyhow::Error::new(DialTimeout)),
            },
        };

        handshake::exchange(&mut socket, self.peer_id, Some(shared_file.hash)).await?;

        Ok(Arc::new(TcpPeer::new(Context::new(shared_file), socket)))
    }
}
