use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tessera_core::{Context, Peer};
use tessera_types::{Hasher, Message};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;

use crate::codec::{read_frame, write_frame};

/// A live TCP session, framed with the length-prefixed msgpack codec in [`crate::codec`].
///
/// The read half and write half are each behind their own async mutex so [`Peer::send`] and
/// [`Peer::recv`] can be called concurrently without one blocking the other, as the
/// downloading session's send and receive tasks do.
pub struct TcpPeer<H: Hasher> {
    context: Context<H>,
    reader: AsyncMutex<ReadHalf<TcpStream>>,
    writer: AsyncMutex<WriteHalf<TcpStream>>,
    closed: AtomicBool,
}

impl<H: Hasher> TcpPeer<H> {
    /// Wraps an already-handshaken socket as a peer session.
    pub(crate) fn new(context: Context<H>, socket: TcpStream) -> Self {
        let (reader, writer) = tokio::io::split(socket);

        Self {
            context,
            reader: AsyncMutex::new(reader),
            writer: AsyncMutex::new(writer),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl<H: Hasher + Send + Sync + 'static> Peer<H> for TcpPeer<H> {
    fn context(&self) -> &Context<H> {
        &self.context
    }

    async fn send(&self, message: Message) -> anyhow::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            anyhow::bail!("send on a closed peer");
        }

        let mut writer = self.writer.lock().await;

        write_frame(&mut *writer, &message).await
    }

    async fn recv(&self) -> Option<anyhow::Result<Message>> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }

        let mut reader = self.reader.lock().await;

        match read_frame(&mut *reader).await {
            Ok(Some(message)) => Some(Ok(message)),
            Ok(None) => {
                self.closed.store(true, Ordering::Release);
                None
            }
            Err(err) => Some(Err(err)),
        }
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut writer = self.writer.lock().await;
        let _ = tokio::io::AsyncWriteExt::shutdown(&mut *writer).await;
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
