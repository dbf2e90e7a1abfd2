use msgpacker::{Packable as _, Unpackable as _};
use tessera_types::Message;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Largest frame this transport will read, guarding against a peer claiming an absurd length
/// and forcing an unbounded allocation.
const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Writes one message as a 4-byte big-endian length prefix followed by its msgpack encoding.
pub async fn write_frame<W>(writer: &mut W, message: &Message) -> anyhow::Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    let bytes = message.pack_to_vec();
    let len = u32::try_from(bytes.len()).map_err(|_| anyhow::anyhow!("message too large to frame"))?;

    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;

    Ok(())
}

/// Reads one length-prefixed, msgpack-encoded message.
///
/// Returns `Ok(None)` on a clean EOF before any bytes of a new frame arrive (the peer closed
/// the connection between messages); any other I/O or framing failure is an error.
pub async fn read_frame<R>(reader: &mut R) -> anyhow::Result<Option<Message>>
where
    R: AsyncReadExt + Unpin,
{
    let mut len_buf = [0u8; 4];

    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf);
    anyhow::ensure!(len <= MAX_FRAME_LEN, "frame of {len} bytes exceeds the {MAX_FRAME_LEN}-byte limit");

    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes).await?;

    let (_, message) = Message::unpack(&bytes)?;

    Ok(Some(message))
}

#[cfg(test)]
mod tests {
    use tessera_types::PeerId;

    use super::*;

    #[tokio::test]
    async fn a_written_frame_reads_back_identical() -> anyhow::Result<()> {
        let message = Message::Handshake {
            peer_id: PeerId::random(),
            file_hash: None,
        };

        let mut buf = Vec::new();
        write_frame(&mut buf, &message).await?;

        let mut cursor = std::io::Cursor::new(buf);
        let read = read_frame(&mut cursor).await?;

        assert_eq!(read, Some(message));

        Ok(())
    }

    #[tokio::test]
    async fn reading_from_an_empty_stream_is_a_clean_close() -> anyhow::Result<()> {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());

        assert_eq!(read_frame(&mut cursor).await?, None);

        Ok(())
    }
}
