//! Native messaging frames: a 4-byte native-endian length followed by UTF-8 JSON.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// The browser refuses host messages larger than this.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Reads one frame; `None` on a clean end of stream between frames.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Value>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err).context("failed to read frame header"),
    }

    let len = u32::from_ne_bytes(header) as usize;
    if len > MAX_FRAME_BYTES {
        bail!("frame of {len} bytes exceeds the {MAX_FRAME_BYTES} byte limit");
    }

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .context("stream ended inside a frame")?;

    serde_json::from_slice(&body)
        .map(Some)
        .context("frame is not valid JSON")
}

pub async fn write_frame<W>(writer: &mut W, message: &Value) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(message).context("failed to encode frame")?;
    if body.len() > MAX_FRAME_BYTES {
        bail!(
            "outgoing frame of {} bytes exceeds the {MAX_FRAME_BYTES} byte limit",
            body.len()
        );
    }

    let len = u32::try_from(body.len()).context("frame length overflows u32")?;
    writer.write_all(&len.to_ne_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await.context("failed to flush frame")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn frames_cross_a_pipe_in_order() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        write_frame(&mut client, &json!({ "type": "surfaceRemoved", "surfaceId": 7 }))
            .await
            .unwrap();
        write_frame(&mut client, &json!("Разговор")).await.unwrap();
        drop(client);

        assert_eq!(
            read_frame(&mut server).await.unwrap(),
            Some(json!({ "type": "surfaceRemoved", "surfaceId": 7 }))
        );
        assert_eq!(read_frame(&mut server).await.unwrap(), Some(json!("Разговор")));
        assert_eq!(read_frame(&mut server).await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_length_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let len = (MAX_FRAME_BYTES as u32 + 1).to_ne_bytes();
        client.write_all(&len).await.unwrap();

        assert!(read_frame(&mut server).await.is_err());
    }

    #[tokio::test]
    async fn truncated_body_is_an_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&10u32.to_ne_bytes()).await.unwrap();
        client.write_all(b"{\"a\"").await.unwrap();
        drop(client);

        assert!(read_frame(&mut server).await.is_err());
    }
}
