use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Size of the single read performed on each accepted connection.
pub const READ_BUFFER_SIZE: usize = 1024;

/// The reply sent back to a peer after its first read of `len` bytes.
pub fn reply_for(len: usize) -> String {
    format!("Received message {len} bytes long\n")
}

/// Service one accepted TCP connection: one read, one reply, then close.
///
/// A read error, or a peer that closes without sending anything, gets no
/// reply. Only the first read is counted; anything beyond `READ_BUFFER_SIZE` bytes
/// (or sent after that read) is discarded when the stream is dropped.
pub async fn handle_connection<S>(mut stream: S)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(e) = exchange(&mut stream).await {
        warn!("Error reading/writing connection: {e}");
    }
    let _ = stream.shutdown().await;
}

async fn exchange<S>(stream: &mut S) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let n = stream.read(&mut buf).await?;
    if n == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "peer closed before sending data",
        ));
    }
    debug!("Read {n} bytes from connection");
    stream.write_all(reply_for(n).as_bytes()).await?;
    stream.flush().await
}
