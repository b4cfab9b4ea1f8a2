//! Line transport layer.
//!
//! Defines the `RpcTransport` trait for reading and writing one message per
//! line, a `StreamTransport` over any async byte streams (stdio in
//! production, in-memory buffers in tests), and a channel-backed pair.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::RpcError;

/// Trait for line-oriented message transport.
#[async_trait]
pub trait RpcTransport: Send {
    /// Read the next line, without its terminator.
    ///
    /// Returns `None` at end of stream. A blank line is `Some("")`.
    async fn receive(&mut self) -> Result<Option<String>, RpcError>;

    /// Write one line and flush it.
    async fn send(&mut self, line: &str) -> Result<(), RpcError>;
}

/// Transport over a buffered reader and a writer.
pub struct StreamTransport<R, W> {
    reader: R,
    writer: W,
    buf: Vec<u8>,
}

/// Reads stdin, writes stdout.
pub type StdioTransport = StreamTransport<BufReader<tokio::io::Stdin>, tokio::io::Stdout>;

impl StdioTransport {
    /// Create a transport over the process's standard streams.
    pub fn stdio() -> Self {
        StreamTransport::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> StreamTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            buf: Vec::new(),
        }
    }

    /// Consume the transport and return the writer (for inspecting output in tests).
    pub fn into_writer(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<R, W> RpcTransport for StreamTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn receive(&mut self) -> Result<Option<String>, RpcError> {
        self.buf.clear();
        let bytes_read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if bytes_read == 0 {
            return Ok(None); // EOF
        }
        if self.buf.ends_with(b"\n") {
            self.buf.pop();
            if self.buf.ends_with(b"\r") {
                self.buf.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }

    async fn send(&mut self, line: &str) -> Result<(), RpcError> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// In-memory transport for testing, backed by channel pairs.
pub struct ChannelTransport {
    rx: tokio::sync::mpsc::Receiver<String>,
    tx: tokio::sync::mpsc::Sender<String>,
}

impl ChannelTransport {
    /// Create a pair of connected transports.
    ///
    /// Lines sent on one transport are received by the other.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_b) = tokio::sync::mpsc::channel(32);
        let (tx_b, rx_a) = tokio::sync::mpsc::channel(32);
        (Self { rx: rx_a, tx: tx_a }, Self { rx: rx_b, tx: tx_b })
    }
}

#[async_trait]
impl RpcTransport for ChannelTransport {
    async fn receive(&mut self) -> Result<Option<String>, RpcError> {
        Ok(self.rx.recv().await)
    }

    async fn send(&mut self, line: &str) -> Result<(), RpcError> {
        self.tx.send(line.to_string()).await.map_err(|e| {
            RpcError::Transport(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stream_transport_lines() {
        let input: &[u8] = b"first\r\n\nthird";
        let mut t = StreamTransport::new(input, Vec::new());

        assert_eq!(t.receive().await.unwrap(), Some("first".to_string()));
        assert_eq!(t.receive().await.unwrap(), Some(String::new()));
        assert_eq!(t.receive().await.unwrap(), Some("third".to_string()));
        assert_eq!(t.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stream_transport_lossy_utf8() {
        let input: &[u8] = b"ab\xffcd\n";
        let mut t = StreamTransport::new(input, Vec::new());
        let line = t.receive().await.unwrap().unwrap();
        assert!(line.starts_with("ab"));
        assert!(line.ends_with("cd"));
    }

    #[tokio::test]
    async fn test_stream_transport_send_appends_newline() {
        let mut t = StreamTransport::new(&b""[..], Vec::new());
        t.send("{\"a\":1}").await.unwrap();
        t.send("two").await.unwrap();
        assert_eq!(t.into_writer(), b"{\"a\":1}\ntwo\n".to_vec());
    }

    #[tokio::test]
    async fn test_channel_transport_pair() {
        let (mut a, mut b) = ChannelTransport::pair();

        a.send("hello from a").await.unwrap();
        assert_eq!(b.receive().await.unwrap(), Some("hello from a".to_string()));

        b.send("hello from b").await.unwrap();
        assert_eq!(a.receive().await.unwrap(), Some("hello from b".to_string()));
    }

    #[tokio::test]
    async fn test_channel_transport_closed() {
        let (mut a, b) = ChannelTransport::pair();
        drop(b);
        assert_eq!(a.receive().await.unwrap(), None);
    }
}
