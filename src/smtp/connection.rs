use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Thin wrapper over the client stream. Replies always go out with a
/// trailing CRLF.
pub struct Connection<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> {
    stream: Stream,
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> Connection<Stream> {
    pub(crate) const fn new(stream: Stream) -> Self {
        Self { stream }
    }

    pub(crate) async fn send<S: core::fmt::Display + Send + Sync>(
        &mut self,
        response: &S,
    ) -> std::io::Result<usize> {
        self.stream
            .write(format!("{response}\r\n").as_bytes())
            .await
    }

    pub(crate) async fn receive(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.stream.read(buf).await
    }
}
