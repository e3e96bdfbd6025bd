use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use rustls_acme::futures_rustls::server::TlsStream;
use trillium_server_common::{AsyncRead, AsyncWrite, Transport};

/// The transport produced by the `tls-alpn-01` acceptor.
///
/// It is either a TLS stream for a non-challenge handshake, or a connection that was already
/// answered and closed by an `acme-tls/1` handshake, which reads as end of stream and discards
/// writes.
#[derive(Debug)]
pub struct ChallengeTransport<Input>(Option<Box<TlsStream<Input>>>);

impl<Input> ChallengeTransport<Input> {
    pub(crate) fn answered() -> Self {
        Self(None)
    }

    pub(crate) fn tls(stream: TlsStream<Input>) -> Self {
        Self(Some(Box::new(stream)))
    }

    /// Whether the connection was closed after answering a challenge handshake.
    pub fn is_answered(&self) -> bool {
        self.0.is_none()
    }
}

impl<Input> ChallengeTransport<Input>
where
    Input: Transport,
{
    fn stream(self: Pin<&mut Self>) -> Option<Pin<&mut TlsStream<Input>>> {
        self.get_mut().0.as_deref_mut().map(Pin::new)
    }

    fn with_input<T>(
        &mut self,
        answered: T,
        f: impl FnOnce(&mut Input) -> io::Result<T>,
    ) -> io::Result<T> {
        match self.0.as_deref_mut() {
            None => Ok(answered),
            Some(tls) => f(tls.get_mut().0),
        }
    }
}

impl<Input> AsyncRead for ChallengeTransport<Input>
where
    Input: Transport,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        match self.stream() {
            None => Poll::Ready(Ok(0)),
            Some(tls) => tls.poll_read(cx, buf),
        }
    }

    fn poll_read_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &mut [io::IoSliceMut<'_>],
    ) -> Poll<io::Result<usize>> {
        match self.stream() {
            None => Poll::Ready(Ok(0)),
            Some(tls) => tls.poll_read_vectored(cx, bufs),
        }
    }
}

impl<Input> AsyncWrite for ChallengeTransport<Input>
where
    Input: Transport,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.stream() {
            None => Poll::Ready(Ok(0)),
            Some(tls) => tls.poll_write(cx, buf),
        }
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        match self.stream() {
            None => Poll::Ready(Ok(0)),
            Some(tls) => tls.poll_write_vectored(cx, bufs),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.stream() {
            None => Poll::Ready(Ok(())),
            Some(tls) => tls.poll_flush(cx),
        }
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.stream() {
            None => Poll::Ready(Ok(())),
            Some(tls) => tls.poll_close(cx),
        }
    }
}

impl<Input> Transport for ChallengeTransport<Input>
where
    Input: Transport,
{
    fn set_ip_ttl(&mut self, ttl: u32) -> io::Result<()> {
        self.with_input((), |input| input.set_ip_ttl(ttl))
    }

    fn set_linger(&mut self, linger: Option<Duration>) -> io::Result<()> {
        self.with_input((), |input| input.set_linger(linger))
    }

    fn set_nodelay(&mut self, nodelay: bool) -> io::Result<()> {
        self.with_input((), |input| input.set_nodelay(nodelay))
    }

    fn peer_addr(&self) -> io::Result<Option<SocketAddr>> {
        match self.0.as_deref() {
            None => Ok(None),
            Some(tls) => tls.get_ref().0.peer_addr(),
        }
    }
}
