use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::trace;
use crate::error::TransportError;

/// This is an abstraction for sending a datagram on an unconnected UDP socket, introduced to
///  facilitate mocking the I/O part away for testing
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SendSocket: Send + Sync + 'static {
    async fn do_send_packet(&self, to: SocketAddr, packet_buf: &[u8]) -> Result<(), TransportError>;
}

#[async_trait]
impl SendSocket for Arc<UdpSocket> {
    async fn do_send_packet(&self, to: SocketAddr, packet_buf: &[u8]) -> Result<(), TransportError> {
        trace!("UDP socket: sending packet to {:?}: {:?}", to, packet_buf);

        self.send_to(packet_buf, to).await
            .map(|_| ())
            .map_err(|source| TransportError::Send { to, source })
    }
}
