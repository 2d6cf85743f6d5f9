use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to set up a server or client engine. An engine for which this is returned is never
///  handed out to callers.
#[derive(Error, Debug)]
pub enum ConstructionError {
    #[error("invalid server address {0:?}")]
    InvalidAddress(String),
    #[error("socket setup failed: {0}")]
    Socket(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A single send or receive call failed. This is never fatal: the calling loop logs it and
///  continues with the next datagram.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("sending to {to:?} failed: {source}")]
    Send {
        to: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("receiving failed: {0}")]
    Receive(#[source] std::io::Error),
}

/// The FEC lookback slot holds no payload for the requested sequence number, either because the
///  peer never sent it or because it was overwritten in the history ring buffer.
#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
#[error("no payload recorded {lookback} packets before sequence {sequence}")]
pub struct MissingHistoryError {
    pub sequence: u64,
    pub lookback: u64,
}

#[derive(Error, Debug)]
#[error("log sink {path:?} is unavailable: {source}")]
pub struct SinkUnavailable {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}
