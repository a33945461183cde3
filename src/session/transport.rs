use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unable to read frame: {0}")]
    Receive(String),
    #[error("unable to write frame: {0}")]
    Send(String),
    #[error("frame exceeds the {limit} byte limit")]
    FrameTooLarge { limit: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseSignal {
    Normal,
    /// The session can no longer report errors to the peer.
    InternalError,
}

/// Frame-level connection to one client.
///
/// Not `Send`: websocket sessions live on the worker thread that accepted
/// them.
#[async_trait(?Send)]
pub trait Transport {
    /// Next complete frame, or `Ok(None)` once the peer has gone away.
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError>;

    async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Best effort; closing an already closed transport is a no-op.
    async fn close(&mut self, signal: CloseSignal);
}
