//! Realtime chat sessions: one engine per connected client.

pub mod engine;
pub mod transport;

pub use engine::{
    CloseCause, SessionDeps, SessionEngine, SessionError, SessionState, TurnOutcome,
    DEFAULT_COMPLETION_TIMEOUT, DEFAULT_MAX_FRAME_BYTES,
};
pub use transport::{CloseSignal, Transport, TransportError};
