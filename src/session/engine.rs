//! Per-connection session loop.
//!
//! Content failures (bad frame, backend error, encode error) are answered
//! with a typed error frame and the session stays active. Transport failures
//! close it. The only content failure that closes the session is failing to
//! encode the error frame itself.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::ChatConfig;
use crate::db::{Conversation, ConversationStore, DbError, Message, Sender};
use crate::llm::models::{Completion, CompletionRequest};
use crate::llm::{CompletionGateway, LlmError};
use crate::proto::codec::{self, CodecError};
use crate::proto::ErrorType;
use crate::session::transport::{CloseSignal, Transport, TransportError};

pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unable to get conversation with id [{id}]: {source}")]
    Resolution {
        id: i64,
        #[source]
        source: DbError,
    },
    #[error("session is not initializing")]
    AlreadyStarted,
}

impl SessionError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SessionError::Resolution { source, .. } if source.is_not_found())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseCause {
    ResolutionFailed(String),
    PeerClosed,
    ReadFailed(String),
    SendFailed(String),
    /// An error frame could not be encoded.
    Unreportable(String),
}

#[derive(Debug)]
pub enum SessionState {
    Initializing { conversation_id: i64 },
    Active(ActiveConversation),
    Closed(CloseCause),
}

/// In-memory copy of the conversation for the life of the connection.
#[derive(Debug)]
pub struct ActiveConversation {
    conversation: Conversation,
    history: Vec<Message>,
}

impl ActiveConversation {
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Most recent persisted messages, oldest first.
    pub fn history(&self) -> &[Message] {
        &self.history
    }
}

#[derive(Debug)]
pub enum TurnOutcome {
    Reply(Vec<u8>),
    /// Typed error frame; the session stays active.
    Error { kind: ErrorType, frame: Vec<u8> },
    /// Not even an error frame could be encoded.
    Fatal(CodecError),
    /// The session is not active and handled nothing.
    Inactive,
}

pub struct SessionDeps {
    pub store: Arc<dyn ConversationStore>,
    pub completion: Arc<dyn CompletionGateway>,
    /// Bearer credential of the connected client.
    pub token: String,
    pub completion_timeout: Duration,
    /// Messages kept in memory and offered to the backend.
    pub max_history: usize,
    /// Outbound frames larger than this are not sent.
    pub max_frame_bytes: usize,
}

impl SessionDeps {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        completion: Arc<dyn CompletionGateway>,
        token: String,
        chat: &ChatConfig,
    ) -> Self {
        Self {
            store,
            completion,
            token,
            completion_timeout: Duration::from_secs(chat.completion_timeout_secs),
            max_history: chat.max_history_messages,
            max_frame_bytes: chat.max_frame_bytes,
        }
    }
}

pub struct SessionEngine {
    state: SessionState,
    deps: SessionDeps,
}

impl SessionEngine {
    pub fn new(conversation_id: i64, deps: SessionDeps) -> Self {
        Self {
            state: SessionState::Initializing { conversation_id },
            deps,
        }
    }

    /// Resolves the conversation and activates the session. On failure the
    /// session is closed and the connection must be refused.
    pub fn start(conversation_id: i64, deps: SessionDeps) -> Result<Self, SessionError> {
        let mut engine = Self::new(conversation_id, deps);
        engine.initialize()?;
        Ok(engine)
    }

    pub fn initialize(&mut self) -> Result<(), SessionError> {
        let SessionState::Initializing { conversation_id } = self.state else {
            return Err(SessionError::AlreadyStarted);
        };

        match self.deps.store.get_conversation(conversation_id) {
            Ok(mut conversation) => {
                let history = conversation.messages.take().unwrap_or_default();
                debug!(
                    "Session for conversation {} active with {} prior messages",
                    conversation_id,
                    history.len()
                );
                let mut active = ActiveConversation {
                    conversation,
                    history,
                };
                active.trim_history(self.deps.max_history);
                self.state = SessionState::Active(active);
                Ok(())
            }
            Err(source) => {
                self.state = SessionState::Closed(CloseCause::ResolutionFailed(source.to_string()));
                Err(SessionError::Resolution {
                    id: conversation_id,
                    source,
                })
            }
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Active(_))
    }

    /// Processes one inbound frame and returns what to send back.
    pub async fn handle_frame(&mut self, frame: &[u8]) -> TurnOutcome {
        match &mut self.state {
            SessionState::Active(active) => active.take_turn(&self.deps, frame).await,
            _ => TurnOutcome::Inactive,
        }
    }

    /// Runs the read, complete, persist, write loop until the session closes.
    pub async fn run<T>(&mut self, transport: &mut T) -> CloseCause
    where
        T: Transport + ?Sized,
    {
        if let SessionState::Active(active) = &self.state {
            info!(
                "Session started for conversation {}",
                active.conversation.id
            );
        }

        while self.is_active() {
            let frame = match transport.recv().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    self.close(CloseCause::PeerClosed);
                    break;
                }
                Err(e) => {
                    warn!("Session read failed: {}", e);
                    if let TransportError::FrameTooLarge { limit } = &e {
                        // The stream cannot resync after an oversized frame;
                        // report it before closing.
                        let message = format!("message exceeds the {limit} byte frame limit");
                        if let TurnOutcome::Error { frame, .. } = error_frame(
                            ErrorType::InputValidationError,
                            &message,
                            self.deps.max_frame_bytes,
                        ) {
                            let _ = transport.send(frame).await;
                        }
                    }
                    self.close(CloseCause::ReadFailed(e.to_string()));
                    break;
                }
            };

            let outbound = match self.handle_frame(&frame).await {
                TurnOutcome::Reply(frame) | TurnOutcome::Error { frame, .. } => frame,
                TurnOutcome::Fatal(e) => {
                    error!("Unable to build error response: {}", e);
                    transport.close(CloseSignal::InternalError).await;
                    self.close(CloseCause::Unreportable(e.to_string()));
                    break;
                }
                TurnOutcome::Inactive => break,
            };

            if let Err(e) = transport.send(outbound).await {
                warn!("Session write failed: {}", e);
                self.close(CloseCause::SendFailed(e.to_string()));
            }
        }

        let cause = match &self.state {
            SessionState::Closed(cause) => cause.clone(),
            _ => CloseCause::PeerClosed,
        };
        self.state = SessionState::Closed(cause.clone());
        if !matches!(cause, CloseCause::Unreportable(_)) {
            transport.close(CloseSignal::Normal).await;
        }
        info!("Session closed: {:?}", cause);
        cause
    }

    fn close(&mut self, cause: CloseCause) -> CloseCause {
        self.state = SessionState::Closed(cause.clone());
        cause
    }
}

impl ActiveConversation {
    async fn take_turn(&mut self, deps: &SessionDeps, frame: &[u8]) -> TurnOutcome {
        let limit = deps.max_frame_bytes;
        let event = match codec::decode_inbound(frame) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    "Rejected frame for conversation {}: {}",
                    self.conversation.id, e
                );
                return error_frame(ErrorType::InputValidationError, &e.to_string(), limit);
            }
        };

        let user_message = self.persist(deps, &event.body, Sender::User);
        let completion = self.ask(deps, &event.body).await;
        self.history.extend(user_message);
        self.trim_history(deps.max_history);

        let completion = match completion {
            Ok(completion) => completion,
            Err(e) => {
                error!(
                    "Completion failed for conversation {}: {}",
                    self.conversation.id, e
                );
                return error_frame(ErrorType::ServerError, "unable to get a completion", limit);
            }
        };
        if let Some(usage) = completion.usage {
            debug!(
                "Completion for conversation {} used {} input and {} output tokens",
                self.conversation.id, usage.input_tokens, usage.output_tokens
            );
        }

        let bot_message = self.persist(deps, &completion.reply, Sender::Bot);
        self.history.extend(bot_message);
        self.trim_history(deps.max_history);

        if let Some(context) = completion.context {
            self.update_context(deps, context);
        }

        match codec::encode_outbound(&codec::message_event(completion.reply), limit) {
            Ok(frame) => TurnOutcome::Reply(frame),
            Err(e) => {
                error!("Unable to encode reply: {}", e);
                error_frame(ErrorType::ServerError, "unable to serialize chat event", limit)
            }
        }
    }

    fn trim_history(&mut self, max: usize) {
        let excess = self.history.len().saturating_sub(max);
        self.history.drain(..excess);
    }

    async fn ask(&self, deps: &SessionDeps, turn: &str) -> Result<Completion, LlmError> {
        let request = CompletionRequest {
            turn,
            token: &deps.token,
            context: &self.conversation.context,
            history: &self.history,
        };

        let completion = tokio::time::timeout(deps.completion_timeout, deps.completion.complete(request))
            .await
            .map_err(|_| LlmError::Timeout(deps.completion_timeout))??;

        if completion.reply.trim().is_empty() {
            return Err(LlmError::EmptyReply);
        }
        Ok(completion)
    }

    /// Best effort: a storage failure never blocks the exchange.
    fn persist(&self, deps: &SessionDeps, body: &str, sender: Sender) -> Option<Message> {
        match deps.store.create_message(body, sender, self.conversation.id) {
            Ok(message) => Some(message),
            Err(e) => {
                error!(
                    "Unable to persist {} message for conversation {}: {}",
                    sender, self.conversation.id, e
                );
                None
            }
        }
    }

    fn update_context(&mut self, deps: &SessionDeps, context: String) {
        if context == self.conversation.context {
            return;
        }
        self.conversation.context = context;
        if let Err(e) = deps.store.update_conversation(&self.conversation) {
            error!(
                "Unable to update context for conversation {}: {}",
                self.conversation.id, e
            );
        }
    }
}

fn error_frame(kind: ErrorType, message: &str, limit: usize) -> TurnOutcome {
    match codec::build_error(kind, message, limit) {
        Ok(frame) => TurnOutcome::Error { kind, frame },
        Err(e) => TurnOutcome::Fatal(e),
    }
}
