use actix_web::http::{header, StatusCode};
use actix_web::{get, web, HttpRequest, HttpResponse};
use actix_ws::{
    AggregatedMessage, AggregatedMessageStream, CloseCode, CloseReason, MessageStream,
    ProtocolError, Session,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt as _;
use std::sync::Arc;
use tracing::info;

use crate::api::error::ApiError;
use crate::api::middleware::BearerToken;
use crate::api::protobuf::protobuf_response;
use crate::api::routes::{parse_id, Store};
use crate::config::AppConfig;
use crate::llm::CompletionGateway;
use crate::proto;
use crate::session::{CloseSignal, SessionDeps, SessionEngine, Transport, TransportError};

/// Websocket upgrade starts a chat session; a plain GET returns the
/// conversation with its messages.
#[get("")]
pub async fn conversation(
    req: HttpRequest,
    body: web::Payload,
    id: web::Path<String>,
    token: web::ReqData<BearerToken>,
    store: Store,
    llm: web::Data<Arc<dyn CompletionGateway>>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&id)?;

    if !is_websocket_upgrade(&req) {
        let conversation = store.get_conversation(id)?;
        return Ok(protobuf_response(
            StatusCode::OK,
            &proto::Conversation::from(&conversation),
        ));
    }

    // Resolve the conversation before accepting the upgrade
    let deps = SessionDeps::new(
        store.get_ref().clone(),
        llm.get_ref().clone(),
        token.into_inner().0,
        &config.chat,
    );
    let max_frame_bytes = deps.max_frame_bytes;
    let mut engine = SessionEngine::start(id, deps)?;

    let (response, session, stream) = actix_ws::handle(&req, body)
        .map_err(|e| ApiError::BadRequest(format!("websocket upgrade failed: {e}")))?;

    info!("WebSocket connection established for conversation {}", id);

    actix_web::rt::spawn(async move {
        let mut transport = WsTransport::new(session, stream, max_frame_bytes);
        engine.run(&mut transport).await;
    });

    Ok(response)
}

fn is_websocket_upgrade(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// actix-ws connection as a session transport. Fragmented messages are
/// reassembled; text and binary messages are both treated as protobuf
/// payloads.
pub struct WsTransport {
    session: Option<Session>,
    stream: AggregatedMessageStream,
    max_frame_bytes: usize,
}

impl WsTransport {
    pub fn new(session: Session, stream: MessageStream, max_frame_bytes: usize) -> Self {
        let stream = stream
            .max_frame_size(max_frame_bytes)
            .aggregate_continuations()
            .max_continuation_size(max_frame_bytes);
        Self {
            session: Some(session),
            stream,
            max_frame_bytes,
        }
    }
}

#[async_trait(?Send)]
impl Transport for WsTransport {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        while let Some(msg) = self.stream.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(ProtocolError::Overflow) => {
                    return Err(TransportError::FrameTooLarge {
                        limit: self.max_frame_bytes,
                    })
                }
                Err(e) => return Err(TransportError::Receive(e.to_string())),
            };
            match msg {
                AggregatedMessage::Binary(bytes) => return Ok(Some(bytes)),
                AggregatedMessage::Text(text) => return Ok(Some(text.into_bytes())),
                AggregatedMessage::Ping(bytes) => {
                    if let Some(session) = self.session.as_mut() {
                        session
                            .pong(&bytes)
                            .await
                            .map_err(|_| TransportError::Send("session is closed".to_string()))?;
                    }
                }
                AggregatedMessage::Close(reason) => {
                    if let Some(session) = self.session.take() {
                        let _ = session.close(reason).await;
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
        Ok(None)
    }

    async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        match self.session.as_mut() {
            Some(session) => session
                .binary(frame)
                .await
                .map_err(|_| TransportError::Send("session is closed".to_string())),
            None => Err(TransportError::Send("connection closed".to_string())),
        }
    }

    async fn close(&mut self, signal: CloseSignal) {
        let Some(session) = self.session.take() else {
            return;
        };
        let reason = match signal {
            CloseSignal::Normal => Some(CloseReason::from(CloseCode::Normal)),
            CloseSignal::InternalError => Some(CloseReason {
                code: CloseCode::Error,
                description: Some("Internal Server Error".to_string()),
            }),
        };
        let _ = session.close(reason).await;
    }
}
