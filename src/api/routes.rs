use actix_web::http::StatusCode;
use actix_web::{get, post, web, HttpResponse};
use std::sync::Arc;
use tracing::error;

use crate::api::error::ApiError;
use crate::api::middleware::BearerAuth;
use crate::api::protobuf::{protobuf_response, Protobuf};
use crate::api::websocket;
use crate::db::{ConversationStore, Sender};
use crate::proto::{self, CreateConversationRequest, CreateMessageRequest, ListConversationsResponse};

pub type Store = web::Data<Arc<dyn ConversationStore>>;

pub(crate) fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|e| ApiError::BadRequest(format!("invalid conversation id [{raw}]: {e}")))
}

// --- Conversations ---

#[post("")]
pub async fn create_conversation(
    store: Store,
    req: Protobuf<CreateConversationRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = req.into_inner();
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("conversation title must not be empty".to_string()));
    }

    let conversation = store.create_conversation(title).map_err(|e| {
        error!("Unable to create conversation: {}", e);
        ApiError::Internal(format!("unable to create conversation: {e}"))
    })?;
    Ok(protobuf_response(
        StatusCode::CREATED,
        &proto::Conversation::from(&conversation),
    ))
}

#[get("")]
pub async fn list_conversations(store: Store) -> Result<HttpResponse, ApiError> {
    let conversations = store.list_conversations().map_err(|e| {
        error!("Unable to list conversations: {}", e);
        ApiError::Internal(format!("unable to list conversations: {e}"))
    })?;
    let response = ListConversationsResponse {
        conversations: conversations.iter().map(proto::Conversation::from).collect(),
    };
    Ok(protobuf_response(StatusCode::OK, &response))
}

// --- Messages ---

#[post("/messages")]
pub async fn create_message(
    store: Store,
    id: web::Path<String>,
    req: Protobuf<CreateMessageRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&id)?;
    let req = req.into_inner();
    if req.body.trim().is_empty() {
        return Err(ApiError::BadRequest("message body must not be empty".to_string()));
    }

    // Check if the conversation exists first
    store.get_conversation(id)?;

    let message = store.create_message(&req.body, Sender::User, id).map_err(|e| {
        error!("Unable to create message in conversation {}: {}", id, e);
        ApiError::Internal(format!("unable to create message: {e}"))
    })?;
    Ok(protobuf_response(StatusCode::CREATED, &proto::Message::from(&message)))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/conversations")
            .service(create_conversation)
            .service(list_conversations)
            .service(
                web::scope("/{id}")
                    .wrap(BearerAuth)
                    .service(websocket::conversation)
                    .service(create_message),
            ),
    );
}
