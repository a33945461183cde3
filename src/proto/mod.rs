//! Protobuf envelope shared by the REST boundary and the realtime channel.
//!
//! Field tags are part of the wire contract with existing clients; never
//! renumber them.

pub mod codec;

/// Content type declared on every protobuf request and response body.
pub const PROTOBUF_CONTENT_TYPE: &str = "application/protobuf";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum MessageSender {
    System = 0,
    User = 1,
    Bot = 2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Message {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, tag = "2")]
    pub body: ::prost::alloc::string::String,
    #[prost(enumeration = "MessageSender", tag = "3")]
    pub sender: i32,
    #[prost(message, optional, tag = "4")]
    pub created_at: ::core::option::Option<::prost_types::Timestamp>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Conversation {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, tag = "2")]
    pub completion_id: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub title: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub context: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "5")]
    pub created_at: ::core::option::Option<::prost_types::Timestamp>,
    #[prost(message, repeated, tag = "6")]
    pub messages: ::prost::alloc::vec::Vec<Message>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateConversationRequest {
    #[prost(string, tag = "1")]
    pub title: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateMessageRequest {
    #[prost(string, tag = "1")]
    pub body: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListConversationsResponse {
    #[prost(message, repeated, tag = "1")]
    pub conversations: ::prost::alloc::vec::Vec<Conversation>,
}

/// Inbound realtime frame, and the payload of an outbound reply.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MessageEvent {
    #[prost(string, tag = "1")]
    pub body: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ErrorType {
    InputValidationError = 0,
    ServerError = 1,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ErrorEvent {
    #[prost(enumeration = "ErrorType", tag = "1")]
    pub r#type: i32,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ChatEventType {
    Message = 0,
    Error = 1,
}

/// Outbound realtime frame.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChatEvent {
    #[prost(enumeration = "ChatEventType", tag = "1")]
    pub r#type: i32,
    #[prost(oneof = "chat_event::Event", tags = "2, 3")]
    pub event: ::core::option::Option<chat_event::Event>,
}

pub mod chat_event {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Event {
        #[prost(message, tag = "2")]
        Message(super::MessageEvent),
        #[prost(message, tag = "3")]
        Error(super::ErrorEvent),
    }
}

/// Body of every non-2xx REST response.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Error {
    #[prost(string, tag = "1")]
    pub message: ::prost::alloc::string::String,
}

pub fn timestamp(at: chrono::DateTime<chrono::Utc>) -> ::prost_types::Timestamp {
    ::prost_types::Timestamp {
        seconds: at.timestamp(),
        nanos: at.timestamp_subsec_nanos() as i32,
    }
}
