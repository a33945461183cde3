//! Frame codec for the realtime channel.
//!
//! Inbound frames are `MessageEvent`s, outbound frames are `ChatEvent`s. Every
//! failure comes back as a `CodecError` value so the session loop can answer
//! with an error frame instead of dropping the connection.

use prost::Message as _;
use thiserror::Error;

use crate::proto::{chat_event::Event, ChatEvent, ChatEventType, ErrorEvent, ErrorType, MessageEvent};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unable to parse message: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("message body must not be empty")]
    EmptyBody,
    #[error("unable to serialize chat event: {0}")]
    Encode(#[from] prost::EncodeError),
    #[error("chat event of {len} bytes exceeds the {limit} byte frame limit")]
    TooLarge { len: usize, limit: usize },
}

pub fn decode_inbound(frame: &[u8]) -> Result<MessageEvent, CodecError> {
    let event = MessageEvent::decode(frame)?;
    if event.body.trim().is_empty() {
        return Err(CodecError::EmptyBody);
    }
    Ok(event)
}

/// Encodes an outbound frame no larger than `limit` bytes.
pub fn encode_outbound(event: &ChatEvent, limit: usize) -> Result<Vec<u8>, CodecError> {
    let len = event.encoded_len();
    if len > limit {
        return Err(CodecError::TooLarge { len, limit });
    }
    let mut buf = Vec::with_capacity(len);
    event.encode(&mut buf)?;
    Ok(buf)
}

pub fn message_event(body: impl Into<String>) -> ChatEvent {
    ChatEvent {
        r#type: ChatEventType::Message as i32,
        event: Some(Event::Message(MessageEvent { body: body.into() })),
    }
}

pub fn error_event(kind: ErrorType, message: impl Into<String>) -> ChatEvent {
    ChatEvent {
        r#type: ChatEventType::Error as i32,
        event: Some(Event::Error(ErrorEvent {
            r#type: kind as i32,
            message: message.into(),
        })),
    }
}

/// Encodes an error frame. A failure here leaves the session with no way to
/// report problems, so callers treat it as fatal.
pub fn build_error(kind: ErrorType, message: &str, limit: usize) -> Result<Vec<u8>, CodecError> {
    encode_outbound(&error_event(kind, message), limit)
}

/// Client side of the channel: used by the terminal chat and tests.
pub fn encode_inbound(event: &MessageEvent) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::with_capacity(event.encoded_len());
    event.encode(&mut buf)?;
    Ok(buf)
}

pub fn decode_outbound(frame: &[u8]) -> Result<ChatEvent, CodecError> {
    Ok(ChatEvent::decode(frame)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_frame_is_a_decode_error() {
        let err = decode_inbound(&[0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn blank_body_is_rejected() {
        let frame = encode_inbound(&MessageEvent { body: "   ".into() }).unwrap();
        assert!(matches!(decode_inbound(&frame), Err(CodecError::EmptyBody)));
        assert!(matches!(decode_inbound(&[]), Err(CodecError::EmptyBody)));
    }

    #[test]
    fn inbound_event_rewrapped_as_reply_survives_encoding() {
        let frame = encode_inbound(&MessageEvent { body: "hello there".into() }).unwrap();
        let inbound = decode_inbound(&frame).unwrap();

        let reply = message_event(inbound.body.clone());
        let decoded = decode_outbound(&encode_outbound(&reply, usize::MAX).unwrap()).unwrap();

        assert_eq!(decoded, reply);
        assert_eq!(decoded.r#type(), ChatEventType::Message);
        match decoded.event {
            Some(Event::Message(m)) => assert_eq!(m, inbound),
            other => panic!("expected message event, got {other:?}"),
        }
    }

    #[test]
    fn error_frames_carry_their_kind() {
        let frame = build_error(ErrorType::ServerError, "unable to ask completion backend", 1024)
            .unwrap();
        let event = decode_outbound(&frame).unwrap();

        assert_eq!(event.r#type(), ChatEventType::Error);
        let Some(Event::Error(err)) = event.event else {
            panic!("expected error event");
        };
        assert_eq!(err.r#type(), ErrorType::ServerError);
        assert_eq!(err.message, "unable to ask completion backend");
    }

    #[test]
    fn oversized_event_is_refused() {
        let reply = message_event("x".repeat(64));
        let err = encode_outbound(&reply, 16).unwrap_err();
        assert!(matches!(err, CodecError::TooLarge { limit: 16, .. }));
        assert!(build_error(ErrorType::ServerError, "too long for the frame", 8).is_err());
    }
}
