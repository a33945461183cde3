//! Protobuf request extractor and response helper.

use actix_web::dev::Payload;
use actix_web::http::{header, StatusCode};
use actix_web::web::Bytes;
use actix_web::{FromRequest, HttpRequest, HttpResponse};
use futures_util::future::LocalBoxFuture;

use crate::api::error::ApiError;
use crate::proto::PROTOBUF_CONTENT_TYPE;

/// Decodes a protobuf request body. A non-empty body must be declared as
/// `application/protobuf`; an empty body decodes to the default message.
pub struct Protobuf<T>(pub T);

impl<T> Protobuf<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> FromRequest for Protobuf<T>
where
    T: prost::Message + Default + 'static,
{
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = Bytes::from_request(req, payload);

        Box::pin(async move {
            let body = body
                .await
                .map_err(|e| ApiError::BadRequest(format!("unable to read body: {e}")))?;
            if body.is_empty() {
                return Ok(Protobuf(T::default()));
            }
            if !is_protobuf(content_type.as_deref()) {
                return Err(ApiError::UnsupportedMediaType(format!(
                    "invalid content type. Expected {}: {}",
                    PROTOBUF_CONTENT_TYPE,
                    content_type.unwrap_or_default()
                )));
            }
            T::decode(body)
                .map(Protobuf)
                .map_err(|e| ApiError::BadRequest(format!("unable to parse request: {e}")))
        })
    }
}

fn is_protobuf(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(PROTOBUF_CONTENT_TYPE))
}

pub fn protobuf_response<M: prost::Message>(status: StatusCode, message: &M) -> HttpResponse {
    HttpResponse::build(status)
        .content_type(PROTOBUF_CONTENT_TYPE)
        .body(message.encode_to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_parameters_are_ignored() {
        assert!(is_protobuf(Some("application/protobuf")));
        assert!(is_protobuf(Some("Application/Protobuf; charset=binary")));
        assert!(!is_protobuf(Some("application/json")));
        assert!(!is_protobuf(None));
    }
}
