use crate::api::error::ApiError;
use crate::config::AppConfig;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpMessage,
};
use std::{
    future::{ready, Future, Ready},
    pin::Pin,
    rc::Rc,
};
use tracing::warn;

/// Bearer credential of the caller, forwarded to the completion backend.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

/// Requires a bearer token in the `Authorization` header, or in the
/// `api_secret` / `api_key` query parameter for websocket clients.
pub struct BearerAuth;

impl<S, B> Transform<S, ServiceRequest> for BearerAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = BearerAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(BearerAuthMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct BearerAuthMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for BearerAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();

        let Some(token) = extract_token(&req) else {
            return Box::pin(async move {
                Err(Error::from(ApiError::Unauthorized("missing bearer token".to_string())))
            });
        };

        let allowed = match req.app_data::<actix_web::web::Data<AppConfig>>() {
            Some(config) => {
                config.auth.allowed_tokens.is_empty()
                    || config.auth.allowed_tokens.iter().any(|t| *t == token)
            }
            None => {
                warn!("AppConfig missing in app_data");
                return Box::pin(async move {
                    Err(Error::from(ApiError::Internal("Configuration error".to_string())))
                });
            }
        };

        if !allowed {
            return Box::pin(async move {
                Err(Error::from(ApiError::Unauthorized("invalid bearer token".to_string())))
            });
        }

        req.extensions_mut().insert(BearerToken(token));

        Box::pin(async move {
            let res = srv.call(req).await?;
            Ok(res)
        })
    }
}

fn extract_token(req: &ServiceRequest) -> Option<String> {
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = from_header {
        return Some(token.to_string());
    }

    // Fallback to query params for websocket clients
    let params = qstring::QString::from(req.query_string());
    params
        .get("api_secret")
        .or_else(|| params.get("api_key"))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
