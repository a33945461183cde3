mod auth;

pub use auth::{BearerAuth, BearerToken};
