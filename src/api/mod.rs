pub mod error;
pub mod middleware;
pub mod protobuf;
pub mod routes;
pub mod websocket;
