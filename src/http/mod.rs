//! HTTP surface: health, map listing and the WebSocket upgrade

mod routes;

pub use routes::build_router;
