//! HTTP adapter for the metered assistant.
//!
//! - `POST /assistant/chat` - one AI chat turn
//! - `POST /assistant/diagnose` - photo diagnosis

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::AssistantAppState;
pub use routes::assistant_routes;
