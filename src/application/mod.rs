//! Application layer - command and query handlers.
//!
//! Handlers orchestrate pure domain functions over the ports. They own no
//! state beyond the port handles injected at startup.

pub mod handlers;

pub use handlers::*;
