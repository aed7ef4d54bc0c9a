//! Core types shared across the service.

mod context;
mod state;

pub use context::Context;
pub use state::{is_shutdown, register_shutdown, request_shutdown, setup_shutdown_handler};
