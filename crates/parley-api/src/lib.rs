//! Parley API crate - axum HTTP server and route handlers.
//!
//! Exposes the chat turn, speech transcription, and a health check over
//! JSON endpoints.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::{AppState, TranscriberSlot};
