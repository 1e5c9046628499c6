//! HTTP gate for the subject check
//!
//! Bearer authentication, lockdown middleware and admin surface

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod state;

pub use auth::{Claims, StaticTokenValidator, TokenValidator};
pub use error::{ApiError, Result};
pub use routes::create_router;
pub use server::{Server, ServerBuilder, ServerConfig};
pub use state::AppState;
