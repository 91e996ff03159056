//! HTTP API for the mail service.
//!
//! All mail endpoints live under `/api/mail` and require a bearer token
//! issued by the game's login service.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
