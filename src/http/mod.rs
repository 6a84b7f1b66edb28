//! HTTP gateway host subsystem.
//!
//! # Data Flow
//! ```text
//! Client request
//!     → request.rs (stamp x-request-id)
//!     → server.rs (route lookup, request hook, forward upstream)
//!     → response.rs (wrap upstream response for the response hook)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::UpstreamResponse;
pub use server::{GatewayServer, ServerError};
