//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Activate routes → Start listener
//!
//! Shutdown (shutdown.rs):
//!     SIGTERM/SIGINT → broadcast → server drains → exit
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
