//! Response transformation plugin.
//!
//! # Data Flow
//! ```text
//! Request phase:
//!     capture.rs (allow-listed headers, client IP, URI)
//!     → correlation.rs (insert PendingRequest)
//!
//! Response phase:
//!     correlation.rs (claim matching PendingRequest)
//!     → transformer.rs (branch on mode, read body in replace mode)
//!     → notifier.rs (external call under deadline)
//!     → headers.rs (success/failure header rules)
//!     → transformer.rs (substitute external body, or sniff.rs + original body)
//! ```
//!
//! # Design Decisions
//! - The plugin only sees the host through the traits in gateway.rs
//! - Correlation state is injected, never global
//! - Every external failure collapses to a single `success = false`
//! - The client never receives a structured error body from this plugin

pub mod capture;
pub mod correlation;
pub mod gateway;
pub mod headers;
pub mod notifier;
pub mod payload;
pub mod sniff;
pub mod transformer;

pub use correlation::CorrelationStore;
pub use gateway::{BodyError, GatewayRequest, GatewayResponse};
pub use notifier::{HttpNotifier, Notifier};
pub use payload::{ExternalPayload, ExternalResult, PendingRequest};
pub use transformer::ResponseTransformer;
