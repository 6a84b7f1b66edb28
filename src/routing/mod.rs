//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (route lookup)
//!     → matcher.rs (prefix check)
//!     → Return: matched route with its plugin, or pass-through
//!
//! Route Activation (startup and reload):
//!     RouteConfig[]
//!     → one ResponseTransformer per route, sharing the correlation store
//!     → sort by prefix length
//!     → freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Tables are immutable; a reload builds a new one and swaps it in
//! - Deterministic: same path always matches same route
//! - Unmatched paths are proxied without the plugin

pub mod matcher;
pub mod router;

pub use router::{ActiveRoute, RouteTable};
