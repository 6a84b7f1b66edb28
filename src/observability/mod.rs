//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! plugin + host
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields, never free-form interpolation of header values
//! - Request ID flows through the host and doubles as the correlation token

pub mod logging;
pub mod metrics;
