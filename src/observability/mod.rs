//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Router and adapter produce:
//!     → logging.rs (structured log events, one span per invocation)
//!     → metrics.rs (counters, histograms)
//! ```
//!
//! # Design Decisions
//! - Request ID is attached to the invocation span, so every event the
//!   router emits carries it
//! - Metrics are cheap (atomic increments) and exporter-agnostic

pub mod logging;
pub mod metrics;
