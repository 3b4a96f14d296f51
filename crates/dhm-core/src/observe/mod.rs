//! # Observability
//!
//! Structured logging for the synthesis and live reconstruction paths via
//! the `tracing` ecosystem.
//!
//! ```rust,ignore
//! use dhm_core::observe::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development());
//! tracing::info!(width = 1024, height = 1024, "Live reconstruction started");
//! ```
//!
//! | Target | Level | Events |
//! |--------|-------|--------|
//! | `dhm_core::synthesis` | info / warn | hologram produced, infeasible objective |
//! | `dhm_core::reconstruction` | debug / trace | filter, tuning and optics updates, per-frame |
//! | `dhm_core::live` | info / debug | worker start/stop, frame rate |

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
