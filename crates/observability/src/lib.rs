//! Tracing and logging setup shared by the binaries.

/// Initialize process-wide tracing from the environment.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(&tracing::TracingConfig::from_env());
}

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use tracing::{LogFormat, TracingConfig};
