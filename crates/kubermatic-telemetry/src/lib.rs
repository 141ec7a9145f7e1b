//! Tracing subscriber setup shared by the dashboard binaries.
pub mod tracing;

pub use tracing::Tracing;
