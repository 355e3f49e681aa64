//! Connection and server statistics

pub mod metrics;

pub use metrics::{ConnectionStats, ConnectionStatsSnapshot, ServerStats, ServerStatsSnapshot};
