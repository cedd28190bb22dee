//! Metrics Adapters - Prometheus counters and health endpoints.

pub mod health;
pub mod prometheus;

pub use self::health::{HealthServer, HealthState};
pub use self::prometheus::StoreMetrics;
