//! Health monitoring for questdeck
//!
//! A registry of named health-check probes, each invoked with a timeout and
//! bounded retries. The monitor keeps a rolling history per service,
//! derives aggregate system health, and can poll continuously on a fixed
//! interval.

pub mod monitor;
pub mod probe;
pub mod types;

pub use monitor::{HealthMonitor, SystemHealth};
pub use probe::{FnProbe, HealthProbe};
pub use types::{HealthCheckResult, HealthStatus, ProbeReport, ProbeSettings, ServiceMetrics};
