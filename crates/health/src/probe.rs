//! The probe seam.

use crate::types::ProbeReport;
use async_trait::async_trait;
use questdeck_core::Result;
use std::future::Future;

/// A named health check. Implementations should answer quickly; the monitor
/// enforces a timeout and abandons (does not cancel) the underlying work
/// when it fires.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> Result<ProbeReport>;
}

/// Adapter so plain async closures can be registered as probes
pub struct FnProbe<F>(F);

impl<F, Fut> FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<ProbeReport>> + Send,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> HealthProbe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<ProbeReport>> + Send,
{
    async fn check(&self) -> Result<ProbeReport> {
        (self.0)().await
    }
}
