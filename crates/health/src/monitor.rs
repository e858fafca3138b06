//! The health monitor: probe registry, rolling history, aggregate status,
//! and the continuous monitoring task.

use crate::probe::{FnProbe, HealthProbe};
use crate::types::{
    HealthCheckResult, HealthStatus, ProbeReport, ProbeSettings, ServiceMetrics,
};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use questdeck_core::constants::{DEFAULT_MONITOR_INTERVAL, HEALTH_HISTORY_CAP};
use questdeck_core::serialization::time::system_time_as_millis;
use questdeck_core::{EventBus, HealthEvent, Result, SystemEvent};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Delay unit between probe retry attempts; the wait grows linearly with
/// the attempt number
const RETRY_DELAY_UNIT: Duration = Duration::from_millis(1000);

struct RegisteredProbe {
    probe: Arc<dyn HealthProbe>,
    settings: ProbeSettings,
}

/// The full system report produced by [`HealthMonitor::check_all`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealth {
    pub overall: HealthStatus,
    pub services: Vec<HealthCheckResult>,
    #[serde(with = "system_time_as_millis")]
    pub timestamp: SystemTime,
    pub uptime_seconds: u64,
}

struct MonitorInner {
    probes: RwLock<HashMap<String, RegisteredProbe>>,
    history: RwLock<HashMap<String, VecDeque<HealthCheckResult>>>,
    history_cap: usize,
    started_at: Instant,
    events: EventBus,
    last_overall: Mutex<Option<HealthStatus>>,
}

/// Registry of named health probes. Cloning is cheap; all clones share the
/// same registry, history, and monitoring task slot.
#[derive(Clone)]
pub struct HealthMonitor {
    inner: Arc<MonitorInner>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
    /// Interval for the continuous monitoring loop
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(events: EventBus) -> Self {
        Self::with_interval(events, DEFAULT_MONITOR_INTERVAL)
    }

    pub fn with_interval(events: EventBus, interval: Duration) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                probes: RwLock::new(HashMap::new()),
                history: RwLock::new(HashMap::new()),
                history_cap: HEALTH_HISTORY_CAP,
                started_at: Instant::now(),
                events,
                last_overall: Mutex::new(None),
            }),
            task: Arc::new(Mutex::new(None)),
            interval,
        }
    }

    /// Register a probe under a name with default settings
    pub fn register(&self, name: impl Into<String>, probe: Arc<dyn HealthProbe>) {
        self.register_with(name, probe, ProbeSettings::default());
    }

    /// Register a probe with per-probe timeout/retry overrides
    pub fn register_with(
        &self,
        name: impl Into<String>,
        probe: Arc<dyn HealthProbe>,
        settings: ProbeSettings,
    ) {
        let name = name.into();
        debug!(service = %name, "registering health probe");
        self.inner
            .probes
            .write()
            .insert(name, RegisteredProbe { probe, settings });
    }

    /// Register an async closure as a probe
    pub fn register_fn<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ProbeReport>> + Send + 'static,
    {
        self.register(name, Arc::new(FnProbe::new(f)));
    }

    /// Remove a probe and its history
    pub fn unregister(&self, name: &str) {
        self.inner.probes.write().remove(name);
        self.inner.history.write().remove(name);
    }

    /// Run one service's probe, race it against its timeout, and record the
    /// outcome.
    ///
    /// A timed-out attempt is recorded immediately; the probe's underlying
    /// work is abandoned, not cancelled, so its side effects may still
    /// happen. Probe failures are retried with a linearly increasing delay.
    pub async fn check_service(&self, name: &str) -> HealthCheckResult {
        let registered = {
            let probes = self.inner.probes.read();
            probes
                .get(name)
                .map(|r| (Arc::clone(&r.probe), r.settings.clone()))
        };

        let Some((probe, settings)) = registered else {
            let result = failure_result(name, format!("service '{name}' is not registered"));
            self.record(result.clone());
            return result;
        };

        let mut last_error = String::new();
        for attempt in 0..=settings.retries {
            if attempt > 0 {
                sleep(RETRY_DELAY_UNIT * attempt).await;
            }

            let start = Instant::now();
            match timeout(settings.timeout, probe.check()).await {
                Err(_) => {
                    // Timer fired first: the probe is abandoned and the
                    // timeout is what gets recorded
                    let timeout_ms = settings.timeout.as_millis() as u64;
                    warn!(service = %name, timeout_ms, "health probe timed out");
                    self.inner
                        .events
                        .publish(SystemEvent::Health(HealthEvent::ProbeTimedOut {
                            service: name.to_string(),
                            timeout_ms,
                        }));
                    let result =
                        failure_result(name, format!("health check timed out after {timeout_ms}ms"));
                    self.record(result.clone());
                    return result;
                }
                Ok(Ok(report)) => {
                    let result = HealthCheckResult {
                        service_name: name.to_string(),
                        status: report.status,
                        response_time_ms: Some(start.elapsed().as_millis() as u64),
                        error: report.detail,
                        observed_at: SystemTime::now(),
                    };
                    self.record(result.clone());
                    return result;
                }
                Ok(Err(error)) => {
                    last_error = error.to_string();
                    if attempt < settings.retries {
                        debug!(
                            service = %name,
                            attempt = attempt + 1,
                            "health probe failed, retrying: {last_error}"
                        );
                    }
                }
            }
        }

        let result = failure_result(name, last_error);
        self.record(result.clone());
        result
    }

    /// Run every registered probe concurrently and derive aggregate status.
    pub async fn check_all(&self) -> SystemHealth {
        let names: Vec<String> = self.inner.probes.read().keys().cloned().collect();
        let services = join_all(names.iter().map(|name| self.check_service(name))).await;

        let overall = aggregate(&services);
        self.note_overall(overall);

        SystemHealth {
            overall,
            services,
            timestamp: SystemTime::now(),
            uptime_seconds: self.uptime_seconds(),
        }
    }

    /// Derived metrics over the given window; zeros when the window holds
    /// no samples.
    pub fn service_metrics(&self, name: &str, window: Duration) -> ServiceMetrics {
        let cutoff = SystemTime::now()
            .checked_sub(window)
            .unwrap_or(std::time::UNIX_EPOCH);
        let history = self.inner.history.read();
        let Some(entries) = history.get(name) else {
            return ServiceMetrics::zero();
        };

        let in_window: Vec<&HealthCheckResult> = entries
            .iter()
            .filter(|r| r.observed_at >= cutoff)
            .collect();
        if in_window.is_empty() {
            return ServiceMetrics::zero();
        }

        let sample_count = in_window.len();
        let healthy = in_window
            .iter()
            .filter(|r| r.status == HealthStatus::Healthy)
            .count();
        let timed: Vec<u64> = in_window
            .iter()
            .filter_map(|r| r.response_time_ms)
            .collect();
        let avg_response_time_ms = if timed.is_empty() {
            0.0
        } else {
            timed.iter().sum::<u64>() as f64 / timed.len() as f64
        };

        ServiceMetrics {
            uptime_pct: healthy as f64 / sample_count as f64 * 100.0,
            avg_response_time_ms,
            error_rate_pct: (sample_count - healthy) as f64 / sample_count as f64 * 100.0,
            sample_count,
        }
    }

    /// Recorded history for one service, oldest first
    pub fn history(&self, name: &str) -> Vec<HealthCheckResult> {
        self.inner
            .history
            .read()
            .get(name)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Seconds since this monitor was constructed
    pub fn uptime_seconds(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }

    /// Start the continuous monitoring loop. Idempotent: a second call while
    /// the loop is running does nothing.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.is_some() {
            debug!("health monitoring already running");
            return;
        }

        info!(interval = ?self.interval, "starting continuous health monitoring");
        let monitor = self.clone();
        let interval = self.interval;
        *task = Some(tokio::spawn(async move {
            loop {
                sleep(interval).await;
                let report = monitor.check_all().await;
                debug!(overall = report.overall.as_str(), "health sweep complete");
            }
        }));
    }

    /// Stop the continuous monitoring loop. Idempotent.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            info!("stopping continuous health monitoring");
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    fn record(&self, result: HealthCheckResult) {
        let mut history = self.inner.history.write();
        let entries = history
            .entry(result.service_name.clone())
            .or_insert_with(VecDeque::new);
        if entries.len() >= self.inner.history_cap {
            entries.pop_front();
        }
        entries.push_back(result);
    }

    fn note_overall(&self, overall: HealthStatus) {
        let mut last = self.inner.last_overall.lock();
        if let Some(previous) = *last {
            if previous != overall {
                self.inner
                    .events
                    .publish(SystemEvent::Health(HealthEvent::OverallStatusChanged {
                        from: previous.as_str().to_string(),
                        to: overall.as_str().to_string(),
                    }));
            }
        }
        *last = Some(overall);
    }
}

fn failure_result(name: &str, error: String) -> HealthCheckResult {
    HealthCheckResult {
        service_name: name.to_string(),
        status: HealthStatus::Unhealthy,
        response_time_ms: None,
        error: Some(error),
        observed_at: SystemTime::now(),
    }
}

/// Aggregate rule: unhealthy dominates, then a majority of degraded
/// services degrades the whole, all-healthy is healthy, anything else is
/// degraded.
fn aggregate(results: &[HealthCheckResult]) -> HealthStatus {
    if results
        .iter()
        .any(|r| r.status == HealthStatus::Unhealthy)
    {
        return HealthStatus::Unhealthy;
    }
    let degraded = results
        .iter()
        .filter(|r| r.status == HealthStatus::Degraded)
        .count();
    if degraded * 2 > results.len() {
        return HealthStatus::Degraded;
    }
    if results.iter().all(|r| r.status == HealthStatus::Healthy) {
        return HealthStatus::Healthy;
    }
    HealthStatus::Degraded
}

#[cfg(test)]
mod tests {
    use super::*;
    use questdeck_core::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn monitor() -> HealthMonitor {
        HealthMonitor::new(EventBus::new(64))
    }

    fn static_probe(monitor: &HealthMonitor, name: &str, status: HealthStatus) {
        monitor.register_fn(name, move || async move {
            Ok(ProbeReport {
                status,
                detail: None,
            })
        });
    }

    #[tokio::test]
    async fn unregistered_service_is_unhealthy() {
        let monitor = monitor();
        let result = monitor.check_service("missing").await;
        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert!(result.error.as_deref().unwrap().contains("not registered"));
    }

    #[tokio::test]
    async fn any_unhealthy_service_dominates_the_aggregate() {
        let m = monitor();
        static_probe(&m, "a", HealthStatus::Healthy);
        static_probe(&m, "b", HealthStatus::Healthy);
        static_probe(&m, "c", HealthStatus::Unhealthy);

        let report = m.check_all().await;
        assert_eq!(report.overall, HealthStatus::Unhealthy);
        assert_eq!(report.services.len(), 3);
    }

    #[tokio::test]
    async fn degraded_majority_degrades_the_aggregate() {
        let m = monitor();
        static_probe(&m, "a", HealthStatus::Healthy);
        static_probe(&m, "b", HealthStatus::Degraded);
        static_probe(&m, "c", HealthStatus::Degraded);

        let report = m.check_all().await;
        assert_eq!(report.overall, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn all_healthy_aggregate_is_healthy() {
        let m = monitor();
        static_probe(&m, "a", HealthStatus::Healthy);
        static_probe(&m, "b", HealthStatus::Healthy);
        static_probe(&m, "c", HealthStatus::Healthy);

        let report = m.check_all().await;
        assert_eq!(report.overall, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn minority_degraded_still_degrades_the_aggregate() {
        let m = monitor();
        static_probe(&m, "a", HealthStatus::Healthy);
        static_probe(&m, "b", HealthStatus::Healthy);
        static_probe(&m, "c", HealthStatus::Degraded);

        // Not all healthy, no unhealthy, no degraded majority
        let report = m.check_all().await;
        assert_eq!(report.overall, HealthStatus::Degraded);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_records_a_timeout_not_its_result() {
        let m = monitor();
        m.register_with(
            "slow",
            Arc::new(FnProbe::new(|| async {
                sleep(Duration::from_millis(2000)).await;
                Ok(ProbeReport::healthy())
            })),
            ProbeSettings {
                timeout: Duration::from_millis(500),
                retries: 0,
            },
        );

        let result = m.check_service("slow").await;
        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert!(result.error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_probe_is_retried_then_recovers() {
        let m = monitor();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_in_probe = Arc::clone(&attempts);
        m.register_with(
            "flaky",
            Arc::new(FnProbe::new(move || {
                let attempts = Arc::clone(&attempts_in_probe);
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(Error::network("flaky", "connection refused"))
                    } else {
                        Ok(ProbeReport::healthy())
                    }
                }
            })),
            ProbeSettings {
                timeout: Duration::from_millis(500),
                retries: 2,
            },
        );

        let result = m.check_service("flaky").await;
        assert_eq!(result.status, HealthStatus::Healthy);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_record_the_last_error() {
        let m = monitor();
        m.register_with(
            "down",
            Arc::new(FnProbe::new(|| async {
                Err::<ProbeReport, _>(Error::network("down", "refused"))
            })),
            ProbeSettings {
                timeout: Duration::from_millis(500),
                retries: 2,
            },
        );

        let result = m.check_service("down").await;
        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert!(result.error.as_deref().unwrap().contains("refused"));
        assert_eq!(m.history("down").len(), 1);
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let m = monitor();
        static_probe(&m, "svc", HealthStatus::Healthy);
        for _ in 0..105 {
            m.check_service("svc").await;
        }
        assert_eq!(m.history("svc").len(), HEALTH_HISTORY_CAP);
    }

    #[tokio::test]
    async fn metrics_cover_only_the_window() {
        let m = monitor();
        static_probe(&m, "svc", HealthStatus::Healthy);
        m.check_service("svc").await;
        m.unregister("svc");
        static_probe(&m, "svc2", HealthStatus::Degraded);
        m.check_service("svc2").await;
        m.check_service("svc2").await;

        let metrics = m.service_metrics("svc2", Duration::from_secs(60));
        assert_eq!(metrics.sample_count, 2);
        assert_eq!(metrics.uptime_pct, 0.0);
        assert_eq!(metrics.error_rate_pct, 100.0);

        let missing = m.service_metrics("nobody", Duration::from_secs(60));
        assert_eq!(missing.sample_count, 0);
        assert_eq!(missing.uptime_pct, 0.0);
        assert_eq!(missing.avg_response_time_ms, 0.0);
    }

    #[tokio::test]
    async fn starting_twice_keeps_a_single_task() {
        let m = HealthMonitor::with_interval(EventBus::new(16), Duration::from_secs(3600));
        m.start();
        assert!(m.is_running());
        m.start();
        assert!(m.is_running());
        m.stop();
        assert!(!m.is_running());
        m.stop(); // idempotent
    }
}
