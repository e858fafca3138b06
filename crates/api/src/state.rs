//! Injected application state.

use questdeck_core::{ErrorClassifier, EventBus};
use questdeck_guard::AbuseGuard;
use questdeck_health::HealthMonitor;
use std::sync::Arc;

/// Handles to the core components, constructed at startup by the hosting
/// process and passed by reference to every handler.
#[derive(Clone)]
pub struct AppState {
    pub health: HealthMonitor,
    pub guard: AbuseGuard,
    pub classifier: Arc<ErrorClassifier>,
    pub events: EventBus,
}

impl AppState {
    pub fn new(
        health: HealthMonitor,
        guard: AbuseGuard,
        classifier: Arc<ErrorClassifier>,
        events: EventBus,
    ) -> Self {
        Self {
            health,
            guard,
            classifier,
            events,
        }
    }
}
