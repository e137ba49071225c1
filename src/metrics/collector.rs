use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

// Use global registry for Pingora's built-in Prometheus service
static TOTAL_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("guard_total_requests", "Total HTTP requests").expect("metric creation failed")
});

static ALLOWED_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("guard_allowed_requests", "Requests handed to the upstream")
        .expect("metric creation failed")
});

static DENIED_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("guard_denied_requests", "Requests rejected at the gate"),
        &["reason"],
    )
    .expect("metric creation failed")
});

pub struct MetricsCollector {
    pub registry: Arc<Registry>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        // Register with default registry (used by Pingora). Re-registration
        // of the same collectors is harmless.
        let _ = prometheus::register(Box::new(TOTAL_REQUESTS.clone()));
        let _ = prometheus::register(Box::new(ALLOWED_REQUESTS.clone()));
        let _ = prometheus::register(Box::new(DENIED_REQUESTS.clone()));

        Self {
            registry: Arc::new(prometheus::default_registry().clone()),
        }
    }

    pub fn increment_allowed_requests(&self) {
        TOTAL_REQUESTS.inc();
        ALLOWED_REQUESTS.inc();
    }

    pub fn increment_denied_requests(&self, reason: &str) {
        TOTAL_REQUESTS.inc();
        DENIED_REQUESTS.with_label_values(&[reason]).inc();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
