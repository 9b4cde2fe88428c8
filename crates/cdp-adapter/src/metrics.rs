use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{
    core::Collector, histogram_opts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};
use serde::Serialize;
use tracing::error;

/// Process-wide counters, readable without a prometheus registry.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AdapterMetricsSnapshot {
    pub commands: u64,
    pub command_success: u64,
    pub command_failures: u64,
    pub command_latency_total_us: u64,
    pub events: u64,
    pub attaches: u64,
}

static COMMANDS: AtomicU64 = AtomicU64::new(0);
static COMMAND_SUCCESS: AtomicU64 = AtomicU64::new(0);
static COMMAND_FAILURES: AtomicU64 = AtomicU64::new(0);
static COMMAND_LATENCY_TOTAL_US: AtomicU64 = AtomicU64::new(0);
static EVENTS: AtomicU64 = AtomicU64::new(0);
static ATTACHES: AtomicU64 = AtomicU64::new(0);

lazy_static! {
    static ref CDP_COMMANDS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("recorder_cdp_commands_total", "CDP commands sent"),
        &["method"]
    )
    .unwrap();
    static ref CDP_COMMAND_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("recorder_cdp_command_failures_total", "CDP commands that failed"),
        &["method"]
    )
    .unwrap();
    static ref CDP_COMMAND_DURATION: HistogramVec = HistogramVec::new(
        histogram_opts!(
            "recorder_cdp_command_duration_seconds",
            "CDP command round-trip latency",
            vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]
        ),
        &["method"]
    )
    .unwrap();
    static ref CDP_EVENTS_TOTAL: IntCounter =
        IntCounter::new("recorder_cdp_events_total", "CDP events received").unwrap();
    static ref CDP_ATTACHES_TOTAL: IntCounter =
        IntCounter::new("recorder_cdp_attaches_total", "Debugger sessions attached").unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(target: "cdp-adapter", ?err, "failed to register cdp metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, CDP_COMMANDS_TOTAL.clone());
    register(registry, CDP_COMMAND_FAILURES_TOTAL.clone());
    register(registry, CDP_COMMAND_DURATION.clone());
    register(registry, CDP_EVENTS_TOTAL.clone());
    register(registry, CDP_ATTACHES_TOTAL.clone());
}

pub fn record_command(method: &str) {
    COMMANDS.fetch_add(1, Ordering::Relaxed);
    CDP_COMMANDS_TOTAL.with_label_values(&[method]).inc();
}

pub fn record_command_success(method: &str, duration: Duration) {
    COMMAND_SUCCESS.fetch_add(1, Ordering::Relaxed);
    let micros = duration.as_micros().min(u64::MAX as u128) as u64;
    COMMAND_LATENCY_TOTAL_US.fetch_add(micros, Ordering::Relaxed);
    CDP_COMMAND_DURATION
        .with_label_values(&[method])
        .observe(duration.as_secs_f64());
}

pub fn record_command_failure(method: &str) {
    COMMAND_FAILURES.fetch_add(1, Ordering::Relaxed);
    CDP_COMMAND_FAILURES_TOTAL.with_label_values(&[method]).inc();
}

pub fn record_event() {
    EVENTS.fetch_add(1, Ordering::Relaxed);
    CDP_EVENTS_TOTAL.inc();
}

pub fn record_attach() {
    ATTACHES.fetch_add(1, Ordering::Relaxed);
    CDP_ATTACHES_TOTAL.inc();
}

pub fn snapshot() -> AdapterMetricsSnapshot {
    AdapterMetricsSnapshot {
        commands: COMMANDS.load(Ordering::Relaxed),
        command_success: COMMAND_SUCCESS.load(Ordering::Relaxed),
        command_failures: COMMAND_FAILURES.load(Ordering::Relaxed),
        command_latency_total_us: COMMAND_LATENCY_TOTAL_US.load(Ordering::Relaxed),
        events: EVENTS.load(Ordering::Relaxed),
        attaches: ATTACHES.load(Ordering::Relaxed),
    }
}

impl AdapterMetricsSnapshot {
    /// Counter deltas since `earlier`.
    pub fn since(&self, earlier: &AdapterMetricsSnapshot) -> AdapterMetricsSnapshot {
        AdapterMetricsSnapshot {
            commands: self.commands.saturating_sub(earlier.commands),
            command_success: self.command_success.saturating_sub(earlier.command_success),
            command_failures: self.command_failures.saturating_sub(earlier.command_failures),
            command_latency_total_us: self
                .command_latency_total_us
                .saturating_sub(earlier.command_latency_total_us),
            events: self.events.saturating_sub(earlier.events),
            attaches: self.attaches.saturating_sub(earlier.attaches),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_track_commands_recorded_in_between() {
        let before = snapshot();
        record_command("Runtime.evaluate");
        record_command_success("Runtime.evaluate", Duration::from_micros(150));
        record_command("Input.dispatchMouseEvent");
        record_command_failure("Input.dispatchMouseEvent");
        record_attach();
        let delta = snapshot().since(&before);
        assert!(delta.commands >= 2);
        assert!(delta.command_success >= 1);
        assert!(delta.command_failures >= 1);
        assert!(delta.command_latency_total_us >= 150);
        assert!(delta.attaches >= 1);
    }

    #[test]
    fn registering_twice_is_harmless() {
        let registry = Registry::new();
        register_metrics(&registry);
        register_metrics(&registry);
        record_event();
        assert!(!registry.gather().is_empty());
    }
}
