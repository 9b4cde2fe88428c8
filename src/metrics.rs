use anyhow::{Context, Result};
use cdp_adapter::metrics as cdp_metrics;
use once_cell::sync::{Lazy, OnceCell};
use prometheus::{Encoder, Registry, TextEncoder};

static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static REGISTER_ONCE: OnceCell<()> = OnceCell::new();

pub fn register_metrics() {
    REGISTER_ONCE.get_or_init(|| {
        cdp_metrics::register_metrics(global_registry());
    });
}

pub fn global_registry() -> &'static Registry {
    &GLOBAL_REGISTRY
}

/// Prometheus text exposition of every registered metric.
pub fn render_text() -> Result<String> {
    register_metrics();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&global_registry().gather(), &mut buffer)
        .context("failed to encode prometheus metrics")?;
    String::from_utf8(buffer).context("prometheus output is not utf-8")
}
