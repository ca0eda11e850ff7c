/*!
Observability for harvest state stores.

- Structured logging setup through `tracing-subscriber`
- Prometheus counters for state file loads and saves (`metrics` feature)
*/

#[cfg(feature = "metrics")]
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Registry, TextEncoder};
#[cfg(feature = "metrics")]
use std::sync::OnceLock;
use tracing::subscriber::set_global_default;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry as TracingRegistry};

use crate::{HarvestStateError, Result};

/// Filter directive applied when `RUST_LOG` does not mention this crate
pub const DEFAULT_LOG_DIRECTIVE: &str = "harvest_state=info";

#[cfg(feature = "metrics")]
static METRICS: OnceLock<StateMetrics> = OnceLock::new();

/// Metrics for durable state file activity
#[cfg(feature = "metrics")]
#[derive(Debug)]
pub struct StateMetrics {
    pub loads_total: Counter,
    pub corrupt_loads_total: Counter,
    pub saves_total: Counter,
    pub save_failures_total: Counter,
    pub snapshot_size_bytes: Histogram,

    registry: Registry,
}

#[cfg(feature = "metrics")]
impl StateMetrics {
    fn new() -> Result<Self> {
        let registry = Registry::new();

        let loads_total = counter(
            &registry,
            "harvest_state_loads_total",
            "State files successfully loaded",
        )?;
        let corrupt_loads_total = counter(
            &registry,
            "harvest_state_corrupt_loads_total",
            "State files that failed to parse",
        )?;
        let saves_total = counter(
            &registry,
            "harvest_state_saves_total",
            "State snapshots atomically saved",
        )?;
        let save_failures_total = counter(
            &registry,
            "harvest_state_save_failures_total",
            "State saves aborted by a filesystem error",
        )?;

        let snapshot_size_bytes = Histogram::with_opts(HistogramOpts::new(
            "harvest_state_snapshot_size_bytes",
            "Size of serialized state snapshots in bytes",
        ))
        .map_err(|e| {
            HarvestStateError::storage(format!(
                "Failed to create snapshot_size_bytes metric: {e}"
            ))
        })?;
        registry
            .register(Box::new(snapshot_size_bytes.clone()))
            .map_err(|e| {
                HarvestStateError::storage(format!("Failed to register snapshot_size_bytes: {e}"))
            })?;

        Ok(Self {
            loads_total,
            corrupt_loads_total,
            saves_total,
            save_failures_total,
            snapshot_size_bytes,
            registry,
        })
    }

    /// Get or initialize the global metrics instance
    pub fn global() -> &'static StateMetrics {
        METRICS.get_or_init(|| Self::new().expect("Failed to initialize harvest state metrics"))
    }

    pub fn record_load(&self) {
        self.loads_total.inc();
    }

    pub fn record_corrupt_load(&self) {
        self.corrupt_loads_total.inc();
    }

    pub fn record_save(&self) {
        self.saves_total.inc();
    }

    pub fn record_save_failure(&self) {
        self.save_failures_total.inc();
    }

    pub fn record_snapshot_size(&self, size_bytes: usize) {
        self.snapshot_size_bytes.observe(size_bytes as f64);
    }

    /// Gather metrics in Prometheus text format
    pub fn gather_metrics(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| HarvestStateError::storage(format!("Failed to encode metrics: {e}")))?;

        String::from_utf8(buffer).map_err(|e| {
            HarvestStateError::storage(format!("Failed to convert metrics to string: {e}"))
        })
    }
}

#[cfg(feature = "metrics")]
fn counter(registry: &Registry, name: &str, help: &str) -> Result<Counter> {
    let counter = Counter::new(name, help).map_err(|e| {
        HarvestStateError::storage(format!("Failed to create {name} metric: {e}"))
    })?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(|e| HarvestStateError::storage(format!("Failed to register {name}: {e}")))?;
    Ok(counter)
}

/// Build the filter used by the subscriber: `RUST_LOG` plus the crate default
pub fn env_filter() -> Result<EnvFilter> {
    let directive = DEFAULT_LOG_DIRECTIVE
        .parse::<Directive>()
        .map_err(|e| HarvestStateError::validation(format!("Invalid log directive: {e}")))?;
    Ok(EnvFilter::from_default_env().add_directive(directive))
}

/// Install the global tracing subscriber with the crate's default filter
///
/// # Arguments
/// * `json` - Emit one JSON object per event instead of human-readable lines
///
/// # Returns
/// An error if a global subscriber is already installed
pub fn init_observability(json: bool) -> Result<()> {
    init_observability_with_filter(json, env_filter()?)
}

/// Install the global tracing subscriber with a caller-supplied filter
///
/// Events go to stderr so stdout stays free for command output.
pub fn init_observability_with_filter(json: bool, filter: EnvFilter) -> Result<()> {
    #[cfg(feature = "metrics")]
    StateMetrics::global();

    let result = if json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(false)
            .with_writer(std::io::stderr);
        set_global_default(TracingRegistry::default().with(filter).with(fmt_layer))
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);
        set_global_default(TracingRegistry::default().with(filter).with(fmt_layer))
    };

    result.map_err(|e| {
        HarvestStateError::storage(format!("Failed to set global tracing subscriber: {e}"))
    })?;

    tracing::debug!("Harvest state observability initialized");
    Ok(())
}

/// Initialize observability with human-readable output
pub fn init_default_observability() -> Result<()> {
    init_observability(false)
}
