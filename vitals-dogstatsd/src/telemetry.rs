//! The exporter's own self-metrics.
//!
//! Lazily-registered counters that track the exporter's own health (packets
//! sent, scheduling lag, cycle duration), registered to the default
//! registry the first time the exporter starts.

use tracing::warn;

use vitals::metric::Metric;
use vitals::{MetricCollection, Registry};

pub(crate) struct Telemetry {
    pub(crate) packets_sent: Metric,
    pub(crate) emission_lag_ms: Metric,
    pub(crate) emission_duration_ms: Metric,
}

impl Telemetry {
    pub(crate) fn new() -> Self {
        Self {
            packets_sent: Metric::counter(),
            emission_lag_ms: Metric::counter(),
            emission_duration_ms: Metric::counter(),
        }
    }

    /// Registers the three self-metrics to `registry`, tolerating (with a
    /// warning) a name already taken by something else. A failed
    /// self-metric registration must never stop the exporter from running.
    pub(crate) fn register_to(&self, registry: &Registry) {
        if let Err(err) = registry.register_collection(self) {
            warn!(error = %err, "failed to register push exporter self-metrics");
        }
    }
}

impl MetricCollection for Telemetry {
    fn members(&self) -> Vec<(&'static str, Metric)> {
        vec![
            ("exporter_packets_sent_total", self.packets_sent.clone()),
            ("exporter_emission_lag_ms_total", self.emission_lag_ms.clone()),
            ("exporter_emission_duration_ms_total", self.emission_duration_ms.clone()),
        ]
    }
}
