//! The push exporter's emit cycle: sleep, scan every registry, format and
//! send a datagram per changed cell.
//!
//! Built on [`vitals::PeriodicTask`] rather than a raw `thread::sleep` loop,
//! with a recency-filtered snapshot-then-format pipeline for the
//! stale-window check.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::{error, warn};

use vitals::metric::Kind;
use vitals::{default_registry, LabelSet, Metric, PeriodicTask, Registry};

use crate::backend::PushBackend;
use crate::format::format_float;
use crate::telemetry::Telemetry;

fn now_secs() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}

/// A cell is *not* emitted exactly when its `last_changed` falls strictly
/// inside `(stale_floor, last_emission_timestamp)`. With no prior emission
/// yet, nothing is ever filtered: the first cycle always emits every cell.
fn is_stale(last_changed: f64, stale_floor: f64, last_emission_timestamp: Option<f64>) -> bool {
    match last_emission_timestamp {
        Some(last_emission_ts) => stale_floor < last_changed && last_changed < last_emission_ts,
        None => false,
    }
}

pub(crate) struct Config {
    pub(crate) send_interval: Duration,
    pub(crate) send_older_than: Duration,
    pub(crate) backend: Box<dyn PushBackend>,
    pub(crate) registries: Vec<Arc<Registry>>,
}

/// Per-cycle mutable state. Exporter-owned and touched only from within an
/// emit cycle, which the owning [`PeriodicTask`] guarantees never overlaps
/// with another cycle. A never-contended `parking_lot::Mutex` is simplest
/// here, at no meaningful cost.
struct EmitState {
    /// `None` until the first cycle completes (the "never emitted" sentinel).
    last_emission_timestamp: Option<f64>,
    last_emitted: HashMap<(String, LabelSet), f64>,
}

struct Inner {
    config: Config,
    state: Mutex<EmitState>,
    telemetry: Telemetry,
    telemetry_registered: AtomicBool,
    task: Mutex<Option<PeriodicTask>>,
}

/// A periodic background worker that scans registered metrics and pushes
/// them as DogStatsD UDP datagrams.
///
/// Cheap to clone: clones share the same underlying state, the same
/// `Arc`-backed handle shape used throughout `vitals`.
#[derive(Clone)]
pub struct PushExporter {
    inner: Arc<Inner>,
}

impl PushExporter {
    pub(crate) fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(EmitState { last_emission_timestamp: None, last_emitted: HashMap::new() }),
                telemetry: Telemetry::new(),
                telemetry_registered: AtomicBool::new(false),
                task: Mutex::new(None),
            }),
        }
    }

    /// Registers the exporter's self-metrics (on first call across this
    /// exporter's lifetime) and, if the send interval is nonzero, spawns a
    /// periodic task bound to the emit cycle. A zero interval logs a
    /// warning and does nothing.
    pub fn start(&self) {
        if self.inner.config.send_interval.is_zero() {
            warn!("push exporter send_interval is zero, not starting");
            return;
        }

        if !self.inner.telemetry_registered.swap(true, Ordering::SeqCst) {
            self.inner.telemetry.register_to(&default_registry());
        }

        let inner = Arc::clone(&self.inner);
        let task =
            PeriodicTask::spawn("vitals-dogstatsd-push", self.inner.config.send_interval, move || {
                inner.emit_cycle();
            });
        *self.inner.task.lock() = Some(task);
    }

    /// Cancels and joins the periodic task, if one is running. A no-op if
    /// the exporter was never started (or already stopped).
    pub fn stop(&self) {
        let task = self.inner.task.lock().take();
        if let Some(task) = task {
            if let Err(panic) = task.stop() {
                error!(panic = ?panic, "push exporter task panicked while stopping");
            }
        }
    }

    /// Runs a single emit cycle synchronously, without a periodic task.
    /// Exposed for embedders that drive their own scheduling and for tests.
    pub fn tick(&self) {
        self.inner.emit_cycle();
    }
}

impl Inner {
    fn emit_cycle(&self) {
        let cycle_start = quanta::Instant::now();
        let new_ts = now_secs();

        let mut state = self.state.lock();
        let last_emission_timestamp = state.last_emission_timestamp;
        let stale_floor = new_ts - self.config.send_older_than.as_secs_f64();

        let mut messages = Vec::new();

        for registry in &self.config.registries {
            for (name, metric) in registry.iter() {
                let kind = metric.kind();
                let mut cells = metric.snapshot_cells();
                cells.sort_by(|a, b| a.labels().cmp(b.labels()));

                for cell in cells {
                    let last_changed = cell.last_changed();

                    if is_stale(last_changed, stale_floor, last_emission_timestamp) {
                        continue;
                    }

                    let labels = cell.labels().clone();
                    let value = cell.value();
                    let tags = labels.dogstatsd_tags();

                    let message = match kind {
                        Kind::Counter => {
                            let key = (name.clone(), labels);
                            let baseline = state.last_emitted.get(&key).copied().unwrap_or(0.0);
                            let delta = value - baseline;
                            state.last_emitted.insert(key, value);
                            format!("{name}:{}|c{tags}", format_float(delta))
                        }
                        Kind::Gauge => format!("{name}:{}|g{tags}", format_float(value)),
                    };
                    messages.push(message);
                }
            }
        }

        if let Some(last_emission_ts) = last_emission_timestamp {
            let lag_secs = (new_ts - last_emission_ts) - self.config.send_interval.as_secs_f64();
            if lag_secs > 0.0 {
                let lag_ms = (lag_secs * 1000.0).round();
                self.telemetry.emission_lag_ms.counter_cell(&LabelSet::empty()).inc(lag_ms);
            }
        }

        for message in &messages {
            if let Err(err) = self.config.backend.send(message) {
                error!(error = %err, message = %message, "push exporter backend send failed");
            }
        }

        state.last_emission_timestamp = Some(new_ts);
        drop(state);

        self.telemetry.packets_sent.counter_cell(&LabelSet::empty()).inc(messages.len() as f64);
        let elapsed_ms = cycle_start.elapsed().as_secs_f64() * 1000.0;
        self.telemetry.emission_duration_ms.counter_cell(&LabelSet::empty()).inc(elapsed_ms);
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::backend::test_util::RecordingBackend;
    use crate::builder::DogStatsDPushBuilder;
    use vitals::metric::labels;
    use vitals::LabelValue;

    fn builder_with(backend: RecordingBackend, registry: Arc<Registry>) -> DogStatsDPushBuilder {
        DogStatsDPushBuilder::new().with_backend(backend).with_registry(registry)
    }

    #[test]
    fn scenario_c_counter_delta_emission() {
        let registry = Arc::new(Registry::new());
        let counter = Metric::counter();
        registry.register(counter.clone(), "counter", false).unwrap();
        let backend = RecordingBackend::new();
        let exporter = builder_with(backend.clone(), registry).build().unwrap();

        exporter.tick();
        assert_eq!(backend.sent(), vec!["counter:0.0|c".to_owned()]);

        counter.counter_cell(&LabelSet::empty()).inc(1.0);
        exporter.tick();
        assert_eq!(backend.sent()[1..], vec!["counter:1.0|c".to_owned()]);

        exporter.tick();
        assert_eq!(backend.sent().len(), 2, "unchanged cell within the recency window must be suppressed");

        counter.counter_cell(&LabelSet::empty()).inc(2.0);
        exporter.tick();
        assert_eq!(backend.sent()[2..], vec!["counter:2.0|c".to_owned()]);
    }

    #[test]
    fn scenario_d_gauge_absolute_emission() {
        let registry = Arc::new(Registry::new());
        let gauge = Metric::gauge(1.0);
        registry.register(gauge.clone(), "gg", false).unwrap();
        let backend = RecordingBackend::new();
        let exporter = builder_with(backend.clone(), registry).build().unwrap();

        exporter.tick();
        assert_eq!(backend.sent(), vec!["gg:1.0|g".to_owned()]);

        exporter.tick();
        assert_eq!(backend.sent().len(), 1, "unchanged gauge must be suppressed on cycle 2");

        gauge.gauge_cell(&LabelSet::empty()).inc(2.0);
        exporter.tick();
        assert_eq!(backend.sent()[1..], vec!["gg:3.0|g".to_owned()]);

        gauge.gauge_cell(&LabelSet::empty()).dec(0.5);
        exporter.tick();
        assert_eq!(backend.sent()[2..], vec!["gg:2.5|g".to_owned()]);
    }

    #[test]
    fn first_cycle_emits_even_a_zero_valued_counter() {
        let registry = Arc::new(Registry::new());
        registry.register(Metric::counter(), "counter", false).unwrap();
        let backend = RecordingBackend::new();
        let exporter = builder_with(backend.clone(), registry).build().unwrap();

        exporter.tick();
        assert_eq!(backend.sent(), vec!["counter:0.0|c".to_owned()]);
    }

    #[test]
    fn labels_are_rendered_as_dogstatsd_tags_in_canonical_order() {
        let registry = Arc::new(Registry::new());
        let schema = vitals::LabelSchema::new([
            ("region".to_owned(), vitals::LabelType::String),
            ("shard".to_owned(), vitals::LabelType::Int64),
        ]);
        let gauge = Metric::grouped_gauge(schema, 0.0);
        registry.register(gauge.clone(), "load", false).unwrap();
        gauge
            .gauge_cell(&labels([("shard", LabelValue::from(2i64)), ("region", LabelValue::from("us"))]))
            .set(0.75);

        let backend = RecordingBackend::new();
        let exporter = builder_with(backend.clone(), registry).build().unwrap();
        exporter.tick();

        assert_eq!(backend.sent(), vec!["load:0.75|g|#region:us,shard:2".to_owned()]);
    }

    #[test]
    fn recency_window_suppresses_a_cell_unchanged_since_last_emission() {
        let registry = Arc::new(Registry::new());
        let counter = Metric::counter();
        registry.register(counter.clone(), "stable", false).unwrap();

        let backend = RecordingBackend::new();
        let exporter = builder_with(backend.clone(), registry)
            .with_send_older_than(Duration::from_secs(3600))
            .build()
            .unwrap();

        exporter.tick();
        exporter.tick();
        assert_eq!(backend.sent().len(), 1, "second cycle with no mutation must be filtered by recency");
    }

    #[test]
    fn start_on_zero_interval_is_a_noop_and_stop_is_harmless() {
        let registry = Arc::new(Registry::new());
        let backend = RecordingBackend::new();
        let exporter = builder_with(backend, registry).with_send_interval(Duration::ZERO).build().unwrap();

        exporter.start();
        exporter.stop();
        thread::sleep(Duration::from_millis(10));
    }
}

#[cfg(test)]
mod stale_proptests {
    use super::is_stale;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn first_cycle_never_filters(last_changed in -1e9f64..1e9, stale_floor in -1e9f64..1e9) {
            prop_assert!(!is_stale(last_changed, stale_floor, None));
        }

        #[test]
        fn strictly_inside_the_window_is_filtered(
            stale_floor in -1e6f64..1e6,
            inner_gap in 0.001f64..1e6,
            outer_gap in 0.001f64..1e6,
        ) {
            let last_changed = stale_floor + inner_gap;
            let last_emission_ts = last_changed + outer_gap;
            prop_assert!(is_stale(last_changed, stale_floor, Some(last_emission_ts)));
        }

        #[test]
        fn at_or_outside_either_boundary_is_not_filtered(
            stale_floor in -1e6f64..1e6,
            last_emission_ts in -1e6f64..1e6,
        ) {
            // last_changed exactly at the floor, or at/after the last
            // emission timestamp, must never be filtered (strict
            // inequality on both sides).
            prop_assert!(!is_stale(stale_floor, stale_floor, Some(last_emission_ts)));
            prop_assert!(!is_stale(last_emission_ts, stale_floor, Some(last_emission_ts)));
        }
    }
}
