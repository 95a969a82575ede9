//! Metrics: scalar or grouped collections of [`NumericCell`]s, and the
//! `Counter`/`Gauge` handles instrumented code actually holds.
//!
//! A metric's name is set once, on first registration; later registration
//! under a different name is rejected.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{error, warn};

use crate::cell::NumericCell;
use crate::label::{LabelSchema, LabelSet, LabelValue};

/// The maximum number of distinct label-set cells a grouped metric will
/// hold before the least-recently-changed cell is evicted.
pub const MAX_CELLS: usize = 200;

/// The kind of a metric, fixed at construction and never changed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Kind {
    /// Monotonic counter.
    Counter,
    /// Free-form gauge.
    Gauge,
}

/// Internal storage for a metric: either a single cell, or a label-keyed
/// group of cells bounded by [`MAX_CELLS`].
enum Storage {
    Scalar(Arc<NumericCell>),
    Grouped {
        schema: LabelSchema,
        default_value: f64,
        cells: Mutex<HashMap<LabelSet, Arc<NumericCell>>>,
    },
}

/// A named (or not-yet-named) metric: a counter or a gauge, scalar or
/// grouped.
///
/// Cloning a `Metric` clones the handle, not the storage. All clones are
/// `Arc`-backed and observe the same cells.
#[derive(Clone)]
pub struct Metric {
    inner: Arc<MetricInner>,
}

struct MetricInner {
    kind: Kind,
    storage: Storage,
    // Set exactly once, on first registration; subsequent registrations
    // under a different name are a `NameConflict` error (see registry.rs).
    name: RwLock<Option<String>>,
}

/// The result of resolving a cell for a label assignment: either a real
/// cell, or a [`DummyCell`] sentinel for invalid accesses.
pub enum CellRef {
    /// A real, schema-valid cell.
    Real(Arc<NumericCell>),
    /// A sentinel returned for invalid label accesses. All mutations on it
    /// are logged no-ops.
    Dummy(DummyCell),
}

/// Sentinel naming the metric and labels that produced an invalid access,
/// for logging purposes.
pub struct DummyCell {
    metric_name: String,
    attempted_labels: LabelSet,
}

impl DummyCell {
    fn log_inc(&self) {
        error!(
            metric = %self.metric_name,
            labels = %describe(&self.attempted_labels),
            "inc! on dummy cell: invalid label access, mutation dropped"
        );
    }
    fn log_dec(&self) {
        error!(
            metric = %self.metric_name,
            labels = %describe(&self.attempted_labels),
            "dec! on dummy cell: invalid label access, mutation dropped"
        );
    }
    fn log_set(&self) {
        error!(
            metric = %self.metric_name,
            labels = %describe(&self.attempted_labels),
            "set! on dummy cell: invalid label access, mutation dropped"
        );
    }
    fn log_set_if_greater(&self) {
        error!(
            metric = %self.metric_name,
            labels = %describe(&self.attempted_labels),
            "set_if_greater on dummy cell: invalid label access, mutation dropped"
        );
    }
}

fn describe(labels: &LabelSet) -> String {
    if labels.is_empty() {
        "<none>".to_owned()
    } else {
        labels.formatted()
    }
}

impl Metric {
    /// Creates a detached scalar counter.
    pub fn counter() -> Self {
        Self::scalar(Kind::Counter, 0.0)
    }

    /// Creates a detached scalar gauge with the given initial value.
    pub fn gauge(initial: f64) -> Self {
        Self::scalar(Kind::Gauge, initial)
    }

    /// Creates a detached grouped counter with the given label schema.
    pub fn grouped_counter(schema: LabelSchema) -> Self {
        Self::grouped(Kind::Counter, schema, 0.0)
    }

    /// Creates a detached grouped gauge with the given label schema and
    /// default initial value for new cells.
    pub fn grouped_gauge(schema: LabelSchema, default_value: f64) -> Self {
        Self::grouped(Kind::Gauge, schema, default_value)
    }

    fn scalar(kind: Kind, initial: f64) -> Self {
        Self {
            inner: Arc::new(MetricInner {
                kind,
                storage: Storage::Scalar(Arc::new(NumericCell::new(initial, LabelSet::empty()))),
                name: RwLock::new(None),
            }),
        }
    }

    fn grouped(kind: Kind, schema: LabelSchema, default_value: f64) -> Self {
        Self {
            inner: Arc::new(MetricInner {
                kind,
                storage: Storage::Grouped { schema, default_value, cells: Mutex::new(HashMap::new()) },
                name: RwLock::new(None),
            }),
        }
    }

    /// The metric's kind.
    pub fn kind(&self) -> Kind {
        self.inner.kind
    }

    /// The metric's registered name, if any.
    pub fn name(&self) -> Option<String> {
        self.inner.name.read().clone()
    }

    /// Whether this metric has at least one declared label (is "grouped").
    pub fn is_grouped(&self) -> bool {
        matches!(self.inner.storage, Storage::Grouped { .. })
    }

    /// The declared label field names, for grouped metrics (empty for scalars).
    pub fn schema_field_names(&self) -> Vec<String> {
        match &self.inner.storage {
            Storage::Grouped { schema, .. } => schema.field_names().map(str::to_owned).collect(),
            Storage::Scalar(_) => Vec::new(),
        }
    }

    /// Sets the metric's name if unset, or verifies it matches if already set.
    ///
    /// Returns `Err((existing, requested))` on a genuine conflict.
    pub(crate) fn bind_name(&self, requested: &str) -> Result<(), (String, String)> {
        let mut guard = self.inner.name.write();
        match &*guard {
            Some(existing) if existing != requested => {
                Err((existing.clone(), requested.to_owned()))
            }
            Some(_) => Ok(()),
            None => {
                *guard = Some(requested.to_owned());
                Ok(())
            }
        }
    }

    /// Resolves the cell for the given label assignment, creating it if
    /// needed. Scalar metrics accept only the empty label set.
    pub fn get_cell(&self, labels: &LabelSet) -> CellRef {
        match &self.inner.storage {
            Storage::Scalar(cell) => {
                if labels.is_empty() {
                    CellRef::Real(Arc::clone(cell))
                } else {
                    CellRef::Dummy(self.dummy_for(labels.clone()))
                }
            }
            Storage::Grouped { schema, default_value, cells } => {
                if !schema.matches(labels) {
                    return CellRef::Dummy(self.dummy_for(labels.clone()));
                }

                let mut guard = cells.lock();
                if let Some(existing) = guard.get(labels) {
                    return CellRef::Real(Arc::clone(existing));
                }

                let created = Arc::new(NumericCell::new(*default_value, labels.clone()));
                guard.insert(labels.clone(), Arc::clone(&created));

                if guard.len() > MAX_CELLS {
                    evict_lru(&mut guard, labels);
                }

                CellRef::Real(created)
            }
        }
    }

    /// Non-creating variant of [`Metric::get_cell`]: returns `None` on
    /// schema mismatch or a missing cell, and never mutates the map.
    pub fn get_cell_if_exists(&self, labels: &LabelSet) -> Option<Arc<NumericCell>> {
        match &self.inner.storage {
            Storage::Scalar(cell) => labels.is_empty().then(|| Arc::clone(cell)),
            Storage::Grouped { schema, cells, .. } => {
                if !schema.matches(labels) {
                    return None;
                }
                cells.lock().get(labels).map(Arc::clone)
            }
        }
    }

    /// The number of cells currently held by a grouped metric (always 1 for
    /// scalars).
    pub fn cell_count(&self) -> usize {
        match &self.inner.storage {
            Storage::Scalar(_) => 1,
            Storage::Grouped { cells, .. } => cells.lock().len(),
        }
    }

    /// Returns a snapshot copy of every cell currently held, for readers
    /// (the scrape formatter, the push exporter) that need to walk all
    /// cells without holding the metric's lock for the duration.
    pub fn snapshot_cells(&self) -> Vec<Arc<NumericCell>> {
        match &self.inner.storage {
            Storage::Scalar(cell) => vec![Arc::clone(cell)],
            Storage::Grouped { cells, .. } => cells.lock().values().cloned().collect(),
        }
    }

    /// Resets the scalar cell's value to zero. No-op for grouped metrics;
    /// `zero_all` does not iterate grouped cells.
    pub(crate) fn zero_scalar(&self) {
        if let Storage::Scalar(cell) = &self.inner.storage {
            cell.set(0.0);
        }
    }

    fn dummy_for(&self, labels: LabelSet) -> DummyCell {
        DummyCell {
            metric_name: self.name().unwrap_or_else(|| "<unregistered>".to_owned()),
            attempted_labels: labels,
        }
    }
}

fn evict_lru(cells: &mut HashMap<LabelSet, Arc<NumericCell>>, just_inserted: &LabelSet) {
    let victim = cells
        .iter()
        .filter(|(labels, _)| *labels != just_inserted)
        .min_by(|(_, a), (_, b)| {
            a.last_changed().partial_cmp(&b.last_changed()).unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(labels, _)| labels.clone());

    if let Some(victim) = victim {
        warn!(cell_count = cells.len(), "grouped metric exceeded MAX_CELLS, evicting LRU cell");
        cells.remove(&victim);
    }
}

/// A handle for mutating a counter cell, resolved via [`Metric::get_cell`].
pub struct Counter(pub(crate) CellRef);

impl Counter {
    /// Increments the counter. A negative delta is a logged no-op, never a
    /// crash.
    pub fn inc(&self, delta: f64) {
        match &self.0 {
            CellRef::Real(cell) => {
                if delta < 0.0 {
                    warn!(delta, "inc! with negative delta on counter, dropped");
                    return;
                }
                cell.add(delta);
            }
            CellRef::Dummy(dummy) => dummy.log_inc(),
        }
    }

    /// Records an externally tracked monotonic counter's current value via
    /// an atomic max.
    pub fn set_if_greater(&self, value: f64) {
        match &self.0 {
            CellRef::Real(cell) => cell.set_if_greater(value),
            CellRef::Dummy(dummy) => dummy.log_set_if_greater(),
        }
    }

    /// The current value, or `0.0` for a dummy cell (not logged; only
    /// mutation paths log, reads stay silent).
    pub fn value(&self) -> f64 {
        match &self.0 {
            CellRef::Real(cell) => cell.value(),
            CellRef::Dummy(_) => 0.0,
        }
    }
}

/// A handle for mutating a gauge cell, resolved via [`Metric::get_cell`].
pub struct Gauge(pub(crate) CellRef);

impl Gauge {
    /// Increments the gauge by any delta (positive or negative).
    pub fn inc(&self, delta: f64) {
        match &self.0 {
            CellRef::Real(cell) => cell.add(delta),
            CellRef::Dummy(dummy) => dummy.log_inc(),
        }
    }

    /// Decrements the gauge. A negative delta is a logged no-op, symmetric
    /// with [`Counter::inc`].
    pub fn dec(&self, delta: f64) {
        match &self.0 {
            CellRef::Real(cell) => {
                if delta < 0.0 {
                    warn!(delta, "dec! with negative delta on gauge, dropped");
                    return;
                }
                cell.add(-delta);
            }
            CellRef::Dummy(dummy) => dummy.log_dec(),
        }
    }

    /// Sets the gauge to an absolute value.
    pub fn set(&self, value: f64) {
        match &self.0 {
            CellRef::Real(cell) => cell.set(value),
            CellRef::Dummy(dummy) => dummy.log_set(),
        }
    }

    /// The current value, or `0.0` for a dummy cell.
    pub fn value(&self) -> f64 {
        match &self.0 {
            CellRef::Real(cell) => cell.value(),
            CellRef::Dummy(_) => 0.0,
        }
    }
}

impl Metric {
    /// Resolves a [`Counter`] handle for the given labels. Panics if this
    /// metric's kind is not [`Kind::Counter`] (a programmer error, not a
    /// hot-path condition, since kind is fixed at construction).
    pub fn counter_cell(&self, labels: &LabelSet) -> Counter {
        assert_eq!(self.kind(), Kind::Counter, "counter_cell called on a non-counter metric");
        Counter(self.get_cell(labels))
    }

    /// Resolves a [`Gauge`] handle for the given labels. Panics if this
    /// metric's kind is not [`Kind::Gauge`].
    pub fn gauge_cell(&self, labels: &LabelSet) -> Gauge {
        assert_eq!(self.kind(), Kind::Gauge, "gauge_cell called on a non-gauge metric");
        Gauge(self.get_cell(labels))
    }
}

/// Convenience constructor for a [`LabelSet`] from `(&str, impl Into<LabelValue>)` pairs.
pub fn labels<const N: usize>(pairs: [(&str, LabelValue); N]) -> LabelSet {
    LabelSet::new(pairs.into_iter().map(|(k, v)| (k.to_owned(), v)))
}
