//! The numeric cell: the atom of measurement.
//!
//! A value is stored as the raw bits of an `f64` inside an `AtomicU64`,
//! mutated via `fetch_update` for add/max and `store` for exchange. The
//! last-changed timestamp is a second, independent atomic, never updated
//! in the same compare-exchange as the value, so readers may observe
//! either field stale relative to the other. This is a deliberate trade
//! for a lock-free hot path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::label::LabelSet;

/// Returns the current wall-clock time as seconds since the Unix epoch.
pub(crate) fn now_secs() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}

/// A single atomically-updated numeric value, identified by its label
/// assignment.
///
/// Once attached to a named metric (see [`crate::metric`]), a cell's label
/// set never changes; only its value and last-changed timestamp do.
#[derive(Debug)]
pub struct NumericCell {
    value: AtomicU64,
    last_changed: AtomicU64,
    labels: LabelSet,
}

impl NumericCell {
    /// Creates a new cell with the given initial value and label set.
    pub fn new(initial: f64, labels: LabelSet) -> Self {
        Self {
            value: AtomicU64::new(initial.to_bits()),
            last_changed: AtomicU64::new(now_secs().to_bits()),
            labels,
        }
    }

    /// The cell's label set.
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Reads the current value.
    pub fn value(&self) -> f64 {
        f64::from_bits(self.value.load(Ordering::Acquire))
    }

    /// Reads the last-changed timestamp, in seconds since the Unix epoch.
    pub fn last_changed(&self) -> f64 {
        f64::from_bits(self.last_changed.load(Ordering::Acquire))
    }

    fn touch(&self) {
        self.last_changed.store(now_secs().to_bits(), Ordering::Release);
    }

    /// Atomically adds `delta` to the value, then independently updates the
    /// last-changed timestamp. Does not validate sign; callers enforce the
    /// counter/gauge-specific non-negative rule before calling this.
    pub fn add(&self, delta: f64) {
        self.value
            .fetch_update(Ordering::AcqRel, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + delta).to_bits())
            })
            .expect("fetch_update closure always returns Some");
        self.touch();
    }

    /// Atomically exchanges the value, then updates the last-changed timestamp.
    pub fn set(&self, new_value: f64) {
        self.value.store(new_value.to_bits(), Ordering::Release);
        self.touch();
    }

    /// Atomically raises the value to `new_value` if it strictly exceeds the
    /// current value, updating the last-changed timestamp *only* when the
    /// value actually changed.
    pub fn set_if_greater(&self, new_value: f64) {
        let mut changed = false;
        self.value
            .fetch_update(Ordering::AcqRel, Ordering::Relaxed, |bits| {
                let current = f64::from_bits(bits);
                if new_value > current {
                    changed = true;
                    Some(new_value.to_bits())
                } else {
                    None
                }
            })
            .ok();
        if changed {
            self.touch();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_accumulates() {
        let cell = NumericCell::new(0.0, LabelSet::empty());
        cell.add(1.0);
        cell.add(2.5);
        assert_eq!(cell.value(), 3.5);
    }

    #[test]
    fn set_exchanges() {
        let cell = NumericCell::new(1.0, LabelSet::empty());
        cell.set(42.0);
        assert_eq!(cell.value(), 42.0);
    }

    #[test]
    fn set_if_greater_only_raises() {
        let cell = NumericCell::new(5.0, LabelSet::empty());
        cell.set_if_greater(3.0);
        assert_eq!(cell.value(), 5.0);
        cell.set_if_greater(10.0);
        assert_eq!(cell.value(), 10.0);
    }

    #[test]
    fn set_if_greater_updates_timestamp_only_on_change() {
        let cell = NumericCell::new(5.0, LabelSet::empty());
        let before = cell.last_changed();
        cell.set_if_greater(1.0);
        assert_eq!(cell.last_changed(), before);
    }
}
