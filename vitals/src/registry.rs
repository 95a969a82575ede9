//! The registry: a named, lock-protected collection of metrics.
//!
//! The default registry is a `once_cell::sync::Lazy` singleton, separate
//! from "detached" metric construction, which never touches a registry at
//! all until registration.

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::warn;

use crate::error::RegistrationError;
use crate::label::LabelSet;
use crate::metric::Metric;
use crate::validate::validate_name;

/// A named collection of metrics.
///
/// Enumeration order is lexicographic by name (a `BTreeMap` gives this for
/// free), which the text formatter relies on for deterministic output.
pub struct Registry {
    metrics: Mutex<BTreeMap<String, Metric>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self { metrics: Mutex::new(BTreeMap::new()) }
    }

    /// Registers `metric` under `name`.
    ///
    /// Validates the name and (for grouped metrics) every declared label
    /// name. Fails if a metric is already registered under `name` unless
    /// `overwrite` is set, in which case the prior entry is replaced and a
    /// warning logged. Binds the metric's name, failing if it already
    /// carries a different one from a prior registration.
    pub fn register(
        &self,
        metric: Metric,
        name: &str,
        overwrite: bool,
    ) -> Result<(), RegistrationError> {
        validate_name(name).map_err(|reason| RegistrationError::InvalidName {
            name: name.to_owned(),
            reason,
        })?;

        for label in metric.schema_field_names() {
            validate_name(&label).map_err(|reason| RegistrationError::InvalidLabelName {
                name: name.to_owned(),
                label: label.clone(),
                reason,
            })?;
        }

        let mut guard = self.metrics.lock();
        if guard.contains_key(name) {
            if !overwrite {
                return Err(RegistrationError::DuplicateName { name: name.to_owned() });
            }
            warn!(metric = name, "overwriting existing registration");
        }

        metric.bind_name(name).map_err(|(existing, requested)| RegistrationError::NameConflict {
            existing,
            requested,
        })?;

        guard.insert(name.to_owned(), metric);
        Ok(())
    }

    /// Removes the entry named `name`. The metric object itself survives
    /// and keeps its name; only the registry's reference is dropped.
    pub fn unregister(&self, name: &str) -> Result<(), RegistrationError> {
        let mut guard = self.metrics.lock();
        if guard.remove(name).is_none() {
            return Err(RegistrationError::NotRegistered { name: name.to_owned() });
        }
        Ok(())
    }

    /// Removes every entry, keeping the registry itself.
    pub fn clear(&self) {
        self.metrics.lock().clear();
    }

    /// Registers every metric exposed by `collection`, keyed by its
    /// declared identifier. Uses an explicit enumeration rather than
    /// struct-field reflection.
    pub fn register_collection(
        &self,
        collection: &dyn MetricCollection,
    ) -> Result<(), RegistrationError> {
        for (name, metric) in collection.members() {
            self.register(metric, name, false)?;
        }
        Ok(())
    }

    /// Looks up a registered metric by name.
    pub fn get_metric(&self, name: &str) -> Result<Metric, RegistrationError> {
        self.metrics
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistrationError::NotRegistered { name: name.to_owned() })
    }

    /// Resolves the cell for `name`/`labels` without creating it, returning
    /// its current value, or `None` on any failure (missing metric, invalid
    /// labels, missing cell). Swallowing failure is intentional: this is a
    /// read-only convenience for tests and introspection.
    pub fn value_of(&self, name: &str, labels: &LabelSet) -> Option<f64> {
        let metric = self.metrics.lock().get(name).cloned()?;
        metric.get_cell_if_exists(labels).map(|cell| cell.value())
    }

    /// Resets every scalar metric's cell to zero. Does not iterate grouped
    /// cells; grouped resets are emergent from eviction, and test
    /// scaffolding does not need them.
    pub fn zero_all(&self) {
        for metric in self.metrics.lock().values() {
            metric.zero_scalar();
        }
    }

    /// Iterates registered `(name, metric)` pairs in lexicographic order.
    pub fn iter(&self) -> Vec<(String, Metric)> {
        self.metrics.lock().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// A structured declaration of a program's metrics as a single record,
/// registered together via [`Registry::register_collection`].
///
/// Implementors enumerate their metric fields and declared names; non-metric
/// members are simply not listed (there is no reflection to filter).
pub trait MetricCollection {
    /// Returns the `(declared name, metric)` pairs this collection exposes.
    fn members(&self) -> Vec<(&'static str, Metric)>;
}

static DEFAULT_REGISTRY: Lazy<Arc<Registry>> = Lazy::new(|| Arc::new(Registry::new()));

/// The process-wide default registry, lazily constructed on first access.
///
/// Returns a cheap `Arc` clone of the singleton rather than a `&'static
/// Registry`, so that a `StatsdExporter`-style exporter can hold its set of
/// registries (default: just this one) as plain owned handles regardless
/// of whether they are the default registry or a custom one.
pub fn default_registry() -> Arc<Registry> {
    Arc::clone(&DEFAULT_REGISTRY)
}

/// Registers `metric` under `name` in the default registry. Shorthand for
/// `default_registry().register(metric, name, false)`.
pub fn publish_from(metric: Metric, name: &str) -> Result<(), RegistrationError> {
    default_registry().register(metric, name, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{LabelSchema, LabelType, LabelValue};
    use crate::metric::labels;

    #[test]
    fn register_then_lookup() {
        let registry = Registry::new();
        registry.register(Metric::counter(), "requests", false).unwrap();
        assert!(registry.get_metric("requests").is_ok());
    }

    #[test]
    fn duplicate_without_overwrite_fails() {
        let registry = Registry::new();
        registry.register(Metric::counter(), "requests", false).unwrap();
        let err = registry.register(Metric::counter(), "requests", false).unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateName { .. }));
    }

    #[test]
    fn overwrite_replaces() {
        let registry = Registry::new();
        registry.register(Metric::counter(), "requests", false).unwrap();
        registry.register(Metric::gauge(0.0), "requests", true).unwrap();
        assert_eq!(registry.get_metric("requests").unwrap().kind(), crate::metric::Kind::Gauge);
    }

    #[test]
    fn register_unregister_round_trip_keeps_name() {
        let registry = Registry::new();
        let metric = Metric::counter();
        registry.register(metric.clone(), "requests", false).unwrap();
        registry.unregister("requests").unwrap();
        assert!(registry.get_metric("requests").is_err());
        assert_eq!(metric.name(), Some("requests".to_owned()));
    }

    #[test]
    fn same_metric_different_registries_same_name_succeeds() {
        let a = Registry::new();
        let b = Registry::new();
        let metric = Metric::counter();
        a.register(metric.clone(), "requests", false).unwrap();
        assert!(b.register(metric, "requests", false).is_ok());
    }

    #[test]
    fn same_metric_different_name_fails() {
        let a = Registry::new();
        let b = Registry::new();
        let metric = Metric::counter();
        a.register(metric.clone(), "requests", false).unwrap();
        let err = b.register(metric, "other", false).unwrap_err();
        assert!(matches!(err, RegistrationError::NameConflict { .. }));
    }

    #[test]
    fn invalid_name_rejected_and_not_entered() {
        let registry = Registry::new();
        assert!(registry.register(Metric::counter(), "1bad", false).is_err());
        assert!(registry.get_metric("1bad").is_err());
    }

    #[test]
    fn value_of_missing_returns_none() {
        let registry = Registry::new();
        assert_eq!(registry.value_of("nope", &LabelSet::empty()), None);
    }

    #[test]
    fn value_of_resolves_existing_cell() {
        let registry = Registry::new();
        let schema = LabelSchema::new([("action".to_owned(), LabelType::String)]);
        let metric = Metric::grouped_counter(schema);
        registry.register(metric.clone(), "requests", false).unwrap();

        let get_labels = labels([("action", LabelValue::from("get"))]);
        metric.counter_cell(&get_labels).inc(1.0);

        assert_eq!(registry.value_of("requests", &get_labels), Some(1.0));
        assert_eq!(registry.value_of("requests", &LabelSet::empty()), None);
    }

    struct Services {
        requests: Metric,
        errors: Metric,
    }

    impl MetricCollection for Services {
        fn members(&self) -> Vec<(&'static str, Metric)> {
            vec![("service_requests", self.requests.clone()), ("service_errors", self.errors.clone())]
        }
    }

    #[test]
    fn register_collection_registers_each_member() {
        let registry = Registry::new();
        let services = Services { requests: Metric::counter(), errors: Metric::counter() };
        registry.register_collection(&services).unwrap();
        assert!(registry.get_metric("service_requests").is_ok());
        assert!(registry.get_metric("service_errors").is_ok());
    }

    #[test]
    fn zero_all_resets_scalars_only() {
        let registry = Registry::new();
        let scalar = Metric::counter();
        registry.register(scalar.clone(), "scalar", false).unwrap();
        scalar.counter_cell(&LabelSet::empty()).inc(5.0);

        registry.zero_all();
        assert_eq!(registry.value_of("scalar", &LabelSet::empty()), Some(0.0));
    }
}
