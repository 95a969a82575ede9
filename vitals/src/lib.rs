//! `vitals`: in-process metrics instrumentation for long-running server
//! programs.
//!
//! Programs create named [`Counter`](metric::Counter)s and
//! [`Gauge`](metric::Gauge)s, optionally dimensioned by labels, register
//! them in a [`Registry`](registry::Registry), mutate them from arbitrary
//! concurrent call sites, and expose their values through a text-format
//! scrape body (see [`text::render`]). The companion `vitals-dogstatsd`
//! crate adds a periodic UDP push exporter built on [`task::PeriodicTask`].
//!
//! # Example
//!
//! ```
//! use vitals::label::{LabelSchema, LabelType, LabelValue};
//! use vitals::metric::{labels, Metric};
//! use vitals::registry::Registry;
//!
//! let registry = Registry::new();
//! let schema = LabelSchema::new([("action".to_owned(), LabelType::String)]);
//! let requests = Metric::grouped_counter(schema);
//! registry.register(requests.clone(), "requests", false).unwrap();
//!
//! requests.counter_cell(&labels([("action", LabelValue::from("get"))])).inc(1.0);
//!
//! let body = vitals::text::render(&registry);
//! assert!(body.contains("requests{action=\"get\"} 1.0"));
//! ```

#![deny(missing_docs)]

pub mod cell;
pub mod error;
pub mod label;
pub mod metric;
pub mod registry;
pub mod task;
pub mod text;
mod validate;

pub use cell::NumericCell;
pub use error::RegistrationError;
pub use label::{LabelSchema, LabelSet, LabelType, LabelValue};
pub use metric::{Counter, Gauge, Kind, Metric};
pub use registry::{default_registry, publish_from, MetricCollection, Registry};
pub use task::PeriodicTask;
pub use validate::validate_name;
