//! A periodic UDP push exporter for `vitals`, speaking the DogStatsD line
//! protocol.
//!
//! ```no_run
//! use std::sync::Arc;
//! use vitals::Registry;
//! use vitals_dogstatsd::DogStatsDPushBuilder;
//!
//! let registry = Arc::new(Registry::new());
//! let exporter = DogStatsDPushBuilder::new().with_registry(registry).build().unwrap();
//! exporter.start();
//! // ...
//! exporter.stop();
//! ```

#![deny(missing_docs)]

mod backend;
mod builder;
mod error;
mod exporter;
mod format;
mod telemetry;

pub use backend::{PushBackend, UdpBackend};
pub use builder::DogStatsDPushBuilder;
pub use error::BuildError;
pub use exporter::PushExporter;
