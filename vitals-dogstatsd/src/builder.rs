//! Builder for a [`PushExporter`].
//!
//! A fluent `with_*` builder over the exporter's configuration surface.

use std::sync::Arc;
use std::time::Duration;

use vitals::{default_registry, Registry};

use crate::backend::{PushBackend, UdpBackend};
use crate::error::BuildError;
use crate::exporter::{Config, PushExporter};

const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_SEND_OLDER_THAN: Duration = Duration::from_secs(120);
const DEFAULT_BACKEND_ADDR: &str = "127.0.0.1:8125";

/// Builds a [`PushExporter`] that emits metrics in the DogStatsD line
/// protocol.
pub struct DogStatsDPushBuilder {
    send_interval: Duration,
    send_older_than: Duration,
    backend: Option<Box<dyn PushBackend>>,
    registries: Vec<Arc<Registry>>,
}

impl Default for DogStatsDPushBuilder {
    fn default() -> Self {
        Self {
            send_interval: DEFAULT_SEND_INTERVAL,
            send_older_than: DEFAULT_SEND_OLDER_THAN,
            backend: None,
            registries: Vec::new(),
        }
    }
}

impl DogStatsDPushBuilder {
    /// Creates a builder with the default settings: a 60s send interval, a
    /// 120s recency window, a UDP socket to 127.0.0.1:8125, and the default
    /// registry as the sole scanned registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides how often the exporter emits. A zero interval disables
    /// emission entirely; `start` then logs a warning and does nothing.
    pub fn with_send_interval(mut self, period: Duration) -> Self {
        self.send_interval = period;
        self
    }

    /// Overrides the recency window used to suppress unchanged cells.
    pub fn with_send_older_than(mut self, period: Duration) -> Self {
        self.send_older_than = period;
        self
    }

    /// Overrides the transport messages are sent through. Defaults to a UDP
    /// socket connected to 127.0.0.1:8125.
    pub fn with_backend(mut self, backend: impl PushBackend + 'static) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    /// Adds one registry to the set the exporter scans each cycle.
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registries.push(registry);
        self
    }

    /// Adds a set of registries to scan each cycle.
    pub fn with_registries(mut self, registries: impl IntoIterator<Item = Arc<Registry>>) -> Self {
        self.registries.extend(registries);
        self
    }

    /// Builds the exporter. Fails only if the default UDP backend cannot be
    /// constructed (no backend was supplied and the socket setup failed).
    pub fn build(self) -> Result<PushExporter, BuildError> {
        let backend: Box<dyn PushBackend> = match self.backend {
            Some(backend) => backend,
            None => Box::new(UdpBackend::connect(DEFAULT_BACKEND_ADDR)?),
        };

        let registries = if self.registries.is_empty() { vec![default_registry()] } else { self.registries };

        Ok(PushExporter::new(Config {
            send_interval: self.send_interval,
            send_older_than: self.send_older_than,
            backend,
            registries,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::test_util::RecordingBackend;

    #[test]
    fn defaults_match_documented_values() {
        let builder = DogStatsDPushBuilder::new();
        assert_eq!(builder.send_interval, DEFAULT_SEND_INTERVAL);
        assert_eq!(builder.send_older_than, DEFAULT_SEND_OLDER_THAN);
    }

    #[test]
    fn custom_backend_is_used_instead_of_udp() {
        let exporter =
            DogStatsDPushBuilder::new().with_registry(Arc::new(Registry::new())).with_backend(RecordingBackend::new()).build();
        assert!(exporter.is_ok());
    }
}
