use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde_json::Value;
use shared_event_bus::{EventKind, EventPublisher, EventRecord};
use shared_logging::{JsonLogger, LogLevel, LogRecord};
use tokio::runtime::Runtime;

/// Builder for [`PolicyTelemetry`].
pub struct PolicyTelemetryBuilder {
    component: String,
    log_path: Option<PathBuf>,
    event_publisher: Option<Arc<dyn EventPublisher>>,
    min_level: LogLevel,
}

impl PolicyTelemetryBuilder {
    /// Creates a builder for records tagged with `component`.
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            log_path: None,
            event_publisher: None,
            min_level: LogLevel::Info,
        }
    }

    /// Writes records to a JSON-lines file.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Publishes events to `publisher`.
    #[must_use]
    pub fn event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    /// Drops records below `level`. Defaults to [`LogLevel::Info`].
    #[must_use]
    pub const fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Opens the log file, if any.
    pub fn build(self) -> Result<PolicyTelemetry> {
        let logger = self.log_path.map(JsonLogger::new).transpose()?;
        Ok(PolicyTelemetry {
            inner: Arc::new(TelemetryInner {
                component: self.component,
                logger,
                publisher: self.event_publisher,
                min_level: self.min_level,
            }),
        })
    }
}

/// Optional log file plus optional event sink. Both default to no-ops.
#[derive(Clone)]
pub struct PolicyTelemetry {
    inner: Arc<TelemetryInner>,
}

struct TelemetryInner {
    component: String,
    logger: Option<JsonLogger>,
    publisher: Option<Arc<dyn EventPublisher>>,
    min_level: LogLevel,
}

impl fmt::Debug for PolicyTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyTelemetry")
            .field("component", &self.inner.component)
            .field("min_level", &self.inner.min_level)
            .finish_non_exhaustive()
    }
}

impl PolicyTelemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(component: impl Into<String>) -> PolicyTelemetryBuilder {
        PolicyTelemetryBuilder::new(component)
    }

    /// Telemetry that records nothing.
    #[must_use]
    pub fn disabled(component: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TelemetryInner {
                component: component.into(),
                logger: None,
                publisher: None,
                min_level: LogLevel::Error,
            }),
        }
    }

    /// Component tag on every record.
    #[must_use]
    pub fn component(&self) -> &str {
        &self.inner.component
    }

    /// Appends a record unless `level` is below the configured minimum.
    pub fn log(&self, level: LogLevel, message: &str, metadata: &Value) -> Result<()> {
        if level < self.inner.min_level {
            return Ok(());
        }
        if let Some(logger) = &self.inner.logger {
            let record = LogRecord::new(&self.inner.component, level, message).with_metadata(metadata);
            logger.log(&record)?;
        }
        Ok(())
    }

    /// Publishes an event. Inside a tokio runtime the publish is spawned; otherwise a
    /// temporary runtime blocks on it.
    pub fn event(&self, kind: EventKind, payload: Value) -> Result<()> {
        let Some(publisher) = &self.inner.publisher else {
            return Ok(());
        };
        let record = EventRecord::new(self.inner.component.clone(), kind, payload);
        if tokio::runtime::Handle::try_current().is_ok() {
            let publisher = Arc::clone(publisher);
            tokio::spawn(async move {
                let _ = publisher.publish(record).await;
            });
            Ok(())
        } else {
            Runtime::new()?.block_on(publisher.publish(record))
        }
    }
}

/// Fresh seed from the thread RNG.
#[must_use]
pub fn random_seed() -> u64 {
    rand::thread_rng().gen()
}

/// Reproducible RNG for a seed.
#[must_use]
pub fn seeded_rng(seed: u64) -> SmallRng {
    SmallRng::seed_from_u64(seed)
}
