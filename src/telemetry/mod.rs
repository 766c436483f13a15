//! Usage telemetry and logging for the upgrade pipeline.
//!
//! - Structured logging via the `tracing` crate ([`init_logging`])
//! - A non-blocking analytics client ([`Telemetry`]) that funnels every
//!   backend call through a bounded single-consumer queue
//! - Common environment properties, cached per user where expensive
//! - Ambient pipeline correlation for events ([`correlation`])

pub mod bag;
pub mod cache;
mod client;
pub mod common_properties;
pub mod correlation;
mod extensions;
pub mod hasher;
mod init;
mod options;
pub mod queue;
mod sentinel;
pub mod sink;

pub use bag::{MeasurementBag, PropertyBag, ValueBag};
pub use cache::UserLevelCacheWriter;
pub use client::{
    CommonPropertiesSource, EventScope, PropertyRegistration, SinkFactory, Telemetry,
    TelemetryBuilder, TelemetryInitializer,
};
pub use common_properties::CommonPropertiesProvider;
pub use correlation::{ContextEnricher, PipelineSnapshot};
pub use extensions::{time_event, TimedEvent, DURATION};
pub use hasher::{KnownStepsHasher, Sha256Hasher, StringHasher};
pub use init::{init_logging, LogConfig};
pub use options::TelemetryOptions;
pub use queue::{SerializedQueue, QUEUE_CAPACITY};
pub use sentinel::FirstTimeUseNoticeSentinel;
pub use sink::{ExceptionEvent, RecordingSink, TelemetryEvent, TelemetrySink, TracingSink};
