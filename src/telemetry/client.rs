//! The analytics client.
//!
//! Every call that touches the backend is turned into an action on a
//! [`SerializedQueue`], so callers never wait on analytics I/O and a broken
//! backend silently disables analytics instead of failing the pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::bag::{MeasurementBag, PropertyBag};
use super::common_properties::CommonPropertiesProvider;
use super::correlation::{self, PipelineSnapshot};
use super::hasher::{Sha256Hasher, StringHasher};
use super::options::TelemetryOptions;
use super::queue::SerializedQueue;
use super::sentinel::FirstTimeUseNoticeSentinel;
use super::sink::{ExceptionEvent, TelemetryEvent, TelemetrySink, TracingSink};
use crate::util::env_var_as_bool;

/// Builds the backend on the queue's consumer.
pub type SinkFactory = Box<dyn FnOnce() -> anyhow::Result<Box<dyn TelemetrySink>> + Send>;

/// Produces the common properties on the queue's consumer.
pub type CommonPropertiesSource = Box<dyn FnOnce() -> PropertyBag + Send>;

/// Information captured on the emitting task and handed to initializers.
#[derive(Debug, Clone, Default)]
pub struct EventScope {
    pub context: Option<PipelineSnapshot>,
}

/// Hook run on every event right before it reaches the sink.
pub trait TelemetryInitializer: Send + Sync {
    fn initialize(&self, properties: &mut PropertyBag, scope: &EventScope);
}

/// State owned by the queue's consumer.
struct TelemetryWorker {
    sink: Box<dyn TelemetrySink>,
    common_properties: PropertyBag,
    common_measurements: MeasurementBag,
    initializers: Vec<Arc<dyn TelemetryInitializer>>,
    registered: Vec<(u64, String, String)>,
}

impl TelemetryWorker {
    fn enrich(&self, properties: &mut PropertyBag, scope: &EventScope) {
        for initializer in &self.initializers {
            initializer.initialize(properties, scope);
        }
        for (_, name, value) in &self.registered {
            properties.insert(name.clone(), value.clone());
        }
    }
}

/// Configures a [`Telemetry`] client.
pub struct TelemetryBuilder {
    options: TelemetryOptions,
    hasher: Arc<dyn StringHasher>,
    initializers: Vec<Arc<dyn TelemetryInitializer>>,
    sink_factory: Option<SinkFactory>,
    common_properties: Option<CommonPropertiesSource>,
}

impl TelemetryBuilder {
    /// Hasher used for hashed properties and by the default common
    /// properties provider.
    pub fn hasher(mut self, hasher: Arc<dyn StringHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Register an initializer run on every event.
    pub fn initializer(mut self, initializer: Arc<dyn TelemetryInitializer>) -> Self {
        self.initializers.push(initializer);
        self
    }

    /// Replace the default [`TracingSink`].
    pub fn sink<F>(mut self, factory: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<Box<dyn TelemetrySink>> + Send + 'static,
    {
        self.sink_factory = Some(Box::new(factory));
        self
    }

    /// Replace the process-wide common properties snapshot.
    pub fn common_properties<F>(mut self, source: F) -> Self
    where
        F: FnOnce() -> PropertyBag + Send + 'static,
    {
        self.common_properties = Some(Box::new(source));
        self
    }

    /// Build the client.
    ///
    /// Analytics is enabled iff the opt-out variable is not set and the
    /// first-use sentinel exists. When enabled, the queue is started here;
    /// this must happen inside a tokio runtime.
    pub fn build(self) -> Telemetry {
        let opted_out = env_var_as_bool(&self.options.telemetry_optout_var(), false);
        let consented = FirstTimeUseNoticeSentinel::new(&self.options).exists();
        let enabled = !opted_out && consented;

        debug!(enabled, opted_out, consented, "analytics configured");

        let namespace = self.options.producer_namespace();
        if !enabled {
            return Telemetry {
                enabled,
                namespace,
                hasher: self.hasher,
                queue: None,
                next_registration: AtomicU64::new(0),
            };
        }

        let options = self.options;
        let hasher = self.hasher.clone();
        let initializers = self.initializers;
        let sink_factory = self.sink_factory;
        let common_properties = self.common_properties;

        let queue = SerializedQueue::new(move || {
            let sink: Box<dyn TelemetrySink> = match sink_factory {
                Some(factory) => factory()?,
                None => Box::new(TracingSink::new(options.session_id.clone())),
            };
            let common_properties = match common_properties {
                Some(source) => source(),
                None => CommonPropertiesProvider::new(&options, hasher).process_common_properties(),
            };

            Ok(TelemetryWorker {
                sink,
                common_properties,
                common_measurements: MeasurementBag::new(),
                initializers,
                registered: Vec::new(),
            })
        });

        Telemetry {
            enabled,
            namespace,
            hasher: self.hasher,
            queue: Some(Arc::new(queue)),
            next_registration: AtomicU64::new(0),
        }
    }
}

/// Non-blocking analytics client.
pub struct Telemetry {
    enabled: bool,
    namespace: String,
    hasher: Arc<dyn StringHasher>,
    queue: Option<Arc<SerializedQueue<TelemetryWorker>>>,
    next_registration: AtomicU64,
}

impl Telemetry {
    /// Start configuring a client.
    pub fn builder(options: TelemetryOptions) -> TelemetryBuilder {
        TelemetryBuilder {
            options,
            hasher: Arc::new(Sha256Hasher),
            initializers: Vec::new(),
            sink_factory: None,
            common_properties: None,
        }
    }

    /// A client that never sends anything.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            namespace: String::new(),
            hasher: Arc::new(Sha256Hasher),
            queue: None,
            next_registration: AtomicU64::new(0),
        }
    }

    /// Whether events are being collected.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Emit `name` with optional call-site properties and measurements.
    ///
    /// Call-site values win over common ones. Returns immediately; the event
    /// is dropped if the queue is full.
    pub fn track_event(
        &self,
        name: &str,
        properties: Option<PropertyBag>,
        measurements: Option<MeasurementBag>,
    ) {
        if let Some(queue) = self.active_queue() {
            queue.add(self.event_action(name, properties, measurements));
        }
    }

    /// Like [`track_event`](Self::track_event), but waits for queue space
    /// instead of dropping the event.
    pub async fn send_event(
        &self,
        name: &str,
        properties: Option<PropertyBag>,
        measurements: Option<MeasurementBag>,
    ) {
        if let Some(queue) = self.active_queue() {
            queue
                .send(self.event_action(name, properties, measurements))
                .await;
        }
    }

    fn event_action(
        &self,
        name: &str,
        properties: Option<PropertyBag>,
        measurements: Option<MeasurementBag>,
    ) -> impl FnOnce(&mut TelemetryWorker) -> anyhow::Result<()> + Send + 'static {
        let name = format!("{}/{}", self.namespace, name);
        let scope = EventScope {
            context: correlation::current(),
        };

        move |worker: &mut TelemetryWorker| {
            let mut properties = PropertyBag::merged(&worker.common_properties, properties.as_ref());
            worker.enrich(&mut properties, &scope);
            let measurements =
                MeasurementBag::merged(&worker.common_measurements, measurements.as_ref());

            worker.sink.track_event(&TelemetryEvent {
                name,
                properties,
                measurements,
            })?;
            worker.sink.flush()
        }
    }

    /// Emit `name` with call-site properties only.
    pub fn track(&self, name: &str, properties: PropertyBag) {
        self.track_event(name, Some(properties), None);
    }

    /// Report an unexpected failure.
    pub fn track_exception(&self, error: &anyhow::Error) {
        let Some(queue) = self.active_queue() else {
            return;
        };

        let message = error.to_string();
        let causes: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
        let scope = EventScope {
            context: correlation::current(),
        };

        queue.add(move |worker: &mut TelemetryWorker| {
            let mut properties = worker.common_properties.clone();
            worker.enrich(&mut properties, &scope);

            worker.sink.track_exception(&ExceptionEvent {
                message,
                causes,
                properties,
            })?;
            worker.sink.flush()
        });
    }

    /// Attach `name` to every later event until the returned registration
    /// is dropped.
    ///
    /// With `hash` set, only the hash of `value` is kept.
    pub fn add_property(&self, name: &str, value: &str, hash: bool) -> PropertyRegistration {
        let Some(queue) = self.active_queue() else {
            return PropertyRegistration::inert();
        };

        let value = if hash {
            self.hasher.hash(value)
        } else {
            value.to_string()
        };
        let id = self.next_registration.fetch_add(1, Ordering::Relaxed);
        let name = name.to_string();

        queue.add(move |worker: &mut TelemetryWorker| {
            worker.registered.push((id, name, value));
            Ok(())
        });

        PropertyRegistration {
            queue: Some(queue.clone()),
            id,
        }
    }

    /// Flush the sink and wait until every queued action has run.
    pub async fn dispose(&self) {
        let Some(queue) = &self.queue else {
            return;
        };

        queue
            .send(|worker: &mut TelemetryWorker| worker.sink.flush())
            .await;
        queue.dispose().await;
    }

    fn active_queue(&self) -> Option<&Arc<SerializedQueue<TelemetryWorker>>> {
        if !self.enabled {
            return None;
        }
        self.queue.as_ref()
    }
}

/// Keeps a property registered; dropping it unregisters the property.
///
/// The removal goes through the same queue as events, so events emitted
/// before the drop still carry the property.
#[must_use = "dropping the registration removes the property immediately"]
pub struct PropertyRegistration {
    queue: Option<Arc<SerializedQueue<TelemetryWorker>>>,
    id: u64,
}

impl PropertyRegistration {
    fn inert() -> Self {
        Self { queue: None, id: 0 }
    }

    /// Unregister now, ahead of any event emitted after this call.
    pub fn remove(self) {
        drop(self);
    }
}

impl Drop for PropertyRegistration {
    fn drop(&mut self) {
        if let Some(queue) = self.queue.take() {
            let id = self.id;
            queue.add(move |worker: &mut TelemetryWorker| {
                worker.registered.retain(|(registered, _, _)| *registered != id);
                Ok(())
            });
        }
    }
}
