//! Ambient pipeline context for event correlation.
//!
//! Each logical call chain carries its own [`PipelineSnapshot`] in a
//! task-local slot. Analytics calls capture the snapshot of the chain that
//! emits them, and [`ContextEnricher`] turns it into event properties when
//! the event is drained.

use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::bag::PropertyBag;
use super::client::{EventScope, TelemetryInitializer};
use super::hasher::StringHasher;

pub const PERMANENT_SOLUTION_ID: &str = "Permanent Solution Id";
pub const SOLUTION_ID: &str = "Solution Id";
pub const ENTRYPOINT_ID: &str = "Entrypoint Id";
pub const PROJECT_ID: &str = "Project Id";
pub const STEP_ID: &str = "Step Id";

tokio::task_local! {
    static CURRENT_PIPELINE: RefCell<Option<PipelineSnapshot>>;
}

/// Correlation identifiers of the pipeline currently running.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSnapshot {
    pub permanent_solution_id: Option<String>,
    pub solution_id: Option<String>,
    pub entry_point_id: Option<String>,
    pub project_id: Option<String>,
    pub step_id: Option<String>,
}

/// Run `future` with its own ambient slot, initialised to `initial`.
pub async fn scope<F: Future>(initial: Option<PipelineSnapshot>, future: F) -> F::Output {
    CURRENT_PIPELINE.scope(RefCell::new(initial), future).await
}

/// The snapshot of the current call chain, if any.
pub fn current() -> Option<PipelineSnapshot> {
    CURRENT_PIPELINE
        .try_with(|slot| slot.borrow().clone())
        .ok()
        .flatten()
}

/// Replace the snapshot of the current call chain.
///
/// Returns `false` when called outside of [`scope`].
pub fn set_current(snapshot: Option<PipelineSnapshot>) -> bool {
    CURRENT_PIPELINE
        .try_with(|slot| *slot.borrow_mut() = snapshot)
        .is_ok()
}

/// Spawn a task that starts with a copy of the caller's snapshot.
///
/// Later changes made by either side are not seen by the other.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let inherited = current();
    tokio::spawn(scope(inherited, future))
}

/// Adds correlation ids from the captured snapshot to an event.
///
/// Values already present on the event are left alone.
pub struct ContextEnricher {
    hasher: Arc<dyn StringHasher>,
}

impl ContextEnricher {
    pub fn new(hasher: Arc<dyn StringHasher>) -> Self {
        Self { hasher }
    }

    fn try_add(&self, properties: &mut PropertyBag, name: &str, value: Option<&String>) {
        if let Some(value) = value {
            if !properties.contains_key(name) {
                properties.insert(name.to_string(), self.hasher.hash(value));
            }
        }
    }
}

impl TelemetryInitializer for ContextEnricher {
    fn initialize(&self, properties: &mut PropertyBag, scope: &EventScope) {
        let Some(context) = &scope.context else {
            return;
        };

        self.try_add(
            properties,
            PERMANENT_SOLUTION_ID,
            context.permanent_solution_id.as_ref(),
        );
        self.try_add(properties, SOLUTION_ID, context.solution_id.as_ref());
        self.try_add(properties, ENTRYPOINT_ID, context.entry_point_id.as_ref());
        self.try_add(properties, PROJECT_ID, context.project_id.as_ref());
        self.try_add(properties, STEP_ID, context.step_id.as_ref());
    }
}
