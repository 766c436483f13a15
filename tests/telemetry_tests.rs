//! Analytics behaviour seen from the outside: correlation, consent, caching.

mod common;

use std::sync::Arc;

use upgrade_assistant::core::step::BackupStep;
use upgrade_assistant::core::UpgradeContext;
use upgrade_assistant::core::project::Project;
use upgrade_assistant::telemetry::correlation::{self, PROJECT_ID, STEP_ID};
use upgrade_assistant::telemetry::{
    ContextEnricher, KnownStepsHasher, PropertyBag, Sha256Hasher, StringHasher,
    UserLevelCacheWriter,
};

use common::fixtures::{recording_client, WorkspaceBuilder};

#[tokio::test]
async fn test_events_carry_context_of_their_own_chain() {
    let ws = WorkspaceBuilder::new().build();
    ws.consent();

    let hasher: Arc<dyn StringHasher> = Arc::new(KnownStepsHasher::new([BackupStep::ID]));
    let (telemetry, sink) = recording_client(ws.telemetry_options(), |builder| {
        builder
            .hasher(hasher.clone())
            .initializer(Arc::new(ContextEnricher::new(hasher.clone())))
    });

    let chain = |project: &'static str| {
        let telemetry = telemetry.clone();
        let root = ws.root.clone();
        correlation::spawn(async move {
            let mut ctx = UpgradeContext::new(&root, vec![Project::new(root.join(project))]);
            ctx.set_current_project(ctx.projects().first().cloned());
            ctx.set_current_step(Some(BackupStep::ID));
            tokio::task::yield_now().await;
            telemetry.track("probe", PropertyBag::new().with("Chain", project));
        })
    };

    let first = chain("First.csproj");
    let second = chain("Second.csproj");
    first.await.unwrap();
    second.await.unwrap();
    telemetry.dispose().await;

    let sha = Sha256Hasher;
    let events = sink.snapshot().events;
    assert_eq!(events.len(), 2);
    for event in events {
        let chain = &event.properties["Chain"];
        assert_eq!(event.properties[PROJECT_ID], sha.hash(chain));
        assert_eq!(event.properties[STEP_ID], BackupStep::ID);
    }
}

#[tokio::test]
async fn test_call_site_values_win_over_context() {
    let ws = WorkspaceBuilder::new().build();
    ws.consent();

    let hasher: Arc<dyn StringHasher> = Arc::new(Sha256Hasher);
    let (telemetry, sink) = recording_client(ws.telemetry_options(), |builder| {
        builder.initializer(Arc::new(ContextEnricher::new(hasher.clone())))
    });

    correlation::scope(None, async {
        let mut ctx = UpgradeContext::new(&ws.root, vec![Project::new(ws.root.join("A.csproj"))]);
        ctx.set_current_step(Some("rewrite"));
        telemetry.track("probe", PropertyBag::new().with(STEP_ID, "explicit"));
    })
    .await;
    telemetry.dispose().await;

    let events = sink.snapshot().events;
    assert_eq!(events[0].properties[STEP_ID], "explicit");
}

#[tokio::test]
async fn test_no_consent_means_no_events() {
    let ws = WorkspaceBuilder::new().build();
    let (telemetry, sink) = recording_client(ws.telemetry_options(), |builder| builder);

    assert!(!telemetry.enabled());
    telemetry.track("probe", PropertyBag::new());
    telemetry.add_property("Name", "value", false).remove();
    telemetry.dispose().await;

    let recorded = sink.snapshot();
    assert!(recorded.events.is_empty());
    assert_eq!(recorded.flushes, 0);
}

#[test]
fn test_cache_hit_is_stable() {
    let ws = WorkspaceBuilder::new().build();
    let cache = UserLevelCacheWriter::new(&ws.telemetry_options());

    let first = cache.run_with_cache("Probe", || "computed-once".to_string());
    let second = cache.run_with_cache("Probe", || "computed-again".to_string());

    assert_eq!(first, "computed-once");
    assert_eq!(second, "computed-once");
    assert!(cache.cache_file_path("Probe").is_file());
}
