//! Upgrade command implementation
//!
//! Walks every pending entry point through the registered steps, saving a
//! checkpoint after each project so an interrupted run can resume.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cli::context::UpgradeOptions;
use crate::cli::output::Output;
use crate::cli::runner::{AppCommand, ApplicationLifetime, ExitCode, PipelineRunner};
use crate::cli::startup::{
    ConsoleTelemetryOptIn, DialoguerInput, LoadStateStartup, UsedCommandTelemetry, UsedSymbol,
};
use crate::core::context::{SharedContext, UpgradeContext};
use crate::core::error::UpgradeError;
use crate::core::project::{Project, Workspace};
use crate::core::state::{FileStateManager, StateManager};
use crate::core::step::{BackupStep, StepRegistry};
use crate::core::tracking::track_project_properties;
use crate::telemetry::{
    correlation, time_event, ContextEnricher, KnownStepsHasher, PropertyBag, StringHasher,
    Telemetry, TelemetryOptions,
};

/// Human-readable product name used for analytics files and variables.
pub const DISPLAY_NAME: &str = "Upgrade Assistant";

/// The `upgrade` command.
pub struct UpgradeCommand {
    context: SharedContext,
    state: Arc<dyn StateManager>,
    steps: StepRegistry,
    telemetry: Arc<Telemetry>,
}

impl UpgradeCommand {
    pub fn new(
        context: SharedContext,
        state: Arc<dyn StateManager>,
        steps: StepRegistry,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            context,
            state,
            steps,
            telemetry,
        }
    }
}

fn check_canceled(token: &CancellationToken) -> Result<(), UpgradeError> {
    if token.is_cancelled() {
        Err(UpgradeError::Canceled)
    } else {
        Ok(())
    }
}

#[async_trait]
impl AppCommand for UpgradeCommand {
    async fn run(&self, token: &CancellationToken) -> anyhow::Result<()> {
        let mut context = self.context.lock().await;
        context.publish();
        track_project_properties(&self.telemetry, &context);

        if context.projects().is_empty() {
            return Err(UpgradeError::failed(format!(
                "No projects found in {}",
                context.root().display()
            ))
            .into());
        }

        if context.entry_points().is_empty() {
            let all = context.projects().to_vec();
            context.set_entry_points(all);
        }

        let resume = context.current_project().cloned();
        let mut pending: Vec<Project> = context
            .entry_points()
            .iter()
            .filter(|p| !context.is_completed(p))
            .cloned()
            .collect();
        // A project interrupted last time goes first.
        pending.sort_by_key(|p| Some(p) != resume.as_ref());

        if pending.is_empty() {
            Output::success("All projects are already upgraded");
            return Ok(());
        }

        for project in pending {
            check_canceled(token)?;
            Output::header(&format!(
                "Upgrading {}",
                Output::project_name(&project.identity())
            ));
            context.set_current_project(Some(project.clone()));
            self.state.save_state(&context).await?;

            for step in self.steps.steps() {
                check_canceled(token)?;
                context.set_current_step(Some(step.id()));
                debug!(step = step.id(), project = %project.identity(), "applying step");

                let _timer = time_event(
                    &self.telemetry,
                    "step/apply",
                    Some(PropertyBag::new().with("Step", step.id())),
                    None,
                );
                let outcome = step.apply(&mut context, &project).await?;
                Output::step(step.title(), &outcome);
            }

            context.set_current_step(None);
            context.mark_completed(&project);
            self.state.save_state(&context).await?;
            info!(project = %project.identity(), "project upgraded");
        }

        context.set_current_project(None);
        self.state.save_state(&context).await?;
        Output::success("Upgrade complete");
        Ok(())
    }
}

/// Assemble the pipeline for `options` and run it.
///
/// Analytics are drained before this returns.
pub async fn run_upgrade(
    options: &UpgradeOptions,
    used: Vec<UsedSymbol>,
    token: CancellationToken,
    lifetime: Arc<ApplicationLifetime>,
) -> anyhow::Result<ExitCode> {
    let spinner = Output::spinner("Discovering projects...");
    let workspace = Workspace::discover(&options.project);
    spinner.finish_and_clear();
    let workspace = workspace.map_err(|e| UpgradeError::failed(e.to_string()))?;

    let mut steps = StepRegistry::new();
    if !options.skip_backup {
        steps = steps.register(Arc::new(BackupStep));
    }

    let telemetry_options = TelemetryOptions::new(DISPLAY_NAME, env!("CARGO_PKG_VERSION"));
    let hasher: Arc<dyn StringHasher> = Arc::new(KnownStepsHasher::new(steps.ids()));
    let telemetry = Arc::new(
        Telemetry::builder(telemetry_options.clone())
            .hasher(hasher.clone())
            .initializer(Arc::new(ContextEnricher::new(hasher)))
            .build(),
    );

    let state: Arc<dyn StateManager> = Arc::new(FileStateManager::new(&workspace.root));
    let context: SharedContext = Arc::new(tokio::sync::Mutex::new(
        UpgradeContext::from_workspace(workspace),
    ));

    let command = UpgradeCommand::new(context.clone(), state.clone(), steps, telemetry.clone());
    let runner = PipelineRunner::new(Box::new(command), telemetry.clone(), lifetime)
        .startup(Box::new(ConsoleTelemetryOptIn::new(
            &telemetry_options,
            Box::new(DialoguerInput),
            options.non_interactive,
        )))
        .startup(Box::new(UsedCommandTelemetry::new(used, telemetry.clone())))
        .startup(Box::new(LoadStateStartup::new(context, state)));

    let code = correlation::scope(None, runner.run(&token)).await;
    telemetry.dispose().await;
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::step::{StepOutcome, UpgradeStep};
    use crate::telemetry::{FirstTimeUseNoticeSentinel, RecordingSink, TelemetrySink};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records which projects it saw; can cancel the run or fail on a project.
    struct Probe {
        seen: Arc<Mutex<Vec<String>>>,
        cancel_after: Option<(usize, CancellationToken)>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl UpgradeStep for Probe {
        fn id(&self) -> &str {
            "probe"
        }

        fn title(&self) -> &str {
            "Probe"
        }

        async fn apply(
            &self,
            context: &mut UpgradeContext,
            project: &Project,
        ) -> anyhow::Result<StepOutcome> {
            assert_eq!(context.current_step(), Some("probe"));
            let mut seen = self.seen.lock().unwrap();
            seen.push(project.identity());
            if let Some((limit, token)) = &self.cancel_after {
                if seen.len() >= *limit {
                    token.cancel();
                }
            }
            if self.fail_on == Some(project.identity().as_str()) {
                anyhow::bail!("cannot upgrade {}", project.identity());
            }
            Ok(StepOutcome::Complete)
        }
    }

    struct Fixture {
        temp: TempDir,
        _profile: TempDir,
        sink: RecordingSink,
        telemetry: Arc<Telemetry>,
    }

    impl Fixture {
        fn new(projects: &[&str]) -> Self {
            let temp = TempDir::new().unwrap();
            for name in projects {
                std::fs::write(temp.path().join(name), "<Project />").unwrap();
            }

            let profile = TempDir::new().unwrap();
            let options =
                TelemetryOptions::new(DISPLAY_NAME, "0.5.0").with_profile_dir(profile.path());
            FirstTimeUseNoticeSentinel::new(&options)
                .create_if_not_exists()
                .unwrap();
            let sink = RecordingSink::new();
            let recorder = sink.clone();
            let telemetry = Arc::new(
                Telemetry::builder(options)
                    .common_properties(PropertyBag::new)
                    .sink(move || Ok(Box::new(recorder) as Box<dyn TelemetrySink>))
                    .build(),
            );

            Self {
                temp,
                _profile: profile,
                sink,
                telemetry,
            }
        }

        fn context(&self) -> SharedContext {
            let workspace = Workspace::discover(self.temp.path()).unwrap();
            Arc::new(tokio::sync::Mutex::new(UpgradeContext::from_workspace(
                workspace,
            )))
        }

        fn command(
            &self,
            context: SharedContext,
            probe: Probe,
        ) -> (UpgradeCommand, Arc<FileStateManager>) {
            let state = Arc::new(FileStateManager::new(self.temp.path()));
            let steps = StepRegistry::new()
                .register(Arc::new(BackupStep))
                .register(Arc::new(probe));
            (
                UpgradeCommand::new(context, state.clone(), steps, self.telemetry.clone()),
                state,
            )
        }
    }

    #[tokio::test]
    async fn test_upgrades_all_projects() {
        let fixture = Fixture::new(&["a.csproj", "b.vbproj"]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let context = fixture.context();
        let (command, state) = fixture.command(
            context.clone(),
            Probe {
                seen: seen.clone(),
                cancel_after: None,
                fail_on: None,
            },
        );

        command.run(&CancellationToken::new()).await.unwrap();
        fixture.telemetry.dispose().await;

        assert_eq!(*seen.lock().unwrap(), vec!["a.csproj", "b.vbproj"]);
        assert!(fixture.temp.path().join("a.csproj.bak").exists());

        let mut restored = UpgradeContext::new(fixture.temp.path(), context.lock().await.projects().to_vec());
        state.load_state(&mut restored).await;
        assert!(restored.projects().iter().all(|p| restored.is_completed(p)));
        assert!(restored.current_project().is_none());

        let steps = fixture
            .sink
            .snapshot()
            .events
            .into_iter()
            .filter(|e| e.name.ends_with("/step/apply"))
            .count();
        assert_eq!(steps, 4);
    }

    #[tokio::test]
    async fn test_cancel_then_resume() {
        let fixture = Fixture::new(&["a.csproj", "b.csproj", "c.csproj"]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let token = CancellationToken::new();

        let (command, _) = fixture.command(
            fixture.context(),
            Probe {
                seen: seen.clone(),
                cancel_after: Some((1, token.clone())),
                fail_on: None,
            },
        );
        let err = command.run(&token).await.unwrap_err();
        assert_eq!(UpgradeError::find(&err), Some(&UpgradeError::Canceled));
        assert_eq!(*seen.lock().unwrap(), vec!["a.csproj"]);

        // A fresh session picks up where the first one stopped.
        seen.lock().unwrap().clear();
        let context = fixture.context();
        let (command, state) = fixture.command(
            context.clone(),
            Probe {
                seen: seen.clone(),
                cancel_after: None,
                fail_on: None,
            },
        );
        state.load_state(&mut *context.lock().await).await;
        command.run(&CancellationToken::new()).await.unwrap();
        fixture.telemetry.dispose().await;

        assert_eq!(*seen.lock().unwrap(), vec!["b.csproj", "c.csproj"]);
    }

    #[tokio::test]
    async fn test_failed_project_is_checkpointed_and_resumed() {
        let fixture = Fixture::new(&["a.csproj", "b.csproj", "c.csproj"]);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let (command, state) = fixture.command(
            fixture.context(),
            Probe {
                seen: seen.clone(),
                cancel_after: None,
                fail_on: Some("b.csproj"),
            },
        );
        let err = command.run(&CancellationToken::new()).await.unwrap_err();
        assert!(UpgradeError::find(&err).is_none());
        assert_eq!(*seen.lock().unwrap(), vec!["a.csproj", "b.csproj"]);

        let context = fixture.context();
        state.load_state(&mut *context.lock().await).await;
        {
            let restored = context.lock().await;
            assert_eq!(
                restored.current_project().map(Project::identity).as_deref(),
                Some("b.csproj")
            );
            let b = restored.find_project("b.csproj").unwrap();
            assert!(!restored.is_completed(b));
        }

        seen.lock().unwrap().clear();
        let (command, _) = fixture.command(
            context,
            Probe {
                seen: seen.clone(),
                cancel_after: None,
                fail_on: None,
            },
        );
        command.run(&CancellationToken::new()).await.unwrap();
        fixture.telemetry.dispose().await;

        assert_eq!(*seen.lock().unwrap(), vec!["b.csproj", "c.csproj"]);
    }

    #[tokio::test]
    async fn test_interrupted_project_runs_first() {
        let fixture = Fixture::new(&["a.csproj", "b.csproj", "c.csproj"]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let context = fixture.context();
        {
            let mut ctx = context.lock().await;
            let c = ctx.find_project("c.csproj").cloned();
            ctx.set_current_project(c);
        }

        let (command, _) = fixture.command(
            context,
            Probe {
                seen: seen.clone(),
                cancel_after: None,
                fail_on: None,
            },
        );
        command.run(&CancellationToken::new()).await.unwrap();
        fixture.telemetry.dispose().await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["c.csproj", "a.csproj", "b.csproj"]
        );
    }

    #[tokio::test]
    async fn test_empty_workspace_is_upgrade_error() {
        let fixture = Fixture::new(&[]);
        let (command, _) = fixture.command(
            fixture.context(),
            Probe {
                seen: Arc::default(),
                cancel_after: None,
                fail_on: None,
            },
        );
        let err = command.run(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            UpgradeError::find(&err),
            Some(UpgradeError::Failed(_))
        ));
        fixture.telemetry.dispose().await;
    }
}
