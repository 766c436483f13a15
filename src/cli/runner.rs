//! Top-level pipeline run.
//!
//! Startup actions run in order, then exactly one command. Whatever happens,
//! the outcome is reduced to a single [`ExitCode`], an `exited` event is sent,
//! and shutdown is requested once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::cli::output::Output;
use crate::core::error::UpgradeError;
use crate::telemetry::{PropertyBag, Telemetry};

/// Process exit codes, one per outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    UnexpectedError = 1,
    UpgradeError = 2,
    Canceled = 3,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// An action run before the command. Returning `false` aborts the run.
#[async_trait]
pub trait UpgradeStartup: Send + Sync {
    fn name(&self) -> &str;

    async fn startup(&self, token: &CancellationToken) -> anyhow::Result<bool>;
}

/// The one command a run executes.
#[async_trait]
pub trait AppCommand: Send + Sync {
    async fn run(&self, token: &CancellationToken) -> anyhow::Result<()>;
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    NotStarted,
    RunningStartup,
    RunningCommand,
    Succeeded,
    Failed,
    Canceled,
}

/// Shutdown requests for the process.
#[derive(Debug, Default)]
pub struct ApplicationLifetime {
    requests: AtomicUsize,
    stopped: Notify,
}

impl ApplicationLifetime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop_application(&self) {
        if self.requests.fetch_add(1, Ordering::SeqCst) == 0 {
            self.stopped.notify_waiters();
        }
    }

    pub fn stop_requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn is_stopping(&self) -> bool {
        self.stop_requests() > 0
    }

    /// Resolve once shutdown has been requested.
    pub async fn stopped(&self) {
        let notified = self.stopped.notified();
        if self.is_stopping() {
            return;
        }
        notified.await;
    }
}

pub struct PipelineRunner {
    startups: Vec<Box<dyn UpgradeStartup>>,
    command: Box<dyn AppCommand>,
    telemetry: Arc<Telemetry>,
    lifetime: Arc<ApplicationLifetime>,
    phase: Mutex<RunPhase>,
}

impl PipelineRunner {
    pub fn new(
        command: Box<dyn AppCommand>,
        telemetry: Arc<Telemetry>,
        lifetime: Arc<ApplicationLifetime>,
    ) -> Self {
        Self {
            startups: Vec::new(),
            command,
            telemetry,
            lifetime,
            phase: Mutex::new(RunPhase::NotStarted),
        }
    }

    pub fn startup(mut self, startup: Box<dyn UpgradeStartup>) -> Self {
        self.startups.push(startup);
        self
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: RunPhase) {
        debug!(?phase, "pipeline phase");
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    /// Run to completion and return the exit code.
    pub async fn run(&self, token: &CancellationToken) -> ExitCode {
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(anyhow::Error::from(UpgradeError::Canceled)),
            result = self.run_pipeline(token) => result,
        };

        let code = self.classify(outcome);

        self.telemetry
            .send_event(
                "exited",
                Some(PropertyBag::new().with("Exit Code", code.code().to_string())),
                None,
            )
            .await;
        self.lifetime.stop_application();
        code
    }

    async fn run_pipeline(&self, token: &CancellationToken) -> anyhow::Result<()> {
        self.set_phase(RunPhase::RunningStartup);
        for startup in &self.startups {
            debug!(startup = startup.name(), "running startup action");
            if !startup.startup(token).await? {
                return Err(UpgradeError::failed(format!(
                    "Failure running start up action {}",
                    startup.name()
                ))
                .into());
            }
        }

        self.set_phase(RunPhase::RunningCommand);
        self.command.run(token).await
    }

    fn classify(&self, outcome: anyhow::Result<()>) -> ExitCode {
        let Err(err) = outcome else {
            self.set_phase(RunPhase::Succeeded);
            return ExitCode::Success;
        };

        match UpgradeError::find(&err) {
            Some(UpgradeError::Canceled) => {
                info!("Upgrade canceled");
                self.set_phase(RunPhase::Canceled);
                ExitCode::Canceled
            }
            Some(UpgradeError::Failed(message)) => {
                error!(%message, "Upgrade failed");
                Output::error(message);
                self.telemetry.track(
                    "failure/upgrade",
                    PropertyBag::new().with("Message", message.as_str()),
                );
                self.set_phase(RunPhase::Failed);
                ExitCode::UpgradeError
            }
            None => {
                error!(error = ?err, "Unexpected error");
                Output::error(&format!("Unexpected error: {err}"));
                self.telemetry.track_exception(&err);
                self.set_phase(RunPhase::Failed);
                ExitCode::UnexpectedError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{
        FirstTimeUseNoticeSentinel, RecordingSink, TelemetryOptions, TelemetrySink,
    };
    use std::sync::atomic::AtomicBool;
    use tempfile::TempDir;

    struct Fixed {
        name: &'static str,
        result: bool,
        ran: Arc<AtomicBool>,
    }

    #[async_trait]
    impl UpgradeStartup for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn startup(&self, _token: &CancellationToken) -> anyhow::Result<bool> {
            self.ran.store(true, Ordering::SeqCst);
            Ok(self.result)
        }
    }

    enum Behavior {
        Complete,
        Fail,
        Cancel,
        Crash,
    }

    struct Scripted {
        behavior: Behavior,
        ran: Arc<AtomicBool>,
    }

    #[async_trait]
    impl AppCommand for Scripted {
        async fn run(&self, token: &CancellationToken) -> anyhow::Result<()> {
            self.ran.store(true, Ordering::SeqCst);
            match self.behavior {
                Behavior::Complete => Ok(()),
                Behavior::Fail => Err(UpgradeError::failed("nothing to upgrade").into()),
                Behavior::Cancel => {
                    token.cancel();
                    std::future::pending::<()>().await;
                    Ok(())
                }
                Behavior::Crash => anyhow::bail!("disk on fire"),
            }
        }
    }

    struct Harness {
        _temp: TempDir,
        sink: RecordingSink,
        telemetry: Arc<Telemetry>,
        lifetime: Arc<ApplicationLifetime>,
        command_ran: Arc<AtomicBool>,
    }

    impl Harness {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let options =
                TelemetryOptions::new("Upgrade Assistant", "0.5.0").with_profile_dir(temp.path());
            FirstTimeUseNoticeSentinel::new(&options)
                .create_if_not_exists()
                .unwrap();

            let sink = RecordingSink::new();
            let recorder = sink.clone();
            let telemetry = Telemetry::builder(options)
                .common_properties(PropertyBag::new)
                .sink(move || Ok(Box::new(recorder) as Box<dyn TelemetrySink>))
                .build();

            Self {
                _temp: temp,
                sink,
                telemetry: Arc::new(telemetry),
                lifetime: Arc::new(ApplicationLifetime::new()),
                command_ran: Arc::new(AtomicBool::new(false)),
            }
        }

        fn runner(&self, behavior: Behavior) -> PipelineRunner {
            PipelineRunner::new(
                Box::new(Scripted {
                    behavior,
                    ran: self.command_ran.clone(),
                }),
                self.telemetry.clone(),
                self.lifetime.clone(),
            )
        }

        async fn finish(&self) {
            self.telemetry.dispose().await;
        }

        fn exit_code_property(&self) -> Option<String> {
            self.sink
                .snapshot()
                .events
                .iter()
                .find(|e| e.name.ends_with("/exited"))
                .map(|e| e.properties["Exit Code"].clone())
        }
    }

    fn fixed(name: &'static str, result: bool) -> (Box<dyn UpgradeStartup>, Arc<AtomicBool>) {
        let ran = Arc::new(AtomicBool::new(false));
        (
            Box::new(Fixed {
                name,
                result,
                ran: ran.clone(),
            }),
            ran,
        )
    }

    #[tokio::test]
    async fn test_success() {
        let harness = Harness::new();
        let (first, first_ran) = fixed("first", true);
        let (second, second_ran) = fixed("second", true);
        let runner = harness
            .runner(Behavior::Complete)
            .startup(first)
            .startup(second);

        let code = runner.run(&CancellationToken::new()).await;
        harness.finish().await;

        assert_eq!(code, ExitCode::Success);
        assert_eq!(runner.phase(), RunPhase::Succeeded);
        assert!(first_ran.load(Ordering::SeqCst));
        assert!(second_ran.load(Ordering::SeqCst));
        assert!(harness.command_ran.load(Ordering::SeqCst));
        assert_eq!(harness.exit_code_property().as_deref(), Some("0"));
        assert_eq!(harness.lifetime.stop_requests(), 1);
    }

    #[tokio::test]
    async fn test_startup_false_aborts() {
        let harness = Harness::new();
        let (first, _) = fixed("consent", false);
        let (second, second_ran) = fixed("later", true);
        let runner = harness
            .runner(Behavior::Complete)
            .startup(first)
            .startup(second);

        let code = runner.run(&CancellationToken::new()).await;
        harness.finish().await;

        assert_eq!(code, ExitCode::UpgradeError);
        assert!(!second_ran.load(Ordering::SeqCst));
        assert!(!harness.command_ran.load(Ordering::SeqCst));
        assert_eq!(harness.exit_code_property().as_deref(), Some("2"));

        let failure = harness
            .sink
            .snapshot()
            .events
            .into_iter()
            .find(|e| e.name.ends_with("/failure/upgrade"))
            .unwrap();
        assert_eq!(
            failure.properties["Message"],
            "Failure running start up action consent"
        );
    }

    #[tokio::test]
    async fn test_domain_failure() {
        let harness = Harness::new();
        let code = harness
            .runner(Behavior::Fail)
            .run(&CancellationToken::new())
            .await;
        harness.finish().await;
        assert_eq!(code, ExitCode::UpgradeError);
    }

    #[tokio::test]
    async fn test_cancellation() {
        let harness = Harness::new();
        let runner = harness.runner(Behavior::Cancel);
        let code = runner.run(&CancellationToken::new()).await;
        harness.finish().await;

        assert_eq!(code, ExitCode::Canceled);
        assert_eq!(runner.phase(), RunPhase::Canceled);
        assert_eq!(harness.exit_code_property().as_deref(), Some("3"));
        assert!(harness.sink.snapshot().exceptions.is_empty());
    }

    #[tokio::test]
    async fn test_already_canceled_token() {
        let harness = Harness::new();
        let token = CancellationToken::new();
        token.cancel();
        let code = harness.runner(Behavior::Complete).run(&token).await;
        harness.finish().await;

        assert_eq!(code, ExitCode::Canceled);
        assert!(!harness.command_ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_unexpected_error_reported() {
        let harness = Harness::new();
        let code = harness
            .runner(Behavior::Crash)
            .run(&CancellationToken::new())
            .await;
        harness.finish().await;

        assert_eq!(code, ExitCode::UnexpectedError);
        let recorded = harness.sink.snapshot();
        assert_eq!(recorded.exceptions.len(), 1);
        assert_eq!(recorded.exceptions[0].message, "disk on fire");
        assert_eq!(harness.exit_code_property().as_deref(), Some("1"));
        assert_eq!(harness.lifetime.stop_requests(), 1);
    }

    #[tokio::test]
    async fn test_lifetime_stopped_resolves() {
        let lifetime = Arc::new(ApplicationLifetime::new());
        let waiter = {
            let lifetime = lifetime.clone();
            tokio::spawn(async move { lifetime.stopped().await })
        };
        tokio::task::yield_now().await;
        lifetime.stop_application();
        lifetime.stop_application();
        waiter.await.unwrap();
        lifetime.stopped().await;
        assert_eq!(lifetime.stop_requests(), 2);
    }

    #[test]
    fn test_stopped_pending_until_first_request() {
        let lifetime = ApplicationLifetime::new();
        let mut stopped = tokio_test::task::spawn(lifetime.stopped());
        tokio_test::assert_pending!(stopped.poll());

        lifetime.stop_application();
        assert!(stopped.is_woken());
        tokio_test::assert_ready!(stopped.poll());
        assert!(lifetime.is_stopping());
    }
}
