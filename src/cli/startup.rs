//! Startup actions run before the upgrade command

use std::io::IsTerminal;
use std::sync::Arc;

use async_trait::async_trait;
use clap::parser::ValueSource;
use clap::{ArgMatches, Command};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cli::output::Output;
use crate::cli::runner::UpgradeStartup;
use crate::core::context::SharedContext;
use crate::core::state::StateManager;
use crate::telemetry::{FirstTimeUseNoticeSentinel, PropertyBag, Telemetry, TelemetryOptions};

/// Rehydrates the shared context from the last checkpoint.
pub struct LoadStateStartup {
    context: SharedContext,
    state: Arc<dyn StateManager>,
}

impl LoadStateStartup {
    pub fn new(context: SharedContext, state: Arc<dyn StateManager>) -> Self {
        Self { context, state }
    }
}

#[async_trait]
impl UpgradeStartup for LoadStateStartup {
    fn name(&self) -> &str {
        "load state"
    }

    async fn startup(&self, _token: &CancellationToken) -> anyhow::Result<bool> {
        let mut context = self.context.lock().await;
        self.state.load_state(&mut context).await;
        Ok(true)
    }
}

/// Asks the user a yes/no question.
#[async_trait]
pub trait UserInput: Send + Sync {
    async fn confirm(&self, prompt: &str, default: bool) -> anyhow::Result<bool>;
}

/// Terminal prompt via dialoguer.
///
/// Without a terminal on stdin every question is answered "no".
pub struct DialoguerInput;

#[async_trait]
impl UserInput for DialoguerInput {
    async fn confirm(&self, prompt: &str, default: bool) -> anyhow::Result<bool> {
        if !std::io::stdin().is_terminal() {
            return Ok(false);
        }
        let prompt = prompt.to_string();
        let answer = tokio::task::spawn_blocking(move || {
            dialoguer::Confirm::new()
                .with_prompt(prompt)
                .default(default)
                .interact()
        })
        .await??;
        Ok(answer)
    }
}

/// Records telemetry consent on first use.
///
/// Consent takes effect from the next run, since the client decides
/// whether it is enabled when it is built.
pub struct ConsoleTelemetryOptIn {
    sentinel: FirstTimeUseNoticeSentinel,
    input: Box<dyn UserInput>,
    non_interactive: bool,
    display_name: String,
    optout_var: String,
    details_link: String,
}

impl ConsoleTelemetryOptIn {
    pub fn new(options: &TelemetryOptions, input: Box<dyn UserInput>, non_interactive: bool) -> Self {
        Self {
            sentinel: FirstTimeUseNoticeSentinel::new(options),
            input,
            non_interactive,
            display_name: options.display_name.clone(),
            optout_var: options.telemetry_optout_var(),
            details_link: options.details_link.clone(),
        }
    }
}

#[async_trait]
impl UpgradeStartup for ConsoleTelemetryOptIn {
    fn name(&self) -> &str {
        "telemetry opt-in"
    }

    async fn startup(&self, _token: &CancellationToken) -> anyhow::Result<bool> {
        if self.sentinel.exists()
            || self.sentinel.skip_first_time_experience()
            || self.non_interactive
        {
            return Ok(true);
        }

        Output::header("Telemetry");
        Output::info(&format!(
            "{} can collect usage data to help improve the tool. Set {}=1 to opt out at any time.",
            self.display_name, self.optout_var
        ));
        if !self.details_link.is_empty() {
            Output::kv("Details", &self.details_link);
        }

        if self
            .input
            .confirm("Allow gathering of usage data?", true)
            .await?
        {
            self.sentinel.create_if_not_exists()?;
            debug!("telemetry consent recorded");
        }
        Ok(true)
    }
}

/// How a command-line symbol was supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Argument,
    Option,
    Unknown,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Argument => "argument",
            Self::Option => "option",
            Self::Unknown => "unknown",
        }
    }
}

/// A symbol supplied on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsedSymbol {
    pub name: String,
    pub kind: SymbolKind,
}

/// Symbols explicitly given on the command line of the invoked subcommand.
pub fn used_symbols(command: &Command, matches: &ArgMatches) -> Vec<UsedSymbol> {
    if let Some((name, sub_matches)) = matches.subcommand() {
        return match command.find_subcommand(name) {
            Some(sub_command) => used_symbols(sub_command, sub_matches),
            None => vec![UsedSymbol {
                name: name.to_string(),
                kind: SymbolKind::Unknown,
            }],
        };
    }

    command
        .get_arguments()
        .filter(|arg| {
            matches!(
                matches.value_source(arg.get_id().as_str()),
                Some(ValueSource::CommandLine)
            )
        })
        .map(|arg| UsedSymbol {
            name: arg.get_id().to_string(),
            kind: if arg.is_positional() {
                SymbolKind::Argument
            } else {
                SymbolKind::Option
            },
        })
        .collect()
}

/// Reports which arguments and options were used.
pub struct UsedCommandTelemetry {
    symbols: Vec<UsedSymbol>,
    telemetry: Arc<Telemetry>,
}

impl UsedCommandTelemetry {
    pub fn new(symbols: Vec<UsedSymbol>, telemetry: Arc<Telemetry>) -> Self {
        Self { symbols, telemetry }
    }
}

#[async_trait]
impl UpgradeStartup for UsedCommandTelemetry {
    fn name(&self) -> &str {
        "used command telemetry"
    }

    async fn startup(&self, _token: &CancellationToken) -> anyhow::Result<bool> {
        for symbol in &self.symbols {
            self.telemetry.track(
                "cli/command",
                PropertyBag::new()
                    .with("Name", symbol.name.as_str())
                    .with("Type", symbol.kind.as_str()),
            );
        }
        Ok(true)
    }
}
