//! upgrade-assistant CLI entry point

use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tokio_util::sync::CancellationToken;

use upgrade_assistant::cli::commands::run_upgrade;
use upgrade_assistant::cli::{used_symbols, ApplicationLifetime, ExitCode, Output, UpgradeOptions};
use upgrade_assistant::core::UpgradeError;
use upgrade_assistant::telemetry::{init_logging, LogConfig};

#[derive(Parser)]
#[command(name = "upgrade-assistant")]
#[command(author, version, about = "Resumable project upgrade pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upgrade a project or every project in a directory
    Upgrade {
        /// Project file or workspace directory
        project: PathBuf,
        /// Never prompt for input
        #[arg(long, env = "UPGRADE_ASSISTANT_NON_INTERACTIVE")]
        non_interactive: bool,
        /// Don't back up project files before upgrading
        #[arg(long)]
        skip_backup: bool,
        /// Show debug logs
        #[arg(short, long)]
        verbose: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let command = Cli::command();
    let matches = command.clone().get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    match cli.command {
        Commands::Upgrade {
            project,
            non_interactive,
            skip_backup,
            verbose,
        } => {
            let log_config = if verbose {
                LogConfig::verbose()
            } else {
                LogConfig::default()
            };
            init_logging(&log_config)?;

            let options = UpgradeOptions {
                project,
                non_interactive,
                skip_backup,
                verbose,
            };

            let token = CancellationToken::new();
            let lifetime = Arc::new(ApplicationLifetime::new());
            let ctrl_c = {
                let token = token.clone();
                let lifetime = lifetime.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        result = tokio::signal::ctrl_c() => {
                            if result.is_ok() {
                                token.cancel();
                            }
                        }
                        _ = lifetime.stopped() => {}
                    }
                })
            };

            let used = used_symbols(&command, &matches);
            let code = match run_upgrade(&options, used, token, lifetime).await {
                Ok(code) => code,
                Err(e) => {
                    Output::error(&format!("{e:#}"));
                    match UpgradeError::find(&e) {
                        Some(_) => ExitCode::UpgradeError,
                        None => ExitCode::UnexpectedError,
                    }
                }
            };
            ctrl_c.abort();
            std::process::exit(code.code());
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "upgrade-assistant", &mut std::io::stdout());
        }
    }

    Ok(())
}
