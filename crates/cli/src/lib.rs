pub mod bootstrap;
pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "ledgerpilot",
    about = "Ledgerpilot agent action console",
    long_about = "Discover, invoke and resolve ledger actions as a configured member.",
    after_help = "Examples:\n  ledgerpilot actions\n  \
                  ledgerpilot invoke showAndApproveTransactions \
                  --args '{\"transactionId\":\"t-3\"}' --choose approve\n  \
                  ledgerpilot session"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Options shared by every subcommand.
#[derive(Clone, Debug, Default, Args)]
pub struct GlobalArgs {
    #[arg(long, global = true, help = "Path to a ledgerpilot.toml config file")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Member id to act as (overrides session.actor_id)")]
    pub actor: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "List the actions the acting member may invoke")]
    Actions,
    #[command(about = "Print the readable context exposed to the agent")]
    Context,
    #[command(about = "Invoke one action and print its outcome")]
    Invoke {
        #[arg(help = "Action name, e.g. addNewCard")]
        action: String,
        #[arg(long, default_value = "{}", help = "Arguments as a JSON object")]
        args: String,
        #[arg(long, help = "Resolve a renderAndWait action with this choice")]
        choose: Option<String>,
        #[arg(long, help = "Return immediately instead of waiting for a deferred view")]
        no_wait: bool,
    },
    #[command(about = "Serve JSON-lines requests on stdin until EOF")]
    Session,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Actions => commands::actions::run(&cli.global),
        Command::Context => commands::context::run(&cli.global),
        Command::Invoke { action, args, choose, no_wait } => commands::invoke::run(
            &cli.global,
            commands::invoke::InvokeArgs { action, args, choose, wait: !no_wait },
        ),
        Command::Session => commands::session::run(&cli.global),
        Command::Config => commands::config::run(&cli.global),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
