//! Builds the in-process ledger, navigation broker and dispatcher from the
//! effective configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use ledgerpilot_agent::{DispatchSettings, Dispatcher};
use ledgerpilot_core::audit::TracingAuditSink;
use ledgerpilot_core::config::{
    AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, LoggingConfig,
};
use ledgerpilot_core::domain::Actor;
use ledgerpilot_core::ledger::{fixtures, Ledger};
use ledgerpilot_core::navigation::NavigationBroker;
use tokio::runtime::Runtime;

use crate::commands::CommandResult;
use crate::GlobalArgs;

pub struct App {
    pub config: AppConfig,
    pub dispatcher: Dispatcher,
    pub actor: Actor,
}

pub fn load_config(global: &GlobalArgs) -> Result<AppConfig, ConfigError> {
    AppConfig::load(LoadOptions {
        config_path: global.config.clone(),
        require_file: global.config.is_some(),
        overrides: ConfigOverrides { actor_id: global.actor.clone(), ..ConfigOverrides::default() },
    })
}

/// Installs the global subscriber. Output goes to stderr so stdout stays
/// machine-readable; a second call is a no-op.
pub fn init_logging(config: &LoggingConfig) {
    use tracing::Level;
    use LogFormat::*;

    let log_level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let installed = match config.format {
        Compact => builder.compact().try_init(),
        Pretty => builder.pretty().try_init(),
        Json => builder.json().try_init(),
    };
    if installed.is_err() {
        tracing::debug!(
            event_name = "cli.logging.already_installed",
            "keeping existing subscriber"
        );
    }
}

pub async fn bootstrap(config: AppConfig) -> Result<App> {
    let ledger = if config.dispatch.seed_demo_data {
        Ledger::from_seed(fixtures::demo_seed()).context("demo seed is inconsistent")?
    } else {
        Ledger::default()
    };

    let navigation = Arc::new(NavigationBroker::new(config.start_page()));
    let dispatcher =
        Dispatcher::standard(Arc::new(ledger), navigation, Arc::new(TracingAuditSink))
            .context("action catalog failed to register")?
            .with_settings(DispatchSettings::from(&config.dispatch));

    let actor = dispatcher
        .actor(&config.session.actor_id)
        .await
        .with_context(|| format!("session actor `{}` is not a member", config.session.actor_id))?;

    tracing::info!(
        event_name = "cli.session.ready",
        actor_id = %actor.id.0,
        role = actor.role.as_str(),
        team = actor.team.as_str(),
        start_page = %config.start_page(),
        "session bootstrapped"
    );

    Ok(App { config, dispatcher, actor })
}

/// Loads config, installs logging and bootstraps the app on a fresh
/// current-thread runtime. Failures come back as the command's result.
pub fn prepare(command: &str, global: &GlobalArgs) -> Result<(Runtime, App), CommandResult> {
    let config = load_config(global).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })?;
    init_logging(&config.logging);

    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
            CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            )
        })?;

    let app = runtime.block_on(bootstrap(config)).map_err(|error| {
        CommandResult::failure(command, "bootstrap", format!("{error:#}"), 5)
    })?;

    Ok((runtime, app))
}
