use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::fixtures::EXECUTIVE_ADMIN_ID;
use crate::navigation::Page;

pub const DEFAULT_CONFIG_FILE: &str = "ledgerpilot.toml";
pub const MAX_RENDER_LATENCY_MS: u64 = 60_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub dispatch: DispatchConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Member the session acts as. Must exist in the seeded ledger.
    pub actor_id: String,
    pub start_page: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Simulated delay before a deferred view settles.
    pub render_latency_ms: u64,
    pub seed_demo_data: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub actor_id: Option<String>,
    pub start_page: Option<String>,
    pub render_latency_ms: Option<u64>,
    pub seed_demo_data: Option<bool>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig {
                actor_id: EXECUTIVE_ADMIN_ID.to_string(),
                start_page: Page::Dashboard.path().to_string(),
            },
            dispatch: DispatchConfig { render_latency_ms: 3_000, seed_demo_data: true },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn start_page(&self) -> Page {
        Page::from_path(&self.session.start_page).unwrap_or_default()
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(session) = patch.session {
            if let Some(actor_id) = session.actor_id {
                self.session.actor_id = actor_id;
            }
            if let Some(start_page) = session.start_page {
                self.session.start_page = start_page;
            }
        }

        if let Some(dispatch) = patch.dispatch {
            if let Some(render_latency_ms) = dispatch.render_latency_ms {
                self.dispatch.render_latency_ms = render_latency_ms;
            }
            if let Some(seed_demo_data) = dispatch.seed_demo_data {
                self.dispatch.seed_demo_data = seed_demo_data;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LEDGERPILOT_SESSION_ACTOR_ID") {
            self.session.actor_id = value;
        }
        if let Some(value) = read_env("LEDGERPILOT_SESSION_START_PAGE") {
            self.session.start_page = value;
        }

        if let Some(value) = read_env("LEDGERPILOT_DISPATCH_RENDER_LATENCY_MS") {
            self.dispatch.render_latency_ms =
                parse_u64("LEDGERPILOT_DISPATCH_RENDER_LATENCY_MS", &value)?;
        }
        if let Some(value) = read_env("LEDGERPILOT_DISPATCH_SEED_DEMO_DATA") {
            self.dispatch.seed_demo_data =
                parse_bool("LEDGERPILOT_DISPATCH_SEED_DEMO_DATA", &value)?;
        }

        let log_level =
            read_env("LEDGERPILOT_LOGGING_LEVEL").or_else(|| read_env("LEDGERPILOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LEDGERPILOT_LOGGING_FORMAT").or_else(|| read_env("LEDGERPILOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(actor_id) = overrides.actor_id {
            self.session.actor_id = actor_id;
        }
        if let Some(start_page) = overrides.start_page {
            self.session.start_page = start_page;
        }
        if let Some(render_latency_ms) = overrides.render_latency_ms {
            self.dispatch.render_latency_ms = render_latency_ms;
        }
        if let Some(seed_demo_data) = overrides.seed_demo_data {
            self.dispatch.seed_demo_data = seed_demo_data;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_session(&self.session)?;
        validate_dispatch(&self.dispatch)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Config file `load` would read: the explicit path when it exists, otherwise the
/// first default location present.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), Path::new("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if session.actor_id.trim().is_empty() {
        return Err(ConfigError::Validation("session.actor_id must not be empty".to_string()));
    }

    if Page::from_path(&session.start_page).is_none() {
        let known: Vec<&str> = Page::ALL.iter().map(Page::path).collect();
        return Err(ConfigError::Validation(format!(
            "session.start_page `{}` is not a known page (expected one of {})",
            session.start_page,
            known.join("|")
        )));
    }

    Ok(())
}

fn validate_dispatch(dispatch: &DispatchConfig) -> Result<(), ConfigError> {
    if dispatch.render_latency_ms > MAX_RENDER_LATENCY_MS {
        return Err(ConfigError::Validation(format!(
            "dispatch.render_latency_ms must be in range 0..={MAX_RENDER_LATENCY_MS}"
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    session: Option<SessionPatch>,
    dispatch: Option<DispatchPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    actor_id: Option<String>,
    start_page: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DispatchPatch {
    render_latency_ms: Option<u64>,
    seed_demo_data: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::navigation::Page;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const LEDGERPILOT_VARS: &[&str] = &[
        "LEDGERPILOT_SESSION_ACTOR_ID",
        "LEDGERPILOT_SESSION_START_PAGE",
        "LEDGERPILOT_DISPATCH_RENDER_LATENCY_MS",
        "LEDGERPILOT_DISPATCH_SEED_DEMO_DATA",
        "LEDGERPILOT_LOGGING_LEVEL",
        "LEDGERPILOT_LOG_LEVEL",
        "LEDGERPILOT_LOGGING_FORMAT",
        "LEDGERPILOT_LOG_FORMAT",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_validate_and_act_as_executive_admin() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(LEDGERPILOT_VARS);

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.session.actor_id == "9g5h2j1k4l", "default actor is the executive admin")?;
        ensure(config.start_page() == Page::Dashboard, "default start page is the dashboard")?;
        ensure(config.dispatch.render_latency_ms == 3_000, "default latency is 3000ms")?;
        ensure(config.dispatch.seed_demo_data, "demo data is seeded by default")?;
        ensure(matches!(config.logging.format, LogFormat::Compact), "compact logs by default")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(LEDGERPILOT_VARS);

        env::set_var("TEST_LEDGERPILOT_ACTOR", "1a2b3c4d5e");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("ledgerpilot.toml");
            fs::write(
                &path,
                r#"
[session]
actor_id = "${TEST_LEDGERPILOT_ACTOR}"
start_page = "/cards"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.session.actor_id == "1a2b3c4d5e", "actor should come from environment")?;
            ensure(config.start_page() == Page::Cards, "start page should come from the file")
        })();

        clear_vars(&["TEST_LEDGERPILOT_ACTOR"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(LEDGERPILOT_VARS);
        clear_vars(&["TEST_LEDGERPILOT_UNSET"]);

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("ledgerpilot.toml");
        fs::write(&path, "[session]\nactor_id = \"${TEST_LEDGERPILOT_UNSET}\"\n")
            .map_err(|err| err.to_string())?;

        let outcome =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() });
        ensure(
            matches!(
                outcome,
                Err(ConfigError::MissingEnvInterpolation { ref var })
                    if var == "TEST_LEDGERPILOT_UNSET"
            ),
            "unset interpolation variable should fail the load",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(LEDGERPILOT_VARS);

        env::set_var("LEDGERPILOT_LOG_LEVEL", "warn");
        env::set_var("LEDGERPILOT_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )
        })();

        clear_vars(LEDGERPILOT_VARS);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(LEDGERPILOT_VARS);

        env::set_var("LEDGERPILOT_DISPATCH_RENDER_LATENCY_MS", "250");
        env::set_var("LEDGERPILOT_SESSION_START_PAGE", "/team");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("ledgerpilot.toml");
            fs::write(
                &path,
                r#"
[session]
start_page = "/cards"

[dispatch]
render_latency_ms = 1000
seed_demo_data = false

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    render_latency_ms: Some(0),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.dispatch.render_latency_ms == 0, "override latency should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.start_page() == Page::Team, "env start page should win over file")?;
            ensure(!config.dispatch.seed_demo_data, "file value should win over defaults")
        })();

        clear_vars(LEDGERPILOT_VARS);
        result
    }

    #[test]
    fn invalid_env_number_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(LEDGERPILOT_VARS);

        env::set_var("LEDGERPILOT_DISPATCH_RENDER_LATENCY_MS", "soon");
        let outcome = AppConfig::load(LoadOptions::default());
        clear_vars(LEDGERPILOT_VARS);

        ensure(
            matches!(
                outcome,
                Err(ConfigError::InvalidEnvOverride { ref key, .. })
                    if key == "LEDGERPILOT_DISPATCH_RENDER_LATENCY_MS"
            ),
            "non-numeric latency should be rejected",
        )
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(LEDGERPILOT_VARS);

        let unknown_page = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                start_page: Some("/settings".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });
        ensure(
            matches!(
                unknown_page,
                Err(ConfigError::Validation(ref message)) if message.contains("session.start_page")
            ),
            "validation failure should mention session.start_page",
        )?;

        let slow = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                render_latency_ms: Some(120_000),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });
        ensure(
            matches!(
                slow,
                Err(ConfigError::Validation(ref message)) if message.contains("render_latency_ms")
            ),
            "validation failure should mention dispatch.render_latency_ms",
        )
    }

    #[test]
    fn required_file_must_exist() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(LEDGERPILOT_VARS);

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let outcome = AppConfig::load(LoadOptions {
            config_path: Some(dir.path().join("absent.toml")),
            require_file: true,
            ..LoadOptions::default()
        });

        ensure(
            matches!(outcome, Err(ConfigError::MissingConfigFile(_))),
            "missing required file should be reported",
        )
    }
}
