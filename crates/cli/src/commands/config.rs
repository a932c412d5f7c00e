use std::env;
use std::fs;
use std::path::Path;

use ledgerpilot_core::config::{resolve_config_path, AppConfig};
use serde::Serialize;
use serde_json::json;
use toml::Value;

use crate::bootstrap::load_config;
use crate::commands::{to_data, CommandResult};
use crate::GlobalArgs;

const PRECEDENCE: &str = "flag > env > file > default";

/// Command-line flag that can set a field, and how to tell it was given.
struct Flag {
    name: &'static str,
    is_set: fn(&GlobalArgs) -> bool,
}

struct Field {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    flag: Option<Flag>,
}

const FIELDS: &[Field] = &[
    Field {
        key_path: "session.actor_id",
        env_keys: &["LEDGERPILOT_SESSION_ACTOR_ID"],
        flag: Some(Flag { name: "--actor", is_set: actor_flag_set }),
    },
    Field {
        key_path: "session.start_page",
        env_keys: &["LEDGERPILOT_SESSION_START_PAGE"],
        flag: None,
    },
    Field {
        key_path: "dispatch.render_latency_ms",
        env_keys: &["LEDGERPILOT_DISPATCH_RENDER_LATENCY_MS"],
        flag: None,
    },
    Field {
        key_path: "dispatch.seed_demo_data",
        env_keys: &["LEDGERPILOT_DISPATCH_SEED_DEMO_DATA"],
        flag: None,
    },
    Field {
        key_path: "logging.level",
        env_keys: &["LEDGERPILOT_LOGGING_LEVEL", "LEDGERPILOT_LOG_LEVEL"],
        flag: None,
    },
    Field {
        key_path: "logging.format",
        env_keys: &["LEDGERPILOT_LOGGING_FORMAT", "LEDGERPILOT_LOG_FORMAT"],
        flag: None,
    },
];

#[derive(Debug, Serialize)]
struct AttributedField {
    key: &'static str,
    value: String,
    source: String,
}

pub fn run(global: &GlobalArgs) -> CommandResult {
    let config = match load_config(global) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            )
        }
    };

    let config_file_path = resolve_config_path(global.config.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let fields: Vec<AttributedField> = FIELDS
        .iter()
        .map(|field| {
            let flag = field.flag.as_ref().filter(|flag| (flag.is_set)(global));
            let source = match flag {
                Some(flag) => format!("flag ({})", flag.name),
                None => field_source(
                    field.key_path,
                    field.env_keys,
                    config_file_doc.as_ref(),
                    config_file_path.as_deref(),
                ),
            };
            AttributedField {
                key: field.key_path,
                value: effective_value(&config, field.key_path),
                source,
            }
        })
        .collect();

    CommandResult::success(
        "config",
        format!("effective config (source precedence: {PRECEDENCE})"),
        json!({ "precedence": PRECEDENCE, "fields": to_data(&fields) }),
    )
}

fn actor_flag_set(global: &GlobalArgs) -> bool {
    global.actor.is_some()
}

fn effective_value(config: &AppConfig, key_path: &str) -> String {
    match key_path {
        "session.actor_id" => config.session.actor_id.clone(),
        "session.start_page" => config.session.start_page.clone(),
        "dispatch.render_latency_ms" => config.dispatch.render_latency_ms.to_string(),
        "dispatch.seed_demo_data" => config.dispatch.seed_demo_data.to_string(),
        "logging.level" => config.logging.level.clone(),
        "logging.format" => format!("{:?}", config.logging.format),
        _ => "<unknown>".to_string(),
    }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}
