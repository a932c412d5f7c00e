use ledgerpilot_agent::Outcome;
use ledgerpilot_core::errors::ActionError;
use serde_json::{json, Value};

use crate::bootstrap::{prepare, App};
use crate::commands::{to_data, CommandResult};
use crate::GlobalArgs;

#[derive(Clone, Debug)]
pub struct InvokeArgs {
    pub action: String,
    pub args: String,
    pub choose: Option<String>,
    pub wait: bool,
}

pub fn run(global: &GlobalArgs, invocation: InvokeArgs) -> CommandResult {
    let raw_args = match serde_json::from_str::<Value>(&invocation.args) {
        Ok(raw_args) => raw_args,
        Err(error) => {
            let error = ActionError::validation("args", format!("not valid JSON: {error}"));
            return CommandResult::action_failure("invoke", &error);
        }
    };

    let (runtime, app) = match prepare("invoke", global) {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    match runtime.block_on(execute(&app, &invocation, &raw_args)) {
        Ok((message, data)) => CommandResult::success("invoke", message, data),
        Err(error) => CommandResult::action_failure("invoke", &error),
    }
}

async fn execute(
    app: &App,
    invocation: &InvokeArgs,
    raw_args: &Value,
) -> Result<(String, Value), ActionError> {
    let outcome = app.dispatcher.invoke(&app.actor, &invocation.action, raw_args).await?;
    let action = outcome.action().name();

    match outcome {
        Outcome::Deferred { mut handle, .. } if invocation.wait => {
            let view = handle.settled().await;
            Ok((
                format!("{action} settled"),
                json!({ "status": "deferred", "action": action, "view": to_data(&view) }),
            ))
        }
        Outcome::AwaitingDecision { token, choices, view, .. } => match &invocation.choose {
            Some(choice) => {
                let result = app.dispatcher.resolve(&app.actor, &token, choice).await?;
                Ok((
                    format!("{action} resolved with `{choice}`"),
                    json!({
                        "status": "resolved",
                        "action": action,
                        "view": view,
                        "choice": choice,
                        "result": result,
                    }),
                ))
            }
            None => {
                app.dispatcher.abandon(&app.actor, &token);
                Ok((
                    format!("{action} needs one of: {}", choices.join(", ")),
                    json!({
                        "status": "awaiting_decision",
                        "action": action,
                        "view": view,
                        "choices": choices,
                    }),
                ))
            }
        },
        other => Ok((format!("{action} dispatched"), to_data(&other))),
    }
}
