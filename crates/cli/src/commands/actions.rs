use serde_json::json;

use crate::bootstrap::prepare;
use crate::commands::{to_data, CommandResult};
use crate::GlobalArgs;

pub fn run(global: &GlobalArgs) -> CommandResult {
    let (_runtime, app) = match prepare("actions", global) {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let descriptors = app.dispatcher.discover(&app.actor);
    CommandResult::success(
        "actions",
        format!("{} actions available to {}", descriptors.len(), app.actor.role.as_str()),
        json!({ "actorId": app.actor.id.0, "actions": to_data(&descriptors) }),
    )
}
