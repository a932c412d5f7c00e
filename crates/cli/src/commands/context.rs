use crate::bootstrap::prepare;
use crate::commands::{to_data, CommandResult};
use crate::GlobalArgs;

pub fn run(global: &GlobalArgs) -> CommandResult {
    let (runtime, app) = match prepare("context", global) {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let context = runtime.block_on(app.dispatcher.context(&app.actor));
    CommandResult::success("context", "readable context", to_data(&context))
}
