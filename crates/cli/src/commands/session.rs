//! JSON-lines request loop.
//!
//! Each input line is one request tagged by `op`; each reply is one line of
//! `{"ok": true, "data": ...}` or `{"ok": false, "error": {...}}`. Pending
//! interactions and deferred views live as long as the session does.

use ledgerpilot_agent::{Dispatcher, InteractionToken};
use ledgerpilot_core::domain::Actor;
use ledgerpilot_core::errors::{ActionError, ErrorPayload};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::bootstrap::prepare;
use crate::commands::{to_data, CommandResult};
use crate::GlobalArgs;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SessionRequest {
    Actions,
    Context,
    Invoke {
        action: String,
        #[serde(default)]
        args: Value,
    },
    Resolve {
        token: InteractionToken,
        choice: String,
    },
    Abandon {
        token: InteractionToken,
    },
    /// Current state of an action's deferred view.
    View {
        action: String,
    },
    /// Blocks until an action's newest deferred view settles.
    Wait {
        action: String,
    },
    LoadPage {
        location: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionReply {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl SessionReply {
    fn from_result(result: Result<Value, ActionError>) -> Self {
        match result {
            Ok(data) => Self { ok: true, data: Some(data), error: None },
            Err(error) => Self { ok: false, data: None, error: Some(error.payload()) },
        }
    }
}

pub fn run(global: &GlobalArgs) -> CommandResult {
    let (runtime, app) = match prepare("session", global) {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let served = runtime.block_on(async {
        let reader = BufReader::new(tokio::io::stdin());
        let mut writer = tokio::io::stdout();
        drive(&app.dispatcher, &app.actor, reader, &mut writer).await
    });

    match served {
        Ok(count) => CommandResult::success(
            "session",
            format!("served {count} requests"),
            json!({ "requests": count }),
        ),
        Err(error) => CommandResult::failure("session", "io", error.to_string(), 6),
    }
}

/// Serves requests from `reader` until EOF. Blank lines are skipped.
pub async fn drive<R, W>(
    dispatcher: &Dispatcher,
    actor: &Actor,
    reader: R,
    writer: &mut W,
) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut served = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let reply = handle_line(dispatcher, actor, &line).await;
        let mut encoded = serde_json::to_string(&reply).map_err(std::io::Error::other)?;
        encoded.push('\n');
        writer.write_all(encoded.as_bytes()).await?;
        writer.flush().await?;
        served += 1;
    }

    Ok(served)
}

pub async fn handle_line(dispatcher: &Dispatcher, actor: &Actor, line: &str) -> SessionReply {
    match serde_json::from_str::<SessionRequest>(line) {
        Ok(request) => handle(dispatcher, actor, request).await,
        Err(error) => SessionReply::from_result(Err(ActionError::validation(
            "request",
            format!("unreadable request: {error}"),
        ))),
    }
}

pub async fn handle(
    dispatcher: &Dispatcher,
    actor: &Actor,
    request: SessionRequest,
) -> SessionReply {
    tracing::debug!(event_name = "cli.session.request", request = ?request, "serving request");
    SessionReply::from_result(serve(dispatcher, actor, request).await)
}

async fn serve(
    dispatcher: &Dispatcher,
    actor: &Actor,
    request: SessionRequest,
) -> Result<Value, ActionError> {
    match request {
        SessionRequest::Actions => Ok(to_data(&dispatcher.discover(actor))),
        SessionRequest::Context => Ok(to_data(&dispatcher.context(actor).await)),
        SessionRequest::Invoke { action, args } => {
            let outcome = dispatcher.invoke(actor, &action, &args).await?;
            Ok(to_data(&outcome))
        }
        SessionRequest::Resolve { token, choice } => {
            dispatcher.resolve(actor, &token, &choice).await
        }
        SessionRequest::Abandon { token } => {
            Ok(json!({ "abandoned": dispatcher.abandon(actor, &token) }))
        }
        SessionRequest::View { action } => {
            let view = dispatcher.view(&action).ok_or_else(|| no_view(&action))?;
            Ok(to_data(&view))
        }
        SessionRequest::Wait { action } => {
            let mut handle = dispatcher.subscribe(&action).ok_or_else(|| no_view(&action))?;
            Ok(to_data(&handle.settled().await))
        }
        SessionRequest::LoadPage { location } => {
            let resumed = dispatcher.navigation().load_path(&location)?;
            Ok(json!({
                "page": dispatcher.navigation().current_page().path(),
                "resumed": resumed.map(|operation| operation.code()),
            }))
        }
    }
}

fn no_view(action: &str) -> ActionError {
    ActionError::NotFound { message: format!("no deferred view for `{action}`") }
}

