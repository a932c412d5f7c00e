//! Agent-facing action layer.
//!
//! The agent never touches the ledger directly. It discovers actions through
//! the [`catalog`], reads the [`context`] it is allowed to see, and invokes
//! actions through the [`dispatcher`], which owns the permission gate and the
//! three interaction modes:
//!
//! - `sync` actions complete inside the call.
//! - `deferredRender` actions return a [`views::DeferredView`] that settles
//!   later and is superseded by newer renders of the same action.
//! - `renderAndWait` actions return an [`interactions::InteractionToken`]
//!   that is later resolved with one of the offered choices.

pub mod args;
pub mod catalog;
pub mod context;
pub mod dispatcher;
pub mod interactions;
pub mod views;

pub use args::{validate_args, ActionArgs, ActionRequest, ArgValue, TransactionFilter};
pub use catalog::{
    ActionCatalog, ActionDefinition, ActionDescriptor, ActionKind, CatalogError, InteractionMode,
    ParamSpec, ParamType,
};
pub use context::{ActorSummary, ReadableContext};
pub use dispatcher::{DispatchSettings, Dispatcher, Outcome};
pub use interactions::{
    Continuation, InteractionTable, InteractionToken, NavigationChoice, PendingInteraction,
    Resolution,
};
pub use views::{DeferredView, DeferredViews, ViewState, ViewTicket};
