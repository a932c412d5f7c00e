//! Progressively updating views for `deferredRender` actions.
//!
//! Each action identity owns one slot: a `watch` channel plus a generation
//! counter. Starting a render bumps the generation and publishes
//! `in_progress`; a render may settle the slot only while its generation is
//! still current, so a superseded render can never overwrite a newer view.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ViewState {
    Idle,
    InProgress { generation: u64, identity: Value },
    Final { generation: u64, identity: Value, result: Value },
    Error { generation: u64, identity: Value, message: String },
}

impl ViewState {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Idle => 0,
            Self::InProgress { generation, .. }
            | Self::Final { generation, .. }
            | Self::Error { generation, .. } => *generation,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Final { .. } | Self::Error { .. })
    }
}

/// Read side of a slot. Always shows the newest render for its identity.
#[derive(Clone, Debug)]
pub struct DeferredView {
    key: String,
    receiver: watch::Receiver<ViewState>,
}

impl DeferredView {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn current(&self) -> ViewState {
        self.receiver.borrow().clone()
    }

    /// Waits until the newest render settles.
    pub async fn settled(&mut self) -> ViewState {
        let settled =
            self.receiver.wait_for(ViewState::is_settled).await.map(|state| state.clone());
        settled.unwrap_or_else(|_| self.current())
    }
}

/// Write side held by one render. Settling is a no-op once a newer render has
/// started on the same slot.
#[derive(Debug)]
pub struct ViewTicket {
    key: String,
    generation: u64,
    identity: Value,
    sender: Arc<watch::Sender<ViewState>>,
}

impl ViewTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn settle(self, outcome: Result<Value, String>) -> bool {
        let Self { key, generation, identity, sender } = self;
        let next = match outcome {
            Ok(result) => ViewState::Final { generation, identity, result },
            Err(message) => ViewState::Error { generation, identity, message },
        };

        let published = sender.send_if_modified(|state| {
            if state.generation() != generation {
                return false;
            }
            *state = next;
            true
        });

        if !published {
            tracing::debug!(
                event_name = "agent.view.superseded",
                view = %key,
                generation,
                "dropping result of superseded render"
            );
        }
        published
    }
}

struct Slot {
    generation: u64,
    sender: Arc<watch::Sender<ViewState>>,
}

#[derive(Default)]
pub struct DeferredViews {
    slots: Mutex<HashMap<String, Slot>>,
}

impl DeferredViews {
    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Starts a render on `key`, superseding any render still in flight there.
    pub fn begin(&self, key: &str, identity: Value) -> (ViewTicket, DeferredView) {
        let mut slots = self.slots();
        let slot = slots.entry(key.to_string()).or_insert_with(|| Slot {
            generation: 0,
            sender: Arc::new(watch::Sender::new(ViewState::Idle)),
        });
        slot.generation += 1;
        let generation = slot.generation;
        slot.sender.send_replace(ViewState::InProgress { generation, identity: identity.clone() });

        let ticket = ViewTicket {
            key: key.to_string(),
            generation,
            identity,
            sender: Arc::clone(&slot.sender),
        };
        let view = DeferredView { key: key.to_string(), receiver: slot.sender.subscribe() };
        (ticket, view)
    }

    pub fn subscribe(&self, key: &str) -> Option<DeferredView> {
        self.slots()
            .get(key)
            .map(|slot| DeferredView { key: key.to_string(), receiver: slot.sender.subscribe() })
    }

    pub fn current(&self, key: &str) -> Option<ViewState> {
        self.slots().get(key).map(|slot| slot.sender.borrow().clone())
    }
}
