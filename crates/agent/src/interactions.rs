//! Pending `renderAndWait` interactions.
//!
//! Phase one of an interactive action stores a [`Continuation`] under a fresh
//! token and hands the token and its choices to the caller. Phase two claims
//! the token with one of those choices. A token is claimed at most once;
//! abandoning it drops the continuation without touching the ledger.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use ledgerpilot_core::approvals::ApprovalDecision;
use ledgerpilot_core::domain::{Actor, TransactionId};
use ledgerpilot_core::errors::ActionError;
use ledgerpilot_core::navigation::Redirect;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::ActionKind;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InteractionToken(pub String);

impl InteractionToken {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationChoice {
    Confirm,
    Cancel,
}

impl NavigationChoice {
    pub const ALL: [NavigationChoice; 2] = [NavigationChoice::Confirm, NavigationChoice::Cancel];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Cancel => "cancel",
        }
    }

    pub fn from_choice(choice: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == choice.trim())
    }
}

/// What resolving an interaction will do.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Continuation {
    Approval { transaction_id: TransactionId },
    Navigation { redirect: Redirect },
}

impl Continuation {
    pub fn action(&self) -> ActionKind {
        match self {
            Self::Approval { .. } => ActionKind::ShowAndApproveTransactions,
            Self::Navigation { .. } => ActionKind::NavigateToPageAndPerform,
        }
    }

    pub fn choices(&self) -> Vec<&'static str> {
        match self {
            Self::Approval { .. } => {
                ApprovalDecision::ALL.iter().map(ApprovalDecision::as_str).collect()
            }
            Self::Navigation { .. } => {
                NavigationChoice::ALL.iter().map(NavigationChoice::as_str).collect()
            }
        }
    }

    fn parse_choice(&self, choice: &str) -> Option<Resolution> {
        match self {
            Self::Approval { .. } => {
                ApprovalDecision::from_choice(choice).map(Resolution::Approval)
            }
            Self::Navigation { .. } => {
                NavigationChoice::from_choice(choice).map(Resolution::Navigation)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Approval(ApprovalDecision),
    Navigation(NavigationChoice),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PendingInteraction {
    pub token: InteractionToken,
    pub actor: Actor,
    pub continuation: Continuation,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct InteractionTable {
    pending: Mutex<HashMap<InteractionToken, PendingInteraction>>,
}

impl InteractionTable {
    fn pending(&self) -> MutexGuard<'_, HashMap<InteractionToken, PendingInteraction>> {
        match self.pending.lock() {
            Ok(pending) => pending,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn open(&self, actor: &Actor, continuation: Continuation) -> PendingInteraction {
        let interaction = PendingInteraction {
            token: InteractionToken::generate(),
            actor: actor.clone(),
            continuation,
            opened_at: Utc::now(),
        };
        self.pending().insert(interaction.token.clone(), interaction.clone());
        interaction
    }

    pub fn get(&self, token: &InteractionToken) -> Option<PendingInteraction> {
        self.pending().get(token).cloned()
    }

    /// Removes and returns the interaction when `choice` is one of its
    /// choices. An unknown choice leaves the interaction pending.
    pub fn claim(
        &self,
        token: &InteractionToken,
        actor: &Actor,
        choice: &str,
    ) -> Result<(PendingInteraction, Resolution), ActionError> {
        let mut pending = self.pending();
        let interaction = pending.get(token).ok_or_else(|| ActionError::NotFound {
            message: format!("interaction `{}` is not pending", token.0),
        })?;

        if interaction.actor.id != actor.id {
            return Err(ActionError::Unauthorized {
                message: format!("interaction `{}` belongs to another actor", token.0),
            });
        }

        let resolution = interaction.continuation.parse_choice(choice).ok_or_else(|| {
            ActionError::validation(
                "choice",
                format!(
                    "`{choice}` is not one of {}",
                    interaction.continuation.choices().join(", ")
                ),
            )
        })?;

        let interaction = pending.remove(token).ok_or_else(|| ActionError::NotFound {
            message: format!("interaction `{}` is not pending", token.0),
        })?;
        Ok((interaction, resolution))
    }

    pub fn abandon(&self, token: &InteractionToken) -> Option<PendingInteraction> {
        self.pending().remove(token)
    }

    pub fn len(&self) -> usize {
        self.pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use ledgerpilot_core::approvals::ApprovalDecision;
    use ledgerpilot_core::domain::{Actor, Role, Team, TransactionId};
    use ledgerpilot_core::errors::ErrorKind;
    use ledgerpilot_core::navigation::{build_redirect, Page, PageOperation};

    use super::{Continuation, InteractionTable, NavigationChoice, Resolution};

    fn admin() -> Actor {
        Actor::new("9g5h2j1k4l", Role::Admin, Team::Executive)
    }

    fn approval() -> Continuation {
        Continuation::Approval { transaction_id: TransactionId("t-3".to_string()) }
    }

    #[test]
    fn token_is_claimed_at_most_once() {
        let table = InteractionTable::default();
        let opened = table.open(&admin(), approval());

        let (claimed, resolution) = table.claim(&opened.token, &admin(), "approve").expect("claim");
        assert_eq!(claimed.token, opened.token);
        assert_eq!(resolution, Resolution::Approval(ApprovalDecision::Approve));

        let again = table.claim(&opened.token, &admin(), "deny").expect_err("already claimed");
        assert_eq!(again.kind(), ErrorKind::NotFound);
        assert!(table.is_empty());
    }

    #[test]
    fn unknown_choice_keeps_interaction_pending() {
        let table = InteractionTable::default();
        let opened = table.open(&admin(), approval());

        let error = table.claim(&opened.token, &admin(), "maybe").expect_err("bad choice");
        assert_eq!(error.kind(), ErrorKind::ValidationError);
        assert_eq!(table.len(), 1);
        assert!(table.claim(&opened.token, &admin(), "deny").is_ok());
    }

    #[test]
    fn another_actor_cannot_claim() {
        let table = InteractionTable::default();
        let opened = table.open(&admin(), approval());
        let stranger = Actor::new("1a2b3c4d5e", Role::Admin, Team::Marketing);

        let error = table.claim(&opened.token, &stranger, "approve").expect_err("foreign token");
        assert_eq!(error.kind(), ErrorKind::Unauthorized);
        assert!(table.get(&opened.token).is_some());
    }

    #[test]
    fn abandon_drops_the_continuation() {
        let table = InteractionTable::default();
        let redirect = build_redirect(Page::Cards, Some(PageOperation::ChangePin));
        let opened = table.open(&admin(), Continuation::Navigation { redirect });

        assert_eq!(opened.continuation.choices(), vec!["confirm", "cancel"]);
        assert!(table.abandon(&opened.token).is_some());
        assert!(table.abandon(&opened.token).is_none());
        assert_eq!(
            table.claim(&opened.token, &admin(), NavigationChoice::Confirm.as_str()).map(|_| ()),
            Err(ledgerpilot_core::errors::ActionError::NotFound {
                message: format!("interaction `{}` is not pending", opened.token.0)
            })
        );
    }
}
