//! Single entry point for agent-invoked actions.
//!
//! Every invocation runs the same pipeline: catalog lookup, permission gate,
//! schema validation, typed decode, handler. Permission is checked before any
//! argument is looked at, so a refused call never reveals whether its
//! arguments would have been valid. `renderAndWait` actions return a token;
//! [`Dispatcher::resolve`] completes them after re-running the gate.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Months, NaiveDate, Utc};
use ledgerpilot_core::approvals::ApprovalWorkflow;
use ledgerpilot_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use ledgerpilot_core::config::DispatchConfig;
use ledgerpilot_core::domain::card::validate_pin;
use ledgerpilot_core::domain::{
    Actor, Card, CardBrand, CardId, MemberId, Team, Transaction, TransactionId, TransactionNote,
};
use ledgerpilot_core::errors::ActionError;
use ledgerpilot_core::ledger::Ledger;
use ledgerpilot_core::navigation::{build_redirect, NavigationBroker, Page, PageOperation};
use ledgerpilot_core::permissions::PermissionTable;
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::args::{validate_args, ActionRequest, TransactionFilter};
use crate::catalog::{ActionCatalog, ActionDefinition, ActionDescriptor, ActionKind, CatalogError};
use crate::context::ReadableContext;
use crate::interactions::{
    Continuation, InteractionTable, InteractionToken, NavigationChoice, PendingInteraction,
    Resolution,
};
use crate::views::{DeferredView, DeferredViews, ViewState};

const CARD_TERM_MONTHS: u32 = 36;
const CARD_ID_LENGTH: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchSettings {
    pub render_latency: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self { render_latency: Duration::from_millis(3000) }
    }
}

impl From<&DispatchConfig> for DispatchSettings {
    fn from(config: &DispatchConfig) -> Self {
        Self { render_latency: Duration::from_millis(config.render_latency_ms) }
    }
}

/// What an invocation hands back to the agent.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Completed {
        action: ActionKind,
        result: Value,
    },
    Deferred {
        action: ActionKind,
        view: ViewState,
        #[serde(skip)]
        handle: DeferredView,
    },
    AwaitingDecision {
        action: ActionKind,
        token: InteractionToken,
        view: Value,
        choices: Vec<&'static str>,
    },
}

impl Outcome {
    pub fn action(&self) -> ActionKind {
        match self {
            Self::Completed { action, .. }
            | Self::Deferred { action, .. }
            | Self::AwaitingDecision { action, .. } => *action,
        }
    }

    fn event_name(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "agent.dispatch.completed",
            Self::Deferred { .. } => "agent.dispatch.deferred",
            Self::AwaitingDecision { .. } => "agent.dispatch.awaiting_decision",
        }
    }
}

pub struct Dispatcher {
    catalog: ActionCatalog,
    permissions: Arc<PermissionTable>,
    ledger: Arc<Ledger>,
    approvals: ApprovalWorkflow,
    navigation: Arc<NavigationBroker>,
    interactions: InteractionTable,
    views: DeferredViews,
    sink: Arc<dyn AuditSink>,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(
        catalog: ActionCatalog,
        permissions: PermissionTable,
        ledger: Arc<Ledger>,
        navigation: Arc<NavigationBroker>,
        sink: Arc<dyn AuditSink>,
    ) -> Self {
        let permissions = Arc::new(permissions);
        let approvals =
            ApprovalWorkflow::new(Arc::clone(&ledger), Arc::clone(&permissions), Arc::clone(&sink));
        Self {
            catalog,
            permissions,
            ledger,
            approvals,
            navigation,
            interactions: InteractionTable::default(),
            views: DeferredViews::default(),
            sink,
            settings: DispatchSettings::default(),
        }
    }

    /// Dispatcher over the built-in catalog and permission table.
    pub fn standard(
        ledger: Arc<Ledger>,
        navigation: Arc<NavigationBroker>,
        sink: Arc<dyn AuditSink>,
    ) -> Result<Self, CatalogError> {
        Ok(Self::new(
            ActionCatalog::standard()?,
            PermissionTable::standard(),
            ledger,
            navigation,
            sink,
        ))
    }

    pub fn with_settings(mut self, settings: DispatchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    pub fn permissions(&self) -> &PermissionTable {
        &self.permissions
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn navigation(&self) -> &NavigationBroker {
        &self.navigation
    }

    /// Resolves a member id to the acting identity.
    pub async fn actor(&self, member_id: &str) -> Result<Actor, ActionError> {
        let member = self.ledger.member(&MemberId(member_id.to_string())).await?;
        Ok(Actor::from(&member))
    }

    pub fn discover(&self, actor: &Actor) -> Vec<ActionDescriptor> {
        self.catalog.descriptors(actor.role, &self.permissions)
    }

    pub async fn context(&self, actor: &Actor) -> ReadableContext {
        let name = self.ledger.member(&actor.id).await.ok().map(|member| member.name);
        ReadableContext::build(actor, name, &self.permissions, &self.navigation)
    }

    pub fn view(&self, action: &str) -> Option<ViewState> {
        self.views.current(action)
    }

    pub fn subscribe(&self, action: &str) -> Option<DeferredView> {
        self.views.subscribe(action)
    }

    pub fn pending_interaction(&self, token: &InteractionToken) -> Option<PendingInteraction> {
        self.interactions.get(token)
    }

    pub fn open_interactions(&self) -> usize {
        self.interactions.len()
    }

    pub async fn invoke(
        &self,
        actor: &Actor,
        name: &str,
        raw_args: &Value,
    ) -> Result<Outcome, ActionError> {
        let audit = AuditContext::for_actor(actor);
        let result = self.dispatch(actor, name, raw_args, &audit).await;

        match &result {
            Ok(outcome) => {
                let event_name = outcome.event_name();
                tracing::info!(
                    event_name,
                    correlation_id = %audit.correlation_id,
                    actor_id = %actor.id.0,
                    action = name,
                    "action dispatched"
                );
                self.sink.emit(
                    AuditEvent::new(
                        &audit,
                        event_name,
                        AuditCategory::Dispatch,
                        AuditOutcome::Success,
                    )
                    .with_metadata("action", name),
                );
            }
            Err(error) => self.record_rejection(&audit, actor, name, error),
        }

        result
    }

    /// Completes a pending interaction with one of its choices. The gate for
    /// the originating action runs again first; a refused resolve leaves the
    /// interaction pending.
    pub async fn resolve(
        &self,
        actor: &Actor,
        token: &InteractionToken,
        choice: &str,
    ) -> Result<Value, ActionError> {
        let audit = AuditContext::for_actor(actor);
        let result = self.settle_interaction(actor, token, choice, &audit).await;

        match &result {
            Ok(_) => {
                tracing::info!(
                    event_name = "agent.interaction.resolved",
                    correlation_id = %audit.correlation_id,
                    actor_id = %actor.id.0,
                    token = %token.0,
                    choice,
                    "interaction resolved"
                );
                self.sink.emit(
                    AuditEvent::new(
                        &audit,
                        "agent.interaction.resolved",
                        AuditCategory::Interaction,
                        AuditOutcome::Success,
                    )
                    .with_metadata("token", token.0.clone())
                    .with_metadata("choice", choice),
                );
            }
            Err(error) => self.record_rejection(&audit, actor, "resolve", error),
        }

        result
    }

    /// Drops a pending interaction without acting on it. Only the actor that
    /// opened it may abandon it.
    pub fn abandon(&self, actor: &Actor, token: &InteractionToken) -> bool {
        let owned = self
            .interactions
            .get(token)
            .is_some_and(|interaction| interaction.actor.id == actor.id);
        if !owned || self.interactions.abandon(token).is_none() {
            return false;
        }

        let audit = AuditContext::for_actor(actor);
        tracing::info!(
            event_name = "agent.interaction.abandoned",
            correlation_id = %audit.correlation_id,
            actor_id = %actor.id.0,
            token = %token.0,
            "interaction abandoned"
        );
        self.sink.emit(
            AuditEvent::new(
                &audit,
                "agent.interaction.abandoned",
                AuditCategory::Interaction,
                AuditOutcome::Success,
            )
            .with_metadata("token", token.0.clone()),
        );
        true
    }

    fn authorize(&self, actor: &Actor, definition: &ActionDefinition) -> Result<(), ActionError> {
        if self.permissions.allows(definition.permission, actor.role) {
            return Ok(());
        }
        Err(ActionError::PermissionDenied {
            action: definition.name().to_string(),
            permission: definition.permission,
        })
    }

    fn record_rejection(
        &self,
        audit: &AuditContext,
        actor: &Actor,
        name: &str,
        error: &ActionError,
    ) {
        let kind = error.kind();
        let event_name = format!("agent.dispatch.{}", kind.as_str());
        tracing::warn!(
            event_name = %event_name,
            correlation_id = %audit.correlation_id,
            actor_id = %actor.id.0,
            action = name,
            error_kind = kind.as_str(),
            error = %error,
            "action rejected"
        );
        self.sink.emit(
            AuditEvent::new(audit, event_name, AuditCategory::Dispatch, AuditOutcome::Rejected)
                .with_metadata("action", name)
                .with_metadata("error_kind", kind.as_str()),
        );
    }

    async fn dispatch(
        &self,
        actor: &Actor,
        name: &str,
        raw_args: &Value,
        audit: &AuditContext,
    ) -> Result<Outcome, ActionError> {
        let definition = self.catalog.get(name)?;
        self.authorize(actor, definition)?;
        let args = validate_args(definition, raw_args)?;
        let request = ActionRequest::decode(definition.kind, &args)?;
        let action = definition.kind;

        match request {
            ActionRequest::AddNewCard { brand, color, pin } => {
                let result = self.add_new_card(brand, color, &pin).await?;
                Ok(Outcome::Completed { action, result })
            }
            ActionRequest::AssignPolicyToCard { card_id, policy_type } => {
                let result = self.assign_policy_to_card(&card_id, policy_type).await?;
                Ok(Outcome::Completed { action, result })
            }
            ActionRequest::AddNoteToTransaction { transaction_id, content } => {
                let result = self.add_note(actor, &transaction_id, content).await?;
                Ok(Outcome::Completed { action, result })
            }
            ActionRequest::SetCardPin { card_id, pin } => {
                let result = self.set_card_pin(&card_id, &pin).await?;
                Ok(Outcome::Completed { action, result })
            }
            ActionRequest::ShowTransactions(filter) => {
                self.show_transactions(action, filter, args.identity(), audit)
            }
            ActionRequest::ShowAndApproveTransactions { transaction_id } => {
                self.present_for_approval(action, actor, transaction_id).await
            }
            ActionRequest::NavigateToPageAndPerform { page, operation, operation_available } => {
                Ok(self.offer_navigation(action, actor, page, operation, operation_available))
            }
        }
    }

    async fn add_new_card(
        &self,
        brand: CardBrand,
        color: Option<String>,
        pin: &str,
    ) -> Result<Value, ActionError> {
        validate_pin(pin)?;
        let card = Card {
            id: CardId(new_card_id()),
            last4: random_last4(),
            expiry: expiry_from(Utc::now().date_naive()),
            brand,
            color_token: color.unwrap_or_else(|| brand.color_token().to_string()),
            pin: pin.to_string(),
            policy_id: None,
        };
        self.ledger.cards().insert(card.clone()).await?;
        Ok(card_view(&card))
    }

    async fn assign_policy_to_card(
        &self,
        card_id: &CardId,
        team: Team,
    ) -> Result<Value, ActionError> {
        self.ledger.card(card_id).await?;
        let policy = self.ledger.policy_for_team(team).await.ok_or_else(|| {
            ActionError::business_rule(format!(
                "no {} expense policy exists to assign",
                team.as_str()
            ))
        })?;

        let previous = self
            .ledger
            .cards()
            .update(&card_id.0, |card| Ok::<_, ActionError>(card.assign_policy(policy.id.clone())))
            .await?;

        Ok(json!({
            "cardId": card_id.0,
            "policyId": policy.id.0,
            "team": policy.team.as_str(),
            "previousPolicyId": previous.map(|id| id.0),
            "limit": policy.limit.to_string(),
            "remaining": policy.remaining().to_string(),
        }))
    }

    async fn add_note(
        &self,
        actor: &Actor,
        transaction_id: &TransactionId,
        content: String,
    ) -> Result<Value, ActionError> {
        let note =
            TransactionNote { content, author_id: actor.id.clone(), date: Utc::now().date_naive() };
        let transaction = self
            .ledger
            .transactions()
            .update(&transaction_id.0, |transaction| {
                transaction.attach_note(note);
                Ok::<_, ActionError>(transaction.clone())
            })
            .await?;

        Ok(json!({
            "transactionId": transaction.id.0,
            "status": transaction.status.as_str(),
            "note": transaction.note,
        }))
    }

    async fn set_card_pin(&self, card_id: &CardId, pin: &str) -> Result<Value, ActionError> {
        validate_pin(pin)?;
        let card = self
            .ledger
            .cards()
            .update(&card_id.0, |card| {
                card.change_pin(pin)?;
                Ok::<_, ActionError>(card.clone())
            })
            .await?;

        Ok(json!({ "cardId": card.id.0, "last4": card.last4, "pinUpdated": true }))
    }

    fn show_transactions(
        &self,
        action: ActionKind,
        filter: TransactionFilter,
        identity: Value,
        audit: &AuditContext,
    ) -> Result<Outcome, ActionError> {
        if filter.is_empty() {
            return Err(ActionError::business_rule(
                "showTransactions needs one of card4Digits, policyId or transactionTitle",
            ));
        }

        let (ticket, handle) = self.views.begin(action.name(), identity);
        let ledger = Arc::clone(&self.ledger);
        let latency = self.settings.render_latency;
        let sink = Arc::clone(&self.sink);
        let audit = audit.clone();
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            let rendered = filter_transactions(&ledger, &filter).await;
            if let Err(message) = &rendered {
                tracing::warn!(
                    event_name = "agent.view.failed",
                    correlation_id = %audit.correlation_id,
                    view = action.name(),
                    error = %message,
                    "deferred render failed"
                );
                sink.emit(
                    AuditEvent::new(
                        &audit,
                        "agent.view.failed",
                        AuditCategory::Dispatch,
                        AuditOutcome::Failed,
                    )
                    .with_metadata("action", action.name())
                    .with_metadata("error", message.as_str()),
                );
            }
            ticket.settle(rendered);
        });

        Ok(Outcome::Deferred { action, view: handle.current(), handle })
    }

    async fn present_for_approval(
        &self,
        action: ActionKind,
        actor: &Actor,
        transaction_id: TransactionId,
    ) -> Result<Outcome, ActionError> {
        let transaction = self.approvals.review(&transaction_id, actor).await?;
        let interaction = self.interactions.open(actor, Continuation::Approval { transaction_id });

        Ok(Outcome::AwaitingDecision {
            action,
            choices: interaction.continuation.choices(),
            token: interaction.token,
            view: json!({ "transaction": transaction }),
        })
    }

    fn offer_navigation(
        &self,
        action: ActionKind,
        actor: &Actor,
        page: Page,
        operation: Option<String>,
        operation_available: bool,
    ) -> Outcome {
        let requested = operation
            .as_deref()
            .filter(|_| operation_available)
            .and_then(PageOperation::from_code)
            .filter(|operation| page.offers(*operation));
        if operation.is_some() && requested.is_none() {
            tracing::debug!(
                event_name = "agent.navigation.operation_dropped",
                page = page.path(),
                operation = operation.as_deref().unwrap_or_default(),
                operation_available,
                "redirect carries no operation"
            );
        }

        let redirect = build_redirect(page, requested);
        let view = json!({
            "prompt": format!("Navigate to {}?", page.path()),
            "page": page.path(),
            "operation": redirect.operation_code(),
            "path": redirect.to_path(),
        });
        let interaction = self.interactions.open(actor, Continuation::Navigation { redirect });

        Outcome::AwaitingDecision {
            action,
            choices: interaction.continuation.choices(),
            token: interaction.token,
            view,
        }
    }

    async fn settle_interaction(
        &self,
        actor: &Actor,
        token: &InteractionToken,
        choice: &str,
        audit: &AuditContext,
    ) -> Result<Value, ActionError> {
        if let Some(pending) = self.interactions.get(token) {
            let definition = self.catalog.get(pending.continuation.action().name())?;
            self.authorize(actor, definition)?;
        }

        let (interaction, resolution) = self.interactions.claim(token, actor, choice)?;
        match (interaction.continuation, resolution) {
            (Continuation::Approval { transaction_id }, Resolution::Approval(decision)) => {
                let transaction =
                    self.approvals.decide(&transaction_id, actor, decision, audit).await?;
                Ok(json!({
                    "transactionId": transaction.id.0,
                    "status": transaction.status.as_str(),
                }))
            }
            (Continuation::Navigation { redirect }, Resolution::Navigation(choice)) => {
                match choice {
                    NavigationChoice::Confirm => {
                        let path = self.navigation.stage(redirect);
                        self.sink.emit(
                            AuditEvent::new(
                                audit,
                                "agent.navigation.staged",
                                AuditCategory::Navigation,
                                AuditOutcome::Success,
                            )
                            .with_metadata("target", path.as_str()),
                        );
                        Ok(json!({
                            "navigateTo": path,
                            "page": redirect.page().path(),
                            "operation": redirect.operation_code(),
                        }))
                    }
                    NavigationChoice::Cancel => Ok(json!({ "cancelled": true })),
                }
            }
            _ => Err(ActionError::InvalidState {
                message: format!("choice `{choice}` does not fit interaction `{}`", token.0),
            }),
        }
    }
}

async fn filter_transactions(ledger: &Ledger, filter: &TransactionFilter) -> Result<Value, String> {
    let transactions = ledger.transactions().list().await;

    let rows: Vec<Transaction> = if let Some(last4) = &filter.card_last4 {
        let cards = ledger.cards().list().await;
        let card = cards
            .iter()
            .find(|card| &card.last4 == last4)
            .ok_or_else(|| format!("no card ending in {last4}"))?;
        transactions.into_iter().filter(|transaction| transaction.card_id == card.id).collect()
    } else if let Some(policy_id) = &filter.policy_id {
        ledger.policy(policy_id).await.map_err(|error| error.to_string())?;
        transactions.into_iter().filter(|transaction| &transaction.policy_id == policy_id).collect()
    } else if let Some(title) = &filter.title {
        let needle = title.to_lowercase();
        transactions
            .into_iter()
            .filter(|transaction| transaction.title.to_lowercase().contains(&needle))
            .collect()
    } else {
        transactions
    };

    Ok(json!({ "count": rows.len(), "transactions": rows }))
}

fn card_view(card: &Card) -> Value {
    json!({
        "id": card.id.0,
        "last4": card.last4,
        "expiry": card.expiry,
        "brand": card.brand.as_str(),
        "colorToken": card.color_token,
        "policyId": card.policy_id.as_ref().map(|id| id.0.clone()),
    })
}

fn new_card_id() -> String {
    Uuid::new_v4().simple().to_string().chars().take(CARD_ID_LENGTH).collect()
}

fn random_last4() -> String {
    format!("{:04}", rand::thread_rng().gen_range(0..10_000))
}

fn expiry_from(issued: NaiveDate) -> String {
    issued
        .checked_add_months(Months::new(CARD_TERM_MONTHS))
        .unwrap_or(issued)
        .format("%m/%y")
        .to_string()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{expiry_from, new_card_id, random_last4};

    #[test]
    fn expiry_is_three_years_out() {
        let issued = NaiveDate::from_ymd_opt(2025, 11, 14).unwrap_or_default();
        assert_eq!(expiry_from(issued), "11/28");
    }

    #[test]
    fn generated_card_fields_have_fixed_shape() {
        let last4 = random_last4();
        assert_eq!(last4.len(), 4);
        assert!(last4.chars().all(|ch| ch.is_ascii_digit()));
        assert_eq!(new_card_id().len(), 10);
        assert_ne!(new_card_id(), new_card_id());
    }
}
