//! Transaction approval state machine.
//!
//! `pending` moves exactly once to `approved` or `denied`. An actor may
//! decide a transaction when their team owns the transaction's expense
//! policy, or when they hold the cross-team override (an Executive-team actor
//! whose role carries `APPROVE_ANY_TEAM`).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::{Actor, Team, Transaction, TransactionId, TransactionStatus};
use crate::errors::{ActionError, LedgerError};
use crate::ledger::Ledger;
use crate::permissions::{Permission, PermissionTable};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approve,
    Deny,
}

impl ApprovalDecision {
    pub const ALL: [ApprovalDecision; 2] = [ApprovalDecision::Approve, ApprovalDecision::Deny];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Deny => "deny",
        }
    }

    pub fn from_choice(choice: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|decision| decision.as_str() == choice.trim())
    }

    pub fn target_status(&self) -> TransactionStatus {
        match self {
            Self::Approve => TransactionStatus::Approved,
            Self::Deny => TransactionStatus::Denied,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ApprovalError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("transaction `{}` is already {}", .transaction_id.0, .status.as_str())]
    AlreadyDecided { transaction_id: TransactionId, status: TransactionStatus },
    #[error(
        "a {} team member cannot decide transactions charged to the {} policy",
        .actor_team.as_str(),
        .policy_team.as_str()
    )]
    OutsideTeam { actor_team: Team, policy_team: Team },
}

impl From<ApprovalError> for ActionError {
    fn from(value: ApprovalError) -> Self {
        match value {
            ApprovalError::Ledger(error) => ActionError::from(error),
            ApprovalError::AlreadyDecided { .. } => {
                ActionError::InvalidState { message: value.to_string() }
            }
            ApprovalError::OutsideTeam { .. } => {
                ActionError::Unauthorized { message: value.to_string() }
            }
        }
    }
}

pub struct ApprovalWorkflow {
    ledger: Arc<Ledger>,
    permissions: Arc<PermissionTable>,
    override_team: Team,
    sink: Arc<dyn AuditSink>,
}

impl ApprovalWorkflow {
    pub fn new(
        ledger: Arc<Ledger>,
        permissions: Arc<PermissionTable>,
        sink: Arc<dyn AuditSink>,
    ) -> Self {
        Self { ledger, permissions, override_team: Team::Executive, sink }
    }

    pub fn has_cross_team_override(&self, actor: &Actor) -> bool {
        actor.team == self.override_team
            && self.permissions.allows(Permission::ApproveAnyTeam, actor.role)
    }

    /// Read-only pre-check used before presenting a transaction for a
    /// decision: it must exist, be within the actor's authority and still be
    /// pending.
    pub async fn review(
        &self,
        transaction_id: &TransactionId,
        actor: &Actor,
    ) -> Result<Transaction, ApprovalError> {
        let transaction = self.ledger.transaction(transaction_id).await?;
        self.authorize(actor, &transaction).await?;
        if transaction.status.is_terminal() {
            return Err(ApprovalError::AlreadyDecided {
                transaction_id: transaction.id,
                status: transaction.status,
            });
        }
        Ok(transaction)
    }

    pub async fn approve(
        &self,
        transaction_id: &TransactionId,
        actor: &Actor,
        audit: &AuditContext,
    ) -> Result<Transaction, ApprovalError> {
        self.decide(transaction_id, actor, ApprovalDecision::Approve, audit).await
    }

    pub async fn deny(
        &self,
        transaction_id: &TransactionId,
        actor: &Actor,
        audit: &AuditContext,
    ) -> Result<Transaction, ApprovalError> {
        self.decide(transaction_id, actor, ApprovalDecision::Deny, audit).await
    }

    pub async fn decide(
        &self,
        transaction_id: &TransactionId,
        actor: &Actor,
        decision: ApprovalDecision,
        audit: &AuditContext,
    ) -> Result<Transaction, ApprovalError> {
        let result = self.apply(transaction_id, actor, decision).await;

        match &result {
            Ok(transaction) => {
                tracing::info!(
                    event_name = "approval.transition_applied",
                    correlation_id = %audit.correlation_id,
                    actor_id = %actor.id.0,
                    transaction_id = %transaction.id.0,
                    status = transaction.status.as_str(),
                    "transaction decided"
                );
                self.sink.emit(
                    AuditEvent::new(
                        audit,
                        "approval.transition_applied",
                        AuditCategory::Approval,
                        AuditOutcome::Success,
                    )
                    .with_metadata("transaction_id", transaction.id.0.clone())
                    .with_metadata("from", TransactionStatus::Pending.as_str())
                    .with_metadata("to", transaction.status.as_str()),
                );
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "approval.transition_rejected",
                    correlation_id = %audit.correlation_id,
                    actor_id = %actor.id.0,
                    transaction_id = %transaction_id.0,
                    decision = decision.as_str(),
                    error = %error,
                    "transaction decision rejected"
                );
                self.sink.emit(
                    AuditEvent::new(
                        audit,
                        "approval.transition_rejected",
                        AuditCategory::Approval,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("transaction_id", transaction_id.0.clone())
                    .with_metadata("decision", decision.as_str())
                    .with_metadata("error", error.to_string()),
                );
            }
        }

        result
    }

    async fn apply(
        &self,
        transaction_id: &TransactionId,
        actor: &Actor,
        decision: ApprovalDecision,
    ) -> Result<Transaction, ApprovalError> {
        let transaction = self.ledger.transaction(transaction_id).await?;
        self.authorize(actor, &transaction).await?;

        let target = decision.target_status();
        self.ledger
            .transactions()
            .update(&transaction_id.0, |record: &mut Transaction| {
                record.transition_to(target).map_err(|_| ApprovalError::AlreadyDecided {
                    transaction_id: record.id.clone(),
                    status: record.status,
                })?;
                Ok(record.clone())
            })
            .await
    }

    async fn authorize(
        &self,
        actor: &Actor,
        transaction: &Transaction,
    ) -> Result<(), ApprovalError> {
        let policy = self.ledger.policy(&transaction.policy_id).await?;
        if actor.team == policy.team || self.has_cross_team_override(actor) {
            return Ok(());
        }
        Err(ApprovalError::OutsideTeam { actor_team: actor.team, policy_team: policy.team })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{ApprovalDecision, ApprovalError, ApprovalWorkflow};
    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::domain::{
        Actor, CardId, PolicyId, Role, Team, Transaction, TransactionId, TransactionStatus,
    };
    use crate::errors::{ActionError, ErrorKind, LedgerError};
    use crate::ledger::{fixtures, Ledger, RecordKind};
    use crate::permissions::PermissionTable;

    struct Harness {
        ledger: Arc<Ledger>,
        sink: InMemoryAuditSink,
        workflow: ApprovalWorkflow,
    }

    fn harness() -> Harness {
        let ledger = Arc::new(Ledger::from_seed(fixtures::demo_seed()).expect("demo seed"));
        let sink = InMemoryAuditSink::default();
        let workflow = ApprovalWorkflow::new(
            Arc::clone(&ledger),
            Arc::new(PermissionTable::standard()),
            Arc::new(sink.clone()),
        );
        Harness { ledger, sink, workflow }
    }

    fn executive_admin() -> Actor {
        Actor::new(fixtures::EXECUTIVE_ADMIN_ID, Role::Admin, Team::Executive)
    }

    fn marketing_admin() -> Actor {
        Actor::new(fixtures::MARKETING_ADMIN_ID, Role::Admin, Team::Marketing)
    }

    fn audit() -> AuditContext {
        AuditContext::new("req-approval", "test")
    }

    fn t3() -> TransactionId {
        TransactionId("t-3".to_string())
    }

    async fn add_pending_marketing_transaction(ledger: &Ledger) -> TransactionId {
        let id = TransactionId("t-9".to_string());
        ledger
            .transactions()
            .insert(Transaction {
                id: id.clone(),
                title: "Ad campaign".to_string(),
                amount: Decimal::new(-12_000, 2),
                date: NaiveDate::from_ymd_opt(2025, 11, 12).unwrap_or_default(),
                policy_id: PolicyId(fixtures::MARKETING_POLICY_ID.to_string()),
                card_id: CardId(fixtures::MARKETING_CARD_ID.to_string()),
                status: TransactionStatus::Pending,
                note: None,
            })
            .await
            .expect("insert pending transaction");
        id
    }

    #[tokio::test]
    async fn same_team_actor_approves_then_reapproval_is_invalid_state() {
        let harness = harness();
        let approved =
            harness.workflow.approve(&t3(), &executive_admin(), &audit()).await.expect("approve");
        assert_eq!(approved.status, TransactionStatus::Approved);

        let error = harness
            .workflow
            .approve(&t3(), &executive_admin(), &audit())
            .await
            .expect_err("second approval must fail");
        assert_eq!(
            error,
            ApprovalError::AlreadyDecided {
                transaction_id: t3(),
                status: TransactionStatus::Approved,
            }
        );
        assert_eq!(ActionError::from(error).kind(), ErrorKind::InvalidState);

        let stored = harness.ledger.transaction(&t3()).await.expect("t-3");
        assert_eq!(stored.status, TransactionStatus::Approved);
    }

    #[tokio::test]
    async fn deny_on_terminal_transaction_leaves_status_unchanged() {
        let harness = harness();
        harness.workflow.deny(&t3(), &executive_admin(), &audit()).await.expect("deny");

        let error = harness
            .workflow
            .approve(&t3(), &executive_admin(), &audit())
            .await
            .expect_err("denied is terminal");
        assert!(matches!(error, ApprovalError::AlreadyDecided { .. }));
        let stored = harness.ledger.transaction(&t3()).await.expect("t-3");
        assert_eq!(stored.status, TransactionStatus::Denied);
    }

    #[tokio::test]
    async fn other_team_without_override_is_unauthorized() {
        let harness = harness();
        let error = harness
            .workflow
            .approve(&t3(), &marketing_admin(), &audit())
            .await
            .expect_err("marketing admin lacks executive authority");

        assert_eq!(
            error,
            ApprovalError::OutsideTeam { actor_team: Team::Marketing, policy_team: Team::Executive }
        );
        assert_eq!(ActionError::from(error).kind(), ErrorKind::Unauthorized);
        let stored = harness.ledger.transaction(&t3()).await.expect("t-3");
        assert_eq!(stored.status, TransactionStatus::Pending);
    }

    #[tokio::test]
    async fn executive_admin_override_applies_across_teams() {
        let harness = harness();
        let id = add_pending_marketing_transaction(&harness.ledger).await;

        assert!(harness.workflow.has_cross_team_override(&executive_admin()));
        assert!(!harness.workflow.has_cross_team_override(&marketing_admin()));

        let decided = harness
            .workflow
            .decide(&id, &executive_admin(), ApprovalDecision::Deny, &audit())
            .await
            .expect("override decides marketing transaction");
        assert_eq!(decided.status, TransactionStatus::Denied);
    }

    #[tokio::test]
    async fn executive_member_without_override_permission_is_scoped_to_team() {
        let harness = harness();
        let id = add_pending_marketing_transaction(&harness.ledger).await;
        let executive_member = Actor::new("m-exec", Role::Member, Team::Executive);

        let error = harness
            .workflow
            .approve(&id, &executive_member, &audit())
            .await
            .expect_err("member role holds no override");
        assert!(matches!(error, ApprovalError::OutsideTeam { .. }));
    }

    #[tokio::test]
    async fn unknown_transaction_is_not_found() {
        let harness = harness();
        let missing = TransactionId("t-404".to_string());
        let error = harness
            .workflow
            .approve(&missing, &executive_admin(), &audit())
            .await
            .expect_err("unknown id");

        assert_eq!(
            error,
            ApprovalError::Ledger(LedgerError::NotFound {
                kind: RecordKind::Transaction,
                id: "t-404".into()
            })
        );
        assert_eq!(ActionError::from(error).kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn review_rejects_decided_transactions_without_mutation() {
        let harness = harness();
        let before = harness.ledger.snapshot().await;
        let error = harness
            .workflow
            .review(&TransactionId("t-1".to_string()), &marketing_admin())
            .await
            .expect_err("t-1 already approved");

        assert!(matches!(error, ApprovalError::AlreadyDecided { .. }));
        assert_eq!(harness.ledger.snapshot().await, before);
        assert!(harness.workflow.review(&t3(), &executive_admin()).await.is_ok());
    }

    #[tokio::test]
    async fn decisions_emit_audit_events() {
        let harness = harness();
        let _ = harness.workflow.approve(&t3(), &marketing_admin(), &audit()).await;
        harness.workflow.approve(&t3(), &executive_admin(), &audit()).await.expect("approve");

        assert_eq!(harness.sink.events_of_type("approval.transition_rejected").len(), 1);
        let applied = harness.sink.events_of_type("approval.transition_applied");
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].metadata.get("to").map(String::as_str), Some("approved"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_approve_and_deny_settle_exactly_once() {
        for _ in 0..16 {
            let Harness { ledger, sink, workflow } = harness();
            let workflow = Arc::new(workflow);

            let approving = Arc::clone(&workflow);
            let approve = tokio::spawn(async move {
                approving.approve(&t3(), &executive_admin(), &audit()).await
            });
            let denying = Arc::clone(&workflow);
            let deny = tokio::spawn(async move {
                denying.deny(&t3(), &executive_admin(), &audit()).await
            });

            let approve = approve.await.expect("approve task joined");
            let deny = deny.await.expect("deny task joined");

            let (winner, loser) = match (approve, deny) {
                (Ok(winner), Err(loser)) | (Err(loser), Ok(winner)) => (winner, loser),
                (approve, deny) => panic!("expected one winner, got {approve:?} and {deny:?}"),
            };
            assert_eq!(ActionError::from(loser).kind(), ErrorKind::InvalidState);

            let stored = ledger.transaction(&t3()).await.expect("t-3");
            assert_eq!(stored.status, winner.status);
            assert!(stored.status.is_terminal());
            assert_eq!(sink.events_of_type("approval.transition_applied").len(), 1);
            assert_eq!(sink.events_of_type("approval.transition_rejected").len(), 1);
        }
    }

    #[test]
    fn decision_choices_map_to_terminal_statuses() {
        assert_eq!(ApprovalDecision::from_choice("approve"), Some(ApprovalDecision::Approve));
        assert_eq!(ApprovalDecision::from_choice("maybe"), None);
        assert_eq!(ApprovalDecision::Deny.target_status(), TransactionStatus::Denied);
    }
}
