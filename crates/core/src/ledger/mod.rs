//! In-memory record store for members, cards, expense policies and
//! transactions.
//!
//! Each collection keeps an insertion-ordered index behind an `RwLock` and
//! every record behind its own `Mutex`, so all writes to one record id are
//! linearized while writes to different ids proceed independently. An update
//! runs against a working copy and is committed only when the mutation
//! succeeds.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::domain::{
    Card, CardId, ExpensePolicy, Member, MemberId, PolicyId, Team, Transaction, TransactionId,
};
use crate::errors::LedgerError;

pub mod fixtures;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Member,
    Card,
    ExpensePolicy,
    Transaction,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Member => "member",
            Self::Card => "card",
            Self::ExpensePolicy => "expense policy",
            Self::Transaction => "transaction",
        };
        f.write_str(label)
    }
}

pub trait Record: Clone + Send + Sync + 'static {
    const KIND: RecordKind;

    fn record_id(&self) -> &str;
}

impl Record for Member {
    const KIND: RecordKind = RecordKind::Member;

    fn record_id(&self) -> &str {
        &self.id.0
    }
}

impl Record for Card {
    const KIND: RecordKind = RecordKind::Card;

    fn record_id(&self) -> &str {
        &self.id.0
    }
}

impl Record for ExpensePolicy {
    const KIND: RecordKind = RecordKind::ExpensePolicy;

    fn record_id(&self) -> &str {
        &self.id.0
    }
}

impl Record for Transaction {
    const KIND: RecordKind = RecordKind::Transaction;

    fn record_id(&self) -> &str {
        &self.id.0
    }
}

struct Slots<T> {
    order: Vec<String>,
    by_id: HashMap<String, Arc<Mutex<T>>>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self { order: Vec::new(), by_id: HashMap::new() }
    }
}

impl<T: Record> Slots<T> {
    fn push(&mut self, record: T) -> Result<(), LedgerError> {
        let id = record.record_id().to_string();
        if self.by_id.contains_key(&id) {
            return Err(LedgerError::DuplicateId { kind: T::KIND, id });
        }
        self.order.push(id.clone());
        self.by_id.insert(id, Arc::new(Mutex::new(record)));
        Ok(())
    }
}

pub struct RecordStore<T> {
    slots: RwLock<Slots<T>>,
}

impl<T> Default for RecordStore<T> {
    fn default() -> Self {
        Self { slots: RwLock::new(Slots::default()) }
    }
}

impl<T: Record> RecordStore<T> {
    pub fn from_records(records: impl IntoIterator<Item = T>) -> Result<Self, LedgerError> {
        let mut slots = Slots::default();
        for record in records {
            slots.push(record)?;
        }
        Ok(Self { slots: RwLock::new(slots) })
    }

    async fn slot(&self, id: &str) -> Option<Arc<Mutex<T>>> {
        let slots = self.slots.read().await;
        slots.by_id.get(id).cloned()
    }

    pub async fn find(&self, id: &str) -> Option<T> {
        let slot = self.slot(id).await?;
        let record = slot.lock().await;
        Some(record.clone())
    }

    pub async fn get(&self, id: &str) -> Result<T, LedgerError> {
        self.find(id).await.ok_or_else(|| LedgerError::NotFound { kind: T::KIND, id: id.into() })
    }

    /// Records in insertion order.
    pub async fn list(&self) -> Vec<T> {
        let slots: Vec<Arc<Mutex<T>>> = {
            let guard = self.slots.read().await;
            guard.order.iter().filter_map(|id| guard.by_id.get(id).cloned()).collect()
        };

        let mut records = Vec::with_capacity(slots.len());
        for slot in slots {
            records.push(slot.lock().await.clone());
        }
        records
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn insert(&self, record: T) -> Result<(), LedgerError> {
        self.slots.write().await.push(record)
    }

    /// Read-modify-write of one record under its lock. `apply` sees a working
    /// copy; the copy replaces the stored record only if `apply` succeeds.
    pub async fn update<F, R, E>(&self, id: &str, apply: F) -> Result<R, E>
    where
        F: FnOnce(&mut T) -> Result<R, E>,
        E: From<LedgerError>,
    {
        let slot = self
            .slot(id)
            .await
            .ok_or_else(|| LedgerError::NotFound { kind: T::KIND, id: id.into() })?;

        let mut stored = slot.lock().await;
        let mut working = stored.clone();
        let output = apply(&mut working)?;
        *stored = working;
        Ok(output)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSeed {
    pub members: Vec<Member>,
    pub cards: Vec<Card>,
    pub policies: Vec<ExpensePolicy>,
    pub transactions: Vec<Transaction>,
}

/// Point-in-time copy of every collection, used for inspection and for
/// before/after comparisons.
pub type LedgerSnapshot = LedgerSeed;

#[derive(Default)]
pub struct Ledger {
    members: RecordStore<Member>,
    cards: RecordStore<Card>,
    policies: RecordStore<ExpensePolicy>,
    transactions: RecordStore<Transaction>,
}

impl Ledger {
    pub fn from_seed(seed: LedgerSeed) -> Result<Self, LedgerError> {
        Ok(Self {
            members: RecordStore::from_records(seed.members)?,
            cards: RecordStore::from_records(seed.cards)?,
            policies: RecordStore::from_records(seed.policies)?,
            transactions: RecordStore::from_records(seed.transactions)?,
        })
    }

    pub fn members(&self) -> &RecordStore<Member> {
        &self.members
    }

    pub fn cards(&self) -> &RecordStore<Card> {
        &self.cards
    }

    pub fn policies(&self) -> &RecordStore<ExpensePolicy> {
        &self.policies
    }

    pub fn transactions(&self) -> &RecordStore<Transaction> {
        &self.transactions
    }

    pub async fn member(&self, id: &MemberId) -> Result<Member, LedgerError> {
        self.members.get(&id.0).await
    }

    pub async fn card(&self, id: &CardId) -> Result<Card, LedgerError> {
        self.cards.get(&id.0).await
    }

    pub async fn policy(&self, id: &PolicyId) -> Result<ExpensePolicy, LedgerError> {
        self.policies.get(&id.0).await
    }

    pub async fn transaction(&self, id: &TransactionId) -> Result<Transaction, LedgerError> {
        self.transactions.get(&id.0).await
    }

    /// First policy registered for `team`, if any.
    pub async fn policy_for_team(&self, team: Team) -> Option<ExpensePolicy> {
        self.policies.list().await.into_iter().find(|policy| policy.team == team)
    }

    pub async fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            members: self.members.list().await,
            cards: self.cards.list().await,
            policies: self.policies.list().await,
            transactions: self.transactions.list().await,
        }
    }
}
