use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::card::CardId;
use crate::domain::member::MemberId;
use crate::domain::policy::PolicyId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Denied,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionNote {
    pub content: String,
    pub author_id: MemberId,
    pub date: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub title: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub policy_id: PolicyId,
    pub card_id: CardId,
    pub status: TransactionStatus,
    pub note: Option<TransactionNote>,
}

impl Transaction {
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(
            (self.status, next),
            (TransactionStatus::Pending, TransactionStatus::Approved)
                | (TransactionStatus::Pending, TransactionStatus::Denied)
        )
    }

    pub fn transition_to(&mut self, next: TransactionStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidTransactionTransition { from: self.status, to: next })
    }

    /// Attaches `note`, replacing an earlier one. Independent of status.
    pub fn attach_note(&mut self, note: TransactionNote) {
        self.note = Some(note);
    }
}
