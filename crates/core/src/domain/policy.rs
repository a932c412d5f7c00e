use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::member::Team;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyId(pub String);

/// Spend limit for one team. `spent` is maintained outside this system and is
/// never written by any action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpensePolicy {
    pub id: PolicyId,
    pub team: Team,
    pub limit: Decimal,
    pub spent: Decimal,
}

impl ExpensePolicy {
    pub fn remaining(&self) -> Decimal {
        self.limit - self.spent
    }
}
