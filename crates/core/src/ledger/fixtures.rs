use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::{
    Card, CardBrand, CardId, ExpensePolicy, Member, MemberId, PolicyId, Role, Team, Transaction,
    TransactionId, TransactionStatus,
};
use crate::ledger::LedgerSeed;

pub const EXECUTIVE_ADMIN_ID: &str = "9g5h2j1k4l";
pub const MARKETING_ADMIN_ID: &str = "1a2b3c4d5e";
pub const ENGINEERING_MEMBER_ID: &str = "2b3c4d5e6f";

pub const MARKETING_POLICY_ID: &str = "7f3b3c4d5e";
pub const EXECUTIVE_POLICY_ID: &str = "8r5c3m4n5o";
pub const ENGINEERING_POLICY_ID: &str = "9a8b7c6d5e";

pub const EXECUTIVE_CARD_ID: &str = "5tf3rmlcyg3";
pub const MARKETING_CARD_ID: &str = "wr197z5ilg";
pub const ENGINEERING_CARD_ID: &str = "fA5b7c6d5e";

struct MemberFixture {
    id: &'static str,
    name: &'static str,
    email: &'static str,
    role: Role,
    team: Team,
}

struct CardFixture {
    id: &'static str,
    last4: &'static str,
    expiry: &'static str,
    brand: CardBrand,
    pin: &'static str,
    policy_id: &'static str,
}

struct PolicyFixture {
    id: &'static str,
    team: Team,
    limit: i64,
    spent: i64,
}

struct TransactionFixture {
    id: &'static str,
    title: &'static str,
    amount_cents: i64,
    date: (i32, u32, u32),
    policy_id: &'static str,
    card_id: &'static str,
    status: TransactionStatus,
}

const MEMBERS: &[MemberFixture] = &[
    MemberFixture {
        id: EXECUTIVE_ADMIN_ID,
        name: "Felipe Nemo",
        email: "felipe.nemo@banco.example",
        role: Role::Admin,
        team: Team::Executive,
    },
    MemberFixture {
        id: MARKETING_ADMIN_ID,
        name: "Ana Souza",
        email: "ana.souza@banco.example",
        role: Role::Admin,
        team: Team::Marketing,
    },
    MemberFixture {
        id: ENGINEERING_MEMBER_ID,
        name: "Lucas Oliveira",
        email: "lucas.oliveira@banco.example",
        role: Role::Member,
        team: Team::Engineering,
    },
];

const CARDS: &[CardFixture] = &[
    CardFixture {
        id: EXECUTIVE_CARD_ID,
        last4: "4242",
        expiry: "12/26",
        brand: CardBrand::Visa,
        pin: "1234",
        policy_id: EXECUTIVE_POLICY_ID,
    },
    CardFixture {
        id: MARKETING_CARD_ID,
        last4: "1234",
        expiry: "10/25",
        brand: CardBrand::MasterCard,
        pin: "5678",
        policy_id: MARKETING_POLICY_ID,
    },
    CardFixture {
        id: ENGINEERING_CARD_ID,
        last4: "5555",
        expiry: "01/27",
        brand: CardBrand::Visa,
        pin: "9101",
        policy_id: ENGINEERING_POLICY_ID,
    },
];

const POLICIES: &[PolicyFixture] = &[
    PolicyFixture { id: MARKETING_POLICY_ID, team: Team::Marketing, limit: 1000, spent: 315 },
    PolicyFixture { id: EXECUTIVE_POLICY_ID, team: Team::Executive, limit: 1500, spent: 390 },
    PolicyFixture { id: ENGINEERING_POLICY_ID, team: Team::Engineering, limit: 2000, spent: 345 },
];

const TRANSACTIONS: &[TransactionFixture] = &[
    TransactionFixture {
        id: "t-1",
        title: "Railway App",
        amount_cents: -31_500,
        date: (2025, 11, 1),
        policy_id: MARKETING_POLICY_ID,
        card_id: MARKETING_CARD_ID,
        status: TransactionStatus::Approved,
    },
    TransactionFixture {
        id: "t-2",
        title: "Magalu Cloud",
        amount_cents: -34_550,
        date: (2025, 11, 5),
        policy_id: ENGINEERING_POLICY_ID,
        card_id: ENGINEERING_CARD_ID,
        status: TransactionStatus::Approved,
    },
    TransactionFixture {
        id: "t-3",
        title: "Railway Database",
        amount_cents: -39_000,
        date: (2025, 11, 10),
        policy_id: EXECUTIVE_POLICY_ID,
        card_id: EXECUTIVE_CARD_ID,
        status: TransactionStatus::Pending,
    },
];

/// Deterministic demo ledger: three members, cards, policies and
/// transactions, with `t-3` pending on the Executive policy.
pub fn demo_seed() -> LedgerSeed {
    LedgerSeed {
        members: MEMBERS
            .iter()
            .map(|fixture| Member {
                id: MemberId(fixture.id.to_string()),
                name: fixture.name.to_string(),
                email: fixture.email.to_string(),
                role: fixture.role,
                team: fixture.team,
            })
            .collect(),
        cards: CARDS
            .iter()
            .map(|fixture| Card {
                id: CardId(fixture.id.to_string()),
                last4: fixture.last4.to_string(),
                expiry: fixture.expiry.to_string(),
                brand: fixture.brand,
                color_token: fixture.brand.color_token().to_string(),
                pin: fixture.pin.to_string(),
                policy_id: Some(PolicyId(fixture.policy_id.to_string())),
            })
            .collect(),
        policies: POLICIES
            .iter()
            .map(|fixture| ExpensePolicy {
                id: PolicyId(fixture.id.to_string()),
                team: fixture.team,
                limit: Decimal::from(fixture.limit),
                spent: Decimal::from(fixture.spent),
            })
            .collect(),
        transactions: TRANSACTIONS
            .iter()
            .map(|fixture| {
                let (year, month, day) = fixture.date;
                Transaction {
                    id: TransactionId(fixture.id.to_string()),
                    title: fixture.title.to_string(),
                    amount: Decimal::new(fixture.amount_cents, 2),
                    date: NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default(),
                    policy_id: PolicyId(fixture.policy_id.to_string()),
                    card_id: CardId(fixture.card_id.to_string()),
                    status: fixture.status,
                    note: None,
                }
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::demo_seed;

    #[test]
    fn every_card_and_transaction_references_a_seeded_policy() {
        let seed = demo_seed();
        let policy_ids: HashSet<&str> =
            seed.policies.iter().map(|policy| policy.id.0.as_str()).collect();
        let card_ids: HashSet<&str> = seed.cards.iter().map(|card| card.id.0.as_str()).collect();

        for card in &seed.cards {
            let policy_id = card.policy_id.as_ref().map(|id| id.0.as_str()).unwrap_or_default();
            assert!(policy_ids.contains(policy_id), "card {} has dangling policy", card.id.0);
        }
        for transaction in &seed.transactions {
            assert!(policy_ids.contains(transaction.policy_id.0.as_str()));
            assert!(card_ids.contains(transaction.card_id.0.as_str()));
        }
    }

    #[test]
    fn exactly_one_transaction_starts_pending() {
        let pending: Vec<String> = demo_seed()
            .transactions
            .into_iter()
            .filter(|transaction| !transaction.status.is_terminal())
            .map(|transaction| transaction.id.0)
            .collect();

        assert_eq!(pending, vec!["t-3".to_string()]);
    }
}
