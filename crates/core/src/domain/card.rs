use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::policy::PolicyId;
use crate::errors::DomainError;

pub const PIN_LENGTH: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CardId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardBrand {
    Visa,
    MasterCard,
}

impl CardBrand {
    pub const ALL: [CardBrand; 2] = [CardBrand::Visa, CardBrand::MasterCard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visa => "Visa",
            Self::MasterCard => "MasterCard",
        }
    }

    pub fn color_token(&self) -> &'static str {
        match self {
            Self::Visa => "bg-blue-500",
            Self::MasterCard => "bg-red-500",
        }
    }
}

impl std::str::FromStr for CardBrand {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "visa" => Ok(Self::Visa),
            "mastercard" => Ok(Self::MasterCard),
            other => {
                Err(DomainError::UnknownVariant { kind: "card brand", value: other.to_string() })
            }
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub last4: String,
    pub expiry: String,
    pub brand: CardBrand,
    pub color_token: String,
    pub pin: String,
    pub policy_id: Option<PolicyId>,
}

impl Card {
    /// Links the card to `policy_id`, replacing any previous assignment.
    pub fn assign_policy(&mut self, policy_id: PolicyId) -> Option<PolicyId> {
        self.policy_id.replace(policy_id)
    }

    pub fn change_pin(&mut self, pin: &str) -> Result<(), DomainError> {
        validate_pin(pin)?;
        self.pin = pin.to_string();
        Ok(())
    }
}

impl fmt::Debug for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Card")
            .field("id", &self.id)
            .field("last4", &self.last4)
            .field("expiry", &self.expiry)
            .field("brand", &self.brand)
            .field("color_token", &self.color_token)
            .field("pin", &"<redacted>")
            .field("policy_id", &self.policy_id)
            .finish()
    }
}

pub fn validate_pin(pin: &str) -> Result<(), DomainError> {
    if pin.len() == PIN_LENGTH && pin.chars().all(|ch| ch.is_ascii_digit()) {
        return Ok(());
    }
    Err(DomainError::InvalidPin)
}
