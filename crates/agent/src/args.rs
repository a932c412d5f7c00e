//! Structural argument validation and typed decoding.
//!
//! [`validate_args`] checks raw JSON arguments against a definition's
//! parameter schema: declared type, required presence, enum membership.
//! [`ActionRequest::decode`] then turns the validated map into the typed
//! variant for the action. Neither step consults the ledger.

use std::collections::BTreeMap;

use ledgerpilot_core::domain::{CardBrand, CardId, PolicyId, Team, TransactionId};
use ledgerpilot_core::errors::{ActionError, DomainError};
use ledgerpilot_core::navigation::Page;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::catalog::{ActionDefinition, ActionKind, ParamSpec, ParamType};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArgValue {
    Text(String),
    Number(f64),
    Flag(bool),
}

/// Arguments that passed schema validation, keyed by parameter name.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ActionArgs {
    values: BTreeMap<String, ArgValue>,
}

impl ActionArgs {
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ArgValue::Flag(value)) => Some(*value),
            _ => None,
        }
    }

    fn required_text(&self, name: &str) -> Result<&str, ActionError> {
        self.text(name).ok_or_else(|| missing(name))
    }

    fn required_flag(&self, name: &str) -> Result<bool, ActionError> {
        self.flag(name).ok_or_else(|| missing(name))
    }

    /// Canonical JSON of the validated arguments; two invocations with equal
    /// arguments produce equal identities.
    pub fn identity(&self) -> Value {
        serde_json::to_value(&self.values).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn missing(name: &str) -> ActionError {
    ActionError::validation(name, "missing required argument")
}

pub fn validate_args(
    definition: &ActionDefinition,
    raw: &Value,
) -> Result<ActionArgs, ActionError> {
    let empty = Map::new();
    let object = match raw {
        Value::Object(object) => object,
        Value::Null => &empty,
        _ => return Err(ActionError::validation("args", "arguments must be a JSON object")),
    };

    for key in object.keys() {
        if definition.parameter(key).is_none() {
            tracing::debug!(
                event_name = "agent.args.unknown_key_ignored",
                action = definition.name(),
                key = %key,
                "ignoring undeclared argument"
            );
        }
    }

    let mut values = BTreeMap::new();
    for spec in &definition.parameters {
        match object.get(spec.name) {
            None | Some(Value::Null) => {
                if spec.required {
                    return Err(missing(spec.name));
                }
            }
            Some(value) => {
                let coerced = coerce(spec, value)?;
                values.insert(spec.name.to_string(), coerced);
            }
        }
    }

    Ok(ActionArgs { values })
}

fn coerce(spec: &ParamSpec, value: &Value) -> Result<ArgValue, ActionError> {
    let mismatch = || {
        ActionError::validation(
            spec.name,
            format!("expected a {} value", type_label(spec.param_type)),
        )
    };

    let coerced = match (spec.param_type, value) {
        (ParamType::String, Value::String(text)) => {
            if spec.required && text.trim().is_empty() {
                return Err(ActionError::validation(spec.name, "must not be empty"));
            }
            ArgValue::Text(text.clone())
        }
        (ParamType::String, Value::Number(number)) => ArgValue::Text(number.to_string()),
        (ParamType::Number, Value::Number(number)) => {
            ArgValue::Number(number.as_f64().ok_or_else(mismatch)?)
        }
        (ParamType::Number, Value::String(text)) => {
            ArgValue::Number(text.trim().parse::<f64>().map_err(|_| mismatch())?)
        }
        (ParamType::Boolean, Value::Bool(flag)) => ArgValue::Flag(*flag),
        (ParamType::Boolean, Value::String(text)) => {
            ArgValue::Flag(text.trim().parse::<bool>().map_err(|_| mismatch())?)
        }
        _ => return Err(mismatch()),
    };

    if let (Some(allowed), ArgValue::Text(text)) = (&spec.enum_values, &coerced) {
        if !allowed.contains(&text.as_str()) {
            return Err(ActionError::validation(
                spec.name,
                format!("`{text}` is not one of {}", allowed.join(", ")),
            ));
        }
    }

    Ok(coerced)
}

fn type_label(param_type: ParamType) -> &'static str {
    match param_type {
        ParamType::String => "string",
        ParamType::Number => "number",
        ParamType::Boolean => "boolean",
    }
}

/// Filters for `showTransactions`. When several are supplied, the card's
/// last four digits win over the policy id, which wins over the title.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_last4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<PolicyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl TransactionFilter {
    pub fn is_empty(&self) -> bool {
        self.card_last4.is_none() && self.policy_id.is_none() && self.title.is_none()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ActionRequest {
    AddNewCard { brand: CardBrand, color: Option<String>, pin: String },
    AssignPolicyToCard { card_id: CardId, policy_type: Team },
    AddNoteToTransaction { transaction_id: TransactionId, content: String },
    SetCardPin { card_id: CardId, pin: String },
    ShowTransactions(TransactionFilter),
    ShowAndApproveTransactions { transaction_id: TransactionId },
    NavigateToPageAndPerform { page: Page, operation: Option<String>, operation_available: bool },
}

impl ActionRequest {
    pub fn decode(kind: ActionKind, args: &ActionArgs) -> Result<Self, ActionError> {
        let request = match kind {
            ActionKind::AddNewCard => Self::AddNewCard {
                brand: args
                    .required_text("type")?
                    .parse()
                    .map_err(|error: DomainError| {
                        ActionError::validation("type", error.to_string())
                    })?,
                color: non_blank(args.text("color")),
                pin: args.required_text("pin")?.to_string(),
            },
            ActionKind::AssignPolicyToCard => Self::AssignPolicyToCard {
                card_id: CardId(args.required_text("cardId")?.trim().to_string()),
                policy_type: args
                    .required_text("policyType")?
                    .parse()
                    .map_err(|_| ActionError::validation("policyType", "unknown policy type"))?,
            },
            ActionKind::AddNoteToTransaction => Self::AddNoteToTransaction {
                transaction_id: transaction_id(args)?,
                content: args.required_text("content")?.trim().to_string(),
            },
            ActionKind::SetCardPin => Self::SetCardPin {
                card_id: CardId(args.required_text("cardId")?.trim().to_string()),
                pin: args.required_text("pin")?.to_string(),
            },
            ActionKind::ShowTransactions => Self::ShowTransactions(TransactionFilter {
                card_last4: non_blank(args.text("card4Digits")),
                policy_id: non_blank(args.text("policyId")).map(PolicyId),
                title: non_blank(args.text("transactionTitle")),
            }),
            ActionKind::ShowAndApproveTransactions => {
                Self::ShowAndApproveTransactions { transaction_id: transaction_id(args)? }
            }
            ActionKind::NavigateToPageAndPerform => {
                let path = args.required_text("page")?;
                Self::NavigateToPageAndPerform {
                    page: Page::from_path(path).ok_or_else(|| {
                        ActionError::validation("page", format!("unknown page `{path}`"))
                    })?,
                    operation: non_blank(args.text("operation")),
                    operation_available: args.required_flag("operationAvailable")?,
                }
            }
        };
        Ok(request)
    }
}

fn transaction_id(args: &ActionArgs) -> Result<TransactionId, ActionError> {
    Ok(TransactionId(args.required_text("transactionId")?.trim().to_string()))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
}
