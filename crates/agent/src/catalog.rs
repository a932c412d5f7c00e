//! Registry of agent-invocable actions.
//!
//! Every action is one [`ActionKind`] variant; the catalog maps wire names to
//! variants and carries the declarative part of each definition (description,
//! parameter schema, required permission, interaction mode). Handlers are
//! selected by matching on the variant, so a registered name can never point
//! at a missing handler.

use std::collections::{BTreeSet, HashMap};

use ledgerpilot_core::domain::Role;
use ledgerpilot_core::errors::ActionError;
use ledgerpilot_core::permissions::{Permission, PermissionTable};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    AddNewCard,
    AssignPolicyToCard,
    AddNoteToTransaction,
    SetCardPin,
    ShowTransactions,
    ShowAndApproveTransactions,
    NavigateToPageAndPerform,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        ActionKind::AddNewCard,
        ActionKind::AssignPolicyToCard,
        ActionKind::AddNoteToTransaction,
        ActionKind::SetCardPin,
        ActionKind::ShowTransactions,
        ActionKind::ShowAndApproveTransactions,
        ActionKind::NavigateToPageAndPerform,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::AddNewCard => "addNewCard",
            Self::AssignPolicyToCard => "assignPolicyToCard",
            Self::AddNoteToTransaction => "addNoteToTransaction",
            Self::SetCardPin => "setCardPin",
            Self::ShowTransactions => "showTransactions",
            Self::ShowAndApproveTransactions => "showAndApproveTransactions",
            Self::NavigateToPageAndPerform => "navigateToPageAndPerform",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InteractionMode {
    Sync,
    DeferredRender,
    RenderAndWait,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub description: &'static str,
    pub required: bool,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<&'static str>>,
}

impl ParamSpec {
    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self { name, param_type: ParamType::String, description, required: true, enum_values: None }
    }

    pub fn boolean(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            param_type: ParamType::Boolean,
            description,
            required: true,
            enum_values: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn one_of(mut self, values: &[&'static str]) -> Self {
        self.enum_values = Some(values.to_vec());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionDefinition {
    pub kind: ActionKind,
    pub description: &'static str,
    pub parameters: Vec<ParamSpec>,
    pub permission: Permission,
    pub mode: InteractionMode,
}

impl ActionDefinition {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn parameter(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|spec| spec.name == name)
    }
}

/// Discovery entry handed to the agent. Disabled actions are never listed,
/// so `enabled` is always true.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub parameter_schema: Vec<ParamSpec>,
    pub interaction_mode: InteractionMode,
    pub enabled: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("action `{name}` is already registered")]
    DuplicateAction { name: &'static str },
    #[error("action `{action}` has a malformed parameter schema: {reason}")]
    MalformedSchema { action: &'static str, reason: String },
}

#[derive(Debug, Default)]
pub struct ActionCatalog {
    definitions: Vec<ActionDefinition>,
    index: HashMap<&'static str, usize>,
}

impl ActionCatalog {
    pub fn register(&mut self, definition: ActionDefinition) -> Result<(), CatalogError> {
        let name = definition.name();
        if self.index.contains_key(name) {
            return Err(CatalogError::DuplicateAction { name });
        }
        check_schema(&definition)?;

        self.index.insert(name, self.definitions.len());
        self.definitions.push(definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&ActionDefinition, ActionError> {
        self.index
            .get(name)
            .and_then(|position| self.definitions.get(*position))
            .ok_or_else(|| ActionError::NotFound { message: format!("unknown action `{name}`") })
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Definitions `role` may invoke, in registration order.
    pub fn list(&self, role: Role, permissions: &PermissionTable) -> Vec<&ActionDefinition> {
        self.definitions
            .iter()
            .filter(|definition| permissions.allows(definition.permission, role))
            .collect()
    }

    pub fn descriptors(&self, role: Role, permissions: &PermissionTable) -> Vec<ActionDescriptor> {
        self.list(role, permissions)
            .into_iter()
            .map(|definition| ActionDescriptor {
                name: definition.name(),
                description: definition.description,
                parameter_schema: definition.parameters.clone(),
                interaction_mode: definition.mode,
                enabled: true,
            })
            .collect()
    }

    pub fn standard() -> Result<Self, CatalogError> {
        let mut catalog = Self::default();
        for definition in standard_definitions() {
            catalog.register(definition)?;
        }
        Ok(catalog)
    }
}

fn check_schema(definition: &ActionDefinition) -> Result<(), CatalogError> {
    let action = definition.name();
    let malformed = |reason: String| CatalogError::MalformedSchema { action, reason };

    let mut seen = BTreeSet::new();
    for spec in &definition.parameters {
        if spec.name.trim().is_empty() {
            return Err(malformed("parameter names must not be empty".to_string()));
        }
        if !seen.insert(spec.name) {
            return Err(malformed(format!("parameter `{}` is declared twice", spec.name)));
        }
        match &spec.enum_values {
            Some(values) if spec.param_type != ParamType::String => {
                return Err(malformed(format!(
                    "parameter `{}` declares {} enum values on a non-string type",
                    spec.name,
                    values.len()
                )));
            }
            Some(values) if values.is_empty() => {
                return Err(malformed(format!("parameter `{}` has an empty enum", spec.name)));
            }
            _ => {}
        }
    }
    Ok(())
}

pub const CARD_BRANDS: &[&str] = &["Visa", "MasterCard"];
pub const POLICY_TYPES: &[&str] = &["Marketing", "Engineering", "Executive"];
pub const NAVIGABLE_PAGES: &[&str] = &["/cards", "/team", "/"];

fn standard_definitions() -> Vec<ActionDefinition> {
    vec![
        ActionDefinition {
            kind: ActionKind::AddNewCard,
            description: "Add a new credit card",
            parameters: vec![
                ParamSpec::string("type", "Card brand chosen by the user: Visa or MasterCard")
                    .one_of(CARD_BRANDS),
                ParamSpec::string(
                    "color",
                    "Card color token: bg-blue-500 for Visa, bg-red-500 for MasterCard",
                )
                .optional(),
                ParamSpec::string("pin", "Card PIN chosen by the user, 4 digits"),
            ],
            permission: Permission::AddCard,
            mode: InteractionMode::Sync,
        },
        ActionDefinition {
            kind: ActionKind::AssignPolicyToCard,
            description: "Link an expense policy to a card",
            parameters: vec![
                ParamSpec::string("cardId", "The existing card that receives the policy"),
                ParamSpec::string("policyType", "The policy type to use").one_of(POLICY_TYPES),
            ],
            permission: Permission::AddPolicy,
            mode: InteractionMode::Sync,
        },
        ActionDefinition {
            kind: ActionKind::AddNoteToTransaction,
            description: "Add a note to a transaction",
            parameters: vec![
                ParamSpec::string("transactionId", "The transaction that receives the note"),
                ParamSpec::string("content", "The note content"),
            ],
            permission: Permission::AddNote,
            mode: InteractionMode::Sync,
        },
        ActionDefinition {
            kind: ActionKind::SetCardPin,
            description: "Set the PIN of an existing card",
            parameters: vec![
                ParamSpec::string("cardId", "The card id"),
                ParamSpec::string("pin", "The new PIN, 4 digits"),
            ],
            permission: Permission::SetPin,
            mode: InteractionMode::Sync,
        },
        ActionDefinition {
            kind: ActionKind::ShowTransactions,
            description: "Show a list of transactions on demand. At least one filter is required",
            parameters: vec![
                ParamSpec::string("card4Digits", "The last 4 digits of the card").optional(),
                ParamSpec::string("policyId", "The expense policy id").optional(),
                ParamSpec::string("transactionTitle", "The transaction title").optional(),
            ],
            permission: Permission::ShowTransactions,
            mode: InteractionMode::DeferredRender,
        },
        ActionDefinition {
            kind: ActionKind::ShowAndApproveTransactions,
            description: "Present one pending transaction and let a department admin approve or \
                          deny it. Executive admins may decide transactions of other departments",
            parameters: vec![ParamSpec::string(
                "transactionId",
                "The pending transaction to present to the department admin",
            )],
            permission: Permission::ApproveTransaction,
            mode: InteractionMode::RenderAndWait,
        },
        ActionDefinition {
            kind: ActionKind::NavigateToPageAndPerform,
            description: "Navigate to a page to perform an operation that is not available on \
                          the current page",
            parameters: vec![
                ParamSpec::string("page", "The page in which to perform the operation")
                    .one_of(NAVIGABLE_PAGES),
                ParamSpec::string(
                    "operation",
                    "Operation code from the page's available operations. Omit when unavailable",
                )
                .optional(),
                ParamSpec::boolean("operationAvailable", "Whether the operation is available"),
            ],
            permission: Permission::Navigate,
            mode: InteractionMode::RenderAndWait,
        },
    ]
}
