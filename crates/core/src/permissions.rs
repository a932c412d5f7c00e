use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::member::Role;

/// Named capability. Roles hold zero or more permissions through a
/// [`PermissionTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    AddCard,
    AddPolicy,
    AddNote,
    SetPin,
    ShowTransactions,
    ApproveTransaction,
    /// Cross-team approval override. Only effective for Executive-team actors.
    ApproveAnyTeam,
    Navigate,
}

impl Permission {
    pub const ALL: [Permission; 8] = [
        Permission::AddCard,
        Permission::AddPolicy,
        Permission::AddNote,
        Permission::SetPin,
        Permission::ShowTransactions,
        Permission::ApproveTransaction,
        Permission::ApproveAnyTeam,
        Permission::Navigate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddCard => "ADD_CARD",
            Self::AddPolicy => "ADD_POLICY",
            Self::AddNote => "ADD_NOTE",
            Self::SetPin => "SET_PIN",
            Self::ShowTransactions => "SHOW_TRANSACTIONS",
            Self::ApproveTransaction => "APPROVE_TRANSACTION",
            Self::ApproveAnyTeam => "APPROVE_ANY_TEAM",
            Self::Navigate => "NAVIGATE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|permission| permission.as_str() == name.trim())
    }
}

/// Static mapping from permission to the roles holding it. A permission with
/// no entry denies every role.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PermissionTable {
    grants: BTreeMap<Permission, BTreeSet<Role>>,
}

impl PermissionTable {
    pub fn new<I, R>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Permission, R)>,
        R: IntoIterator<Item = Role>,
    {
        let mut grants: BTreeMap<Permission, BTreeSet<Role>> = BTreeMap::new();
        for (permission, roles) in entries {
            grants.entry(permission).or_default().extend(roles);
        }
        Self { grants }
    }

    pub fn standard() -> Self {
        use Role::{Admin, Assistant, Member};

        Self::new([
            (Permission::AddCard, vec![Admin]),
            (Permission::AddPolicy, vec![Admin]),
            (Permission::AddNote, vec![Admin, Assistant, Member]),
            (Permission::SetPin, vec![Admin, Member]),
            (Permission::ShowTransactions, vec![Admin, Assistant, Member]),
            (Permission::ApproveTransaction, vec![Admin]),
            (Permission::ApproveAnyTeam, vec![Admin]),
            (Permission::Navigate, vec![Admin, Assistant, Member]),
        ])
    }

    pub fn allows(&self, permission: Permission, role: Role) -> bool {
        self.grants.get(&permission).is_some_and(|roles| roles.contains(&role))
    }

    /// Lookup by wire name. Unknown names deny every role.
    pub fn allows_named(&self, permission: &str, role: Role) -> bool {
        Permission::from_name(permission).is_some_and(|permission| self.allows(permission, role))
    }

    pub fn denied_permissions(&self, role: Role) -> BTreeSet<Permission> {
        Permission::ALL.into_iter().filter(|permission| !self.allows(*permission, role)).collect()
    }

    pub fn granted_permissions(&self, role: Role) -> BTreeSet<Permission> {
        Permission::ALL.into_iter().filter(|permission| self.allows(*permission, role)).collect()
    }
}
