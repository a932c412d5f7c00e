use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Assistant,
    Member,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Assistant, Role::Member];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Assistant => "Assistant",
            Self::Member => "Member",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "assistant" => Ok(Self::Assistant),
            "member" => Ok(Self::Member),
            other => Err(DomainError::UnknownVariant { kind: "role", value: other.to_string() }),
        }
    }
}

/// Department tag shared by members and expense policies. Approval authority
/// is scoped by it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Team {
    Marketing,
    Engineering,
    Executive,
}

impl Team {
    pub const ALL: [Team; 3] = [Team::Marketing, Team::Engineering, Team::Executive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Marketing => "Marketing",
            Self::Engineering => "Engineering",
            Self::Executive => "Executive",
        }
    }
}

impl std::str::FromStr for Team {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "marketing" => Ok(Self::Marketing),
            "engineering" => Ok(Self::Engineering),
            "executive" => Ok(Self::Executive),
            other => Err(DomainError::UnknownVariant { kind: "team", value: other.to_string() }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub team: Team,
}

/// The identity on whose behalf an action is dispatched. Immutable per request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: MemberId,
    pub role: Role,
    pub team: Team,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role, team: Team) -> Self {
        Self { id: MemberId(id.into()), role, team }
    }
}

impl From<&Member> for Actor {
    fn from(member: &Member) -> Self {
        Self { id: member.id.clone(), role: member.role, team: member.team }
    }
}

#[cfg(test)]
mod tests {
    use super::{Actor, Member, MemberId, Role, Team};

    #[test]
    fn role_and_team_parse_case_insensitively() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(" Engineering ".parse::<Team>(), Ok(Team::Engineering));
        assert!("intern".parse::<Role>().is_err());
    }

    #[test]
    fn actor_is_derived_from_member_identity() {
        let member = Member {
            id: MemberId("m-1".to_string()),
            name: "Ana Souza".to_string(),
            email: "ana@example.com".to_string(),
            role: Role::Admin,
            team: Team::Marketing,
        };

        let actor = Actor::from(&member);
        assert_eq!(actor, Actor::new("m-1", Role::Admin, Team::Marketing));
    }
}
