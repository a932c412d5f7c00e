use std::collections::BTreeMap;

use ledgerpilot_core::domain::{Actor, Role, Team};
use ledgerpilot_core::navigation::{NavigationBroker, Page};
use ledgerpilot_core::permissions::{Permission, PermissionTable};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorSummary {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: Role,
    pub team: Team,
}

/// Read-only snapshot the agent may consult before choosing an action.
/// `denied_permissions` lets it decline out-of-scope requests without
/// learning anything about page structure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadableContext {
    pub actor: ActorSummary,
    pub denied_permissions: Vec<Permission>,
    pub pages: Vec<&'static str>,
    pub operations: BTreeMap<&'static str, Vec<&'static str>>,
    pub current_page: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_redirect: Option<String>,
}

impl ReadableContext {
    pub fn build(
        actor: &Actor,
        name: Option<String>,
        permissions: &PermissionTable,
        navigation: &NavigationBroker,
    ) -> Self {
        let operations = Page::ALL
            .into_iter()
            .map(|page| {
                let codes = page.resumable_operations().iter().map(|op| op.code()).collect();
                (page.path(), codes)
            })
            .collect();

        Self {
            actor: ActorSummary {
                id: actor.id.0.clone(),
                name,
                role: actor.role,
                team: actor.team,
            },
            denied_permissions: permissions.denied_permissions(actor.role).into_iter().collect(),
            pages: Page::ALL.iter().map(Page::path).collect(),
            operations,
            current_page: navigation.current_page().path(),
            pending_redirect: navigation.pending().map(|redirect| redirect.to_path()),
        }
    }
}

#[cfg(test)]
mod tests {
    use ledgerpilot_core::domain::{Actor, Role, Team};
    use ledgerpilot_core::navigation::{build_redirect, NavigationBroker, Page, PageOperation};
    use ledgerpilot_core::permissions::{Permission, PermissionTable};

    use super::ReadableContext;

    #[test]
    fn member_context_lists_denied_permissions_and_pages() {
        let actor = Actor::new("2b3c4d5e6f", Role::Member, Team::Engineering);
        let navigation = NavigationBroker::new(Page::Cards);
        let context = ReadableContext::build(
            &actor,
            Some("Lucas Oliveira".to_string()),
            &PermissionTable::standard(),
            &navigation,
        );

        assert!(context.denied_permissions.contains(&Permission::AddCard));
        assert!(!context.denied_permissions.contains(&Permission::SetPin));
        assert_eq!(context.pages, vec!["/", "/cards", "/team"]);
        assert_eq!(context.operations.get("/cards"), Some(&vec!["change-pin"]));
        assert_eq!(context.current_page, "/cards");
        assert!(context.pending_redirect.is_none());
    }

    #[test]
    fn pending_redirect_is_exposed_as_path() {
        let actor = Actor::new("9g5h2j1k4l", Role::Admin, Team::Executive);
        let navigation = NavigationBroker::default();
        navigation.stage(build_redirect(Page::Team, Some(PageOperation::InviteMember)));

        let context =
            ReadableContext::build(&actor, None, &PermissionTable::standard(), &navigation);
        let json = serde_json::to_value(&context).unwrap_or_default();

        assert_eq!(json["pendingRedirect"], "/team?operation=invite-member");
        assert_eq!(json["actor"]["role"], "Admin");
        assert!(json["deniedPermissions"].as_array().is_some_and(|denied| denied.is_empty()));
    }
}
