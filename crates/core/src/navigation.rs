//! Cross-page operation handoff.
//!
//! An operation requested on one page but only performable on another is
//! carried as a [`Redirect`]: the destination page plus an optional
//! resumable-operation code. The session keeps at most one staged redirect;
//! when the destination page loads, the broker resolves the code against that
//! page's resumable operations and hands a match to the page's resumption
//! handlers. Unknown or absent codes resolve to nothing and raise no error.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{form_urlencoded, Url};

use crate::errors::ActionError;

pub const OPERATION_QUERY_KEY: &str = "operation";

/// Locations are app-relative; they are resolved against this origin and
/// anything that leaves it is not a page.
const LOCATION_BASE: &str = "http://ledgerpilot.local/";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Page {
    #[default]
    #[serde(rename = "/")]
    Dashboard,
    #[serde(rename = "/cards")]
    Cards,
    #[serde(rename = "/team")]
    Team,
}

impl Page {
    pub const ALL: [Page; 3] = [Page::Dashboard, Page::Cards, Page::Team];

    pub fn path(&self) -> &'static str {
        match self {
            Self::Dashboard => "/",
            Self::Cards => "/cards",
            Self::Team => "/team",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let trimmed = path.trim();
        let normalized = match trimmed.trim_end_matches('/') {
            "" => "/",
            other => other,
        };
        Self::ALL.into_iter().find(|page| page.path() == normalized)
    }

    /// Operations this page can resume after a redirect.
    pub fn resumable_operations(&self) -> &'static [PageOperation] {
        match self {
            Self::Dashboard => &[],
            Self::Cards => &[PageOperation::ChangePin],
            Self::Team => &[
                PageOperation::InviteMember,
                PageOperation::RemoveMember,
                PageOperation::EditMember,
            ],
        }
    }

    pub fn offers(&self, operation: PageOperation) -> bool {
        self.resumable_operations().contains(&operation)
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageOperation {
    ChangePin,
    InviteMember,
    RemoveMember,
    EditMember,
}

impl PageOperation {
    pub const ALL: [PageOperation; 4] = [
        PageOperation::ChangePin,
        PageOperation::InviteMember,
        PageOperation::RemoveMember,
        PageOperation::EditMember,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::ChangePin => "change-pin",
            Self::InviteMember => "invite-member",
            Self::RemoveMember => "remove-member",
            Self::EditMember => "edit-member",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|operation| operation.code() == code.trim())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("unknown page `{path}`")]
    UnknownPage { path: String },
}

impl From<NavigationError> for ActionError {
    fn from(value: NavigationError) -> Self {
        ActionError::validation("page", value.to_string())
    }
}

/// Destination page plus the operation to resume there. Only constructed
/// through [`build_redirect`], so the operation is always one the page offers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Redirect {
    page: Page,
    operation: Option<PageOperation>,
}

impl Redirect {
    pub fn page(&self) -> Page {
        self.page
    }

    pub fn operation(&self) -> Option<PageOperation> {
        self.operation
    }

    pub fn operation_code(&self) -> Option<&'static str> {
        self.operation.map(|operation| operation.code())
    }

    /// `"/team?operation=invite-member"`, or the bare path without an operation.
    pub fn to_path(&self) -> String {
        match self.operation {
            Some(operation) => {
                let query = form_urlencoded::Serializer::new(String::new())
                    .append_pair(OPERATION_QUERY_KEY, operation.code())
                    .finish();
                format!("{}?{query}", self.page.path())
            }
            None => self.page.path().to_string(),
        }
    }
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path())
    }
}

/// Builds the redirect for `page`. An operation the page does not declare is
/// dropped.
pub fn build_redirect(page: Page, operation: Option<PageOperation>) -> Redirect {
    let operation = operation.filter(|operation| page.offers(*operation));
    Redirect { page, operation }
}

pub fn resolve_pending(page: Page, operation_code: Option<&str>) -> Option<PageOperation> {
    let operation = PageOperation::from_code(operation_code?)?;
    page.offers(operation).then_some(operation)
}

/// Splits a location such as `/team?operation=invite-member` into the page and
/// the decoded operation code, if any. Fragments are ignored.
pub fn parse_location(location: &str) -> Result<(Page, Option<String>), NavigationError> {
    let unknown = || NavigationError::UnknownPage { path: location.trim().to_string() };
    let base = Url::parse(LOCATION_BASE).map_err(|_| unknown())?;
    let url = base.join(location.trim()).map_err(|_| unknown())?;
    if url.origin() != base.origin() {
        return Err(unknown());
    }

    let page = Page::from_path(url.path())
        .ok_or_else(|| NavigationError::UnknownPage { path: url.path().to_string() })?;
    let code = url
        .query_pairs()
        .find(|(key, value)| key == OPERATION_QUERY_KEY && !value.is_empty())
        .map(|(_, value)| value.into_owned());

    Ok((page, code))
}

/// Page-local reaction to a resumed operation, e.g. opening the invite dialog.
pub trait ResumptionHandler: Send + Sync {
    fn resume(&self, page: Page, operation: PageOperation);
}

#[derive(Debug)]
struct SessionState {
    current: Page,
    pending: Option<Redirect>,
}

pub struct NavigationBroker {
    state: Mutex<SessionState>,
    handlers: HashMap<Page, Vec<Arc<dyn ResumptionHandler>>>,
}

impl Default for NavigationBroker {
    fn default() -> Self {
        Self::new(Page::Dashboard)
    }
}

impl NavigationBroker {
    pub fn new(start: Page) -> Self {
        Self {
            state: Mutex::new(SessionState { current: start, pending: None }),
            handlers: HashMap::new(),
        }
    }

    pub fn with_handler(mut self, page: Page, handler: Arc<dyn ResumptionHandler>) -> Self {
        self.handlers.entry(page).or_default().push(handler);
        self
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn current_page(&self) -> Page {
        self.state().current
    }

    pub fn pending(&self) -> Option<Redirect> {
        self.state().pending
    }

    /// Records `redirect` as the session's pending operation, replacing any
    /// earlier one, and returns the path the caller should navigate to.
    pub fn stage(&self, redirect: Redirect) -> String {
        let path = redirect.to_path();
        let replaced = self.state().pending.replace(redirect);
        tracing::info!(
            event_name = "navigation.redirect_staged",
            target = %path,
            replaced = replaced.is_some(),
            "pending operation staged"
        );
        path
    }

    /// Enters `page`, consuming the staged redirect. A redirect staged for a
    /// different page is discarded.
    pub fn load_page(&self, page: Page) -> Option<PageOperation> {
        let pending = {
            let mut state = self.state();
            state.current = page;
            state.pending.take()
        };

        let code = match pending {
            Some(redirect) if redirect.page() == page => redirect.operation_code(),
            Some(redirect) => {
                tracing::debug!(
                    event_name = "navigation.pending_discarded",
                    staged_for = %redirect.page(),
                    page = %page,
                    "staged operation targets another page"
                );
                None
            }
            None => None,
        };

        self.resume(page, code)
    }

    /// Enters the page named by `location`. An explicit `operation` query
    /// parameter takes the place of any staged redirect.
    pub fn load_path(&self, location: &str) -> Result<Option<PageOperation>, NavigationError> {
        let (page, code) = parse_location(location)?;
        match code {
            Some(code) => {
                {
                    let mut state = self.state();
                    state.current = page;
                    state.pending = None;
                }
                Ok(self.resume(page, Some(&code)))
            }
            None => Ok(self.load_page(page)),
        }
    }

    fn resume(&self, page: Page, code: Option<&str>) -> Option<PageOperation> {
        let operation = resolve_pending(page, code);
        match operation {
            Some(operation) => {
                tracing::info!(
                    event_name = "navigation.operation_resumed",
                    page = %page,
                    operation = operation.code(),
                    "resuming operation"
                );
                for handler in self.handlers.get(&page).into_iter().flatten() {
                    handler.resume(page, operation);
                }
            }
            None if code.is_some() => {
                tracing::debug!(
                    event_name = "navigation.operation_ignored",
                    page = %page,
                    code = code.unwrap_or_default(),
                    "operation code not offered by page"
                );
            }
            None => {}
        }
        operation
    }

    pub fn operation_map() -> Vec<(Page, Vec<PageOperation>)> {
        Page::ALL.into_iter().map(|page| (page, page.resumable_operations().to_vec())).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::{
        build_redirect, parse_location, resolve_pending, NavigationBroker, NavigationError, Page,
        PageOperation, ResumptionHandler,
    };

    #[derive(Default)]
    struct RecordingHandler {
        resumed: Mutex<Vec<(Page, PageOperation)>>,
    }

    impl RecordingHandler {
        fn resumed(&self) -> Vec<(Page, PageOperation)> {
            self.resumed.lock().map(|calls| calls.clone()).unwrap_or_default()
        }
    }

    impl ResumptionHandler for RecordingHandler {
        fn resume(&self, page: Page, operation: PageOperation) {
            if let Ok(mut calls) = self.resumed.lock() {
                calls.push((page, operation));
            }
        }
    }

    fn broker_with_team_handler() -> (NavigationBroker, Arc<RecordingHandler>) {
        let handler = Arc::new(RecordingHandler::default());
        let broker = NavigationBroker::default().with_handler(Page::Team, handler.clone());
        (broker, handler)
    }

    #[test]
    fn redirect_round_trip_resolves_offered_operations_only() {
        for page in Page::ALL {
            for operation in PageOperation::ALL {
                let redirect = build_redirect(page, Some(operation));
                let resolved = resolve_pending(page, redirect.operation_code());
                if page.offers(operation) {
                    assert_eq!(resolved, Some(operation));
                } else {
                    assert_eq!(resolved, None);
                    assert_eq!(redirect.operation(), None);
                }
            }
            assert_eq!(resolve_pending(page, None), None);
        }
    }

    #[test]
    fn redirect_renders_path_with_operation_query() {
        let redirect = build_redirect(Page::Team, Some(PageOperation::InviteMember));
        assert_eq!(redirect.to_path(), "/team?operation=invite-member");

        let dropped = build_redirect(Page::Cards, Some(PageOperation::InviteMember));
        assert_eq!(dropped.to_path(), "/cards");
    }

    #[test]
    fn staged_invite_member_is_resumed_on_team_page() {
        let (broker, handler) = broker_with_team_handler();
        let path = broker.stage(build_redirect(Page::Team, Some(PageOperation::InviteMember)));
        assert_eq!(path, "/team?operation=invite-member");

        let resumed = broker.load_page(Page::Team);

        assert_eq!(resumed, Some(PageOperation::InviteMember));
        assert_eq!(handler.resumed(), vec![(Page::Team, PageOperation::InviteMember)]);
        assert_eq!(broker.current_page(), Page::Team);
        assert_eq!(broker.pending(), None);
    }

    #[test]
    fn bogus_operation_code_resumes_nothing() {
        let (broker, handler) = broker_with_team_handler();

        let resumed = broker.load_path("/team?operation=bogus-op");

        assert_eq!(resumed, Ok(None));
        assert!(handler.resumed().is_empty());
        assert_eq!(broker.current_page(), Page::Team);
    }

    #[test]
    fn plain_visit_without_pending_operation_is_a_no_op() {
        let (broker, handler) = broker_with_team_handler();

        assert_eq!(broker.load_page(Page::Team), None);
        assert!(handler.resumed().is_empty());
    }

    #[test]
    fn pending_operation_for_another_page_is_discarded() {
        let (broker, handler) = broker_with_team_handler();
        broker.stage(build_redirect(Page::Team, Some(PageOperation::EditMember)));

        assert_eq!(broker.load_page(Page::Cards), None);
        assert_eq!(broker.pending(), None);
        assert_eq!(broker.load_page(Page::Team), None);
        assert!(handler.resumed().is_empty());
    }

    #[test]
    fn later_stage_replaces_earlier_one() {
        let broker = NavigationBroker::default();
        broker.stage(build_redirect(Page::Team, Some(PageOperation::RemoveMember)));
        broker.stage(build_redirect(Page::Cards, Some(PageOperation::ChangePin)));

        assert_eq!(broker.load_page(Page::Cards), Some(PageOperation::ChangePin));
    }

    #[test]
    fn location_parsing_extracts_page_and_code() {
        assert_eq!(
            parse_location("/cards?operation=change-pin"),
            Ok((Page::Cards, Some("change-pin".to_string())))
        );
        assert_eq!(parse_location("/team/"), Ok((Page::Team, None)));
        assert_eq!(parse_location("/?tab=1"), Ok((Page::Dashboard, None)));
        assert_eq!(
            parse_location("/settings"),
            Err(NavigationError::UnknownPage { path: "/settings".to_string() })
        );
    }

    #[test]
    fn location_parsing_decodes_query_and_drops_fragment() {
        assert_eq!(
            parse_location("/team?operation=invite%2Dmember"),
            Ok((Page::Team, Some("invite-member".to_string())))
        );
        assert_eq!(
            parse_location("/team?tab=members&operation=edit-member#top"),
            Ok((Page::Team, Some("edit-member".to_string())))
        );
        assert_eq!(parse_location("/cards#operation=change-pin"), Ok((Page::Cards, None)));
        assert_eq!(
            parse_location("//elsewhere.example/team"),
            Err(NavigationError::UnknownPage { path: "//elsewhere.example/team".to_string() })
        );
    }

    #[test]
    fn encoded_or_fragmented_location_still_resumes() {
        let (broker, handler) = broker_with_team_handler();

        assert_eq!(
            broker.load_path("/team?operation=invite%2Dmember"),
            Ok(Some(PageOperation::InviteMember))
        );
        assert_eq!(
            broker.load_path("/team?operation=remove-member#top"),
            Ok(Some(PageOperation::RemoveMember))
        );
        assert_eq!(
            handler.resumed(),
            vec![
                (Page::Team, PageOperation::InviteMember),
                (Page::Team, PageOperation::RemoveMember),
            ]
        );
    }

    #[test]
    fn operation_map_lists_every_page() {
        let map = NavigationBroker::operation_map();
        assert_eq!(map.len(), 3);
        assert!(map.contains(&(Page::Dashboard, Vec::new())));
        assert!(map.contains(&(Page::Cards, vec![PageOperation::ChangePin])));
    }
}
