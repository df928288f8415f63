//! Backend trait and implementations for talking to the directory.
//!
//! [`Backend`] is the narrow surface the follow engine needs: token
//! acquisition, user/group enumeration and followed-site reads and writes.
//! The production implementation is [`graph::GraphBackend`].
//!
//! # Testing
//!
//! Use [`MockBackend`] for testing without network access:
//!
//! ```
//! use graphkit::backend::{Backend, MockBackend};
//! use graphkit::{Credentials, Site};
//!
//! let mock = MockBackend::new();
//! mock.add_site(Site::new("site-a", "team", "Team", "https://contoso.sharepoint.com/sites/team"));
//!
//! let token = mock.acquire_token(&Credentials::new("t", "c", "s")).unwrap();
//! mock.follow_site(&token, "u1", "site-a").unwrap();
//! assert_eq!(mock.followed_sites(&token, "u1").unwrap().len(), 1);
//! ```

pub mod graph;

use crate::error::{Error, Result};
use crate::types::{Credentials, DirectoryObject, Page, Site, Token};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Directory/Graph client used by every component.
///
/// Implementations are blocking; the engine issues calls strictly in
/// sequence.
pub trait Backend: Send + Sync {
    /// Exchange service-principal credentials for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns `Error::Auth` on any non-2xx answer or transport failure.
    fn acquire_token(&self, credentials: &Credentials) -> Result<Token>;

    /// Fetch one page of a group's members.
    ///
    /// `cursor` is the continuation link from the previous page, or `None`
    /// for the first page.
    fn group_members(
        &self,
        token: &Token,
        group_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<DirectoryObject>>;

    /// Fetch one page of every user in the tenant.
    fn users(&self, token: &Token, cursor: Option<&str>) -> Result<Page<DirectoryObject>>;

    /// Look up a single user.
    fn get_user(&self, token: &Token, user: &str) -> Result<DirectoryObject>;

    /// List the sites a user follows.
    fn followed_sites(&self, token: &Token, user: &str) -> Result<Vec<Site>>;

    /// Ask the API to add a site to a user's followed set.
    ///
    /// Success means the request was accepted, not that the follow is
    /// visible yet.
    fn follow_site(&self, token: &Token, user: &str, site: &str) -> Result<()>;

    /// Fetch detailed metadata for one site.
    fn get_site(&self, token: &Token, site: &str) -> Result<Site>;

    /// Search sites by free text (typically a URL).
    fn search_sites(&self, token: &Token, query: &str) -> Result<Vec<Site>>;
}

/// Number of calls made against a [`MockBackend`], by endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockCalls {
    /// Token requests.
    pub token: usize,
    /// Group member page requests.
    pub group_pages: usize,
    /// Tenant user page requests.
    pub user_pages: usize,
    /// Single-user lookups.
    pub user_lookups: usize,
    /// Followed-site list reads.
    pub followed_reads: usize,
    /// Follow writes.
    pub follows: usize,
    /// Site detail lookups.
    pub site_lookups: usize,
    /// Site searches.
    pub searches: usize,
}

#[derive(Debug, Default)]
struct MockState {
    auth_error: Option<(Option<u16>, String)>,
    sites: HashMap<String, Site>,
    followed: HashMap<String, Vec<Site>>,
    /// Accepted follows not yet visible, with reads remaining.
    pending: HashMap<String, Vec<(Site, usize)>>,
    verify_lag: usize,
    failing_follows: HashSet<String>,
    transient_follow_failures: usize,
    unapplied_follows: HashSet<String>,
    failing_reads: HashSet<String>,
    groups: HashMap<String, Vec<Vec<DirectoryObject>>>,
    group_failures: HashMap<String, usize>,
    user_pages: Vec<Vec<DirectoryObject>>,
    known_users: Option<HashSet<String>>,
    failing_site_lookups: HashSet<String>,
    failing_searches: bool,
    calls: MockCalls,
}

/// Mock backend for testing without network access.
///
/// State lives behind an `Arc`, so a clone handed to a
/// [`Client`](crate::Client) shares call counters with the one it was cloned from.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a site so writes and lookups can resolve it.
    pub fn add_site(&self, site: Site) {
        self.state().sites.insert(site.id.clone(), site);
    }

    /// Make a user already follow a site.
    pub fn set_followed(&self, user: &str, site: Site) {
        self.state().followed.entry(user.to_string()).or_default().push(site);
    }

    /// Make token requests fail.
    pub fn fail_auth(&self, status: Option<u16>, message: impl Into<String>) {
        self.state().auth_error = Some((status, message.into()));
    }

    /// Number of followed-site reads after a write before it becomes visible.
    pub fn set_verify_lag(&self, reads: usize) {
        self.state().verify_lag = reads;
    }

    /// Make every write for this site fail with HTTP 500.
    pub fn fail_follows_for(&self, site: &str) {
        self.state().failing_follows.insert(site.to_string());
    }

    /// Make the next `count` writes fail with HTTP 503.
    pub fn fail_next_follows(&self, count: usize) {
        self.state().transient_follow_failures = count;
    }

    /// Accept writes for this site but never make them visible.
    pub fn never_apply(&self, site: &str) {
        self.state().unapplied_follows.insert(site.to_string());
    }

    /// Make followed-site reads for this user fail.
    pub fn fail_reads_for(&self, user: &str) {
        self.state().failing_reads.insert(user.to_string());
    }

    /// Set a group's membership, one `Vec` per page.
    pub fn set_group_pages(&self, group_id: &str, pages: Vec<Vec<DirectoryObject>>) {
        self.state().groups.insert(group_id.to_string(), pages);
    }

    /// Make fetching the given page (0-indexed) of a group fail.
    pub fn fail_group_page(&self, group_id: &str, page: usize) {
        self.state().group_failures.insert(group_id.to_string(), page);
    }

    /// Set the tenant's users, one `Vec` per page.
    pub fn set_user_pages(&self, pages: Vec<Vec<DirectoryObject>>) {
        self.state().user_pages = pages;
    }

    /// Restrict single-user lookups to these ids. Unset means all exist.
    pub fn set_known_users<I, S>(&self, users: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state().known_users = Some(users.into_iter().map(Into::into).collect());
    }

    /// Make detail lookups for this site fail.
    pub fn fail_site_lookup(&self, site: &str) {
        self.state().failing_site_lookups.insert(site.to_string());
    }

    /// Make every site search fail.
    pub fn fail_searches(&self) {
        self.state().failing_searches = true;
    }

    /// Calls made so far.
    #[must_use]
    pub fn calls(&self) -> MockCalls {
        self.state().calls
    }

    fn page_index(cursor: Option<&str>) -> usize {
        cursor
            .and_then(|c| c.rsplit("page=").next())
            .and_then(|n| n.parse().ok())
            .unwrap_or(0)
    }

    fn page_of(pages: &[Vec<DirectoryObject>], index: usize, base: &str) -> Page<DirectoryObject> {
        let items = pages.get(index).cloned().unwrap_or_default();
        let next_link = (index + 1 < pages.len()).then(|| format!("{base}?page={}", index + 1));
        Page { items, next_link }
    }
}

impl Backend for MockBackend {
    fn acquire_token(&self, credentials: &Credentials) -> Result<Token> {
        let mut state = self.state();
        state.calls.token += 1;
        if let Some((status, message)) = &state.auth_error {
            return Err(Error::auth(message.clone(), *status));
        }
        Ok(Token::new(format!("mock-token-{}", credentials.client_id)))
    }

    fn group_members(
        &self,
        _token: &Token,
        group_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<DirectoryObject>> {
        let mut state = self.state();
        state.calls.group_pages += 1;
        let index = Self::page_index(cursor);

        if state.group_failures.get(group_id) == Some(&index) {
            return Err(Error::http("HTTP 503", Some(503)));
        }
        let pages = state
            .groups
            .get(group_id)
            .ok_or_else(|| Error::http(format!("group {group_id} not found"), Some(404)))?;
        Ok(Self::page_of(
            pages,
            index,
            &format!("mock://groups/{group_id}/members"),
        ))
    }

    fn users(&self, _token: &Token, cursor: Option<&str>) -> Result<Page<DirectoryObject>> {
        let mut state = self.state();
        state.calls.user_pages += 1;
        Ok(Self::page_of(
            &state.user_pages,
            Self::page_index(cursor),
            "mock://users",
        ))
    }

    fn get_user(&self, _token: &Token, user: &str) -> Result<DirectoryObject> {
        let mut state = self.state();
        state.calls.user_lookups += 1;
        match &state.known_users {
            Some(known) if !known.contains(user) => {
                Err(Error::http(format!("user {user} not found"), Some(404)))
            }
            _ => Ok(DirectoryObject::user(user)),
        }
    }

    fn followed_sites(&self, _token: &Token, user: &str) -> Result<Vec<Site>> {
        let mut guard = self.state();
        let state = &mut *guard;
        state.calls.followed_reads += 1;

        if state.failing_reads.contains(user) {
            return Err(Error::http("HTTP 500", Some(500)));
        }

        if let Some(pending) = state.pending.get_mut(user) {
            let mut still_pending = Vec::new();
            for (site, remaining) in pending.drain(..) {
                if remaining == 0 {
                    state
                        .followed
                        .entry(user.to_string())
                        .or_default()
                        .push(site);
                } else {
                    still_pending.push((site, remaining - 1));
                }
            }
            *pending = still_pending;
        }

        Ok(state.followed.get(user).cloned().unwrap_or_default())
    }

    fn follow_site(&self, _token: &Token, user: &str, site: &str) -> Result<()> {
        let mut guard = self.state();
        let state = &mut *guard;
        state.calls.follows += 1;

        if state.failing_follows.contains(site) {
            return Err(Error::http("HTTP 500", Some(500)));
        }
        if state.transient_follow_failures > 0 {
            state.transient_follow_failures -= 1;
            return Err(Error::http("HTTP 503", Some(503)));
        }
        if state.unapplied_follows.contains(site) {
            return Ok(());
        }

        let already_followed = state
            .followed
            .get(user)
            .is_some_and(|sites| sites.iter().any(|s| s.id == site));
        let already_pending = state
            .pending
            .get(user)
            .is_some_and(|sites| sites.iter().any(|(s, _)| s.id == site));
        if already_followed || already_pending {
            return Ok(());
        }

        let record = state.sites.get(site).cloned().unwrap_or_else(|| Site {
            id: site.to_string(),
            ..Default::default()
        });
        if state.verify_lag == 0 {
            state.followed.entry(user.to_string()).or_default().push(record);
        } else {
            let lag = state.verify_lag;
            state
                .pending
                .entry(user.to_string())
                .or_default()
                .push((record, lag));
        }
        Ok(())
    }

    fn get_site(&self, _token: &Token, site: &str) -> Result<Site> {
        let mut state = self.state();
        state.calls.site_lookups += 1;
        if state.failing_site_lookups.contains(site) {
            return Err(Error::http("HTTP 500", Some(500)));
        }
        state
            .sites
            .get(site)
            .cloned()
            .ok_or_else(|| Error::http(format!("site {site} not found"), Some(404)))
    }

    fn search_sites(&self, _token: &Token, query: &str) -> Result<Vec<Site>> {
        let mut state = self.state();
        state.calls.searches += 1;
        if state.failing_searches {
            return Err(Error::http("HTTP 500", Some(500)));
        }
        Ok(state
            .sites
            .values()
            .filter(|s| !query.is_empty() && s.web_url == query)
            .cloned()
            .collect())
    }
}
