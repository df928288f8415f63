//! # graphkit
//!
//! Blocking Microsoft Graph client for managing followed SharePoint sites in
//! bulk.
//!
//! This crate provides functionality for:
//! - Authenticating as a service principal (client-credential grant)
//! - Resolving users from explicit ids, a group, or the whole tenant
//! - Following sites on behalf of users, with retry and post-write verification
//! - Listing the sites a user follows, optionally enriched per site
//!
//! ## Example
//!
//! ```no_run
//! use graphkit::{Client, Credentials, FollowOptions, LooseMatcher, NoProgress, UserSource};
//! use graphkit::ResolveOptions;
//!
//! let client = Client::new();
//! let token = client
//!     .authenticate(&Credentials::new("contoso.onmicrosoft.com", "app-id", "secret"))
//!     .expect("authentication failed");
//!
//! let users = client
//!     .resolve_users(
//!         &token,
//!         &["adele@contoso.com".to_string()],
//!         &UserSource::Group("3f2504e0-4f89-11d3-9a0c-0305e82c3301".to_string()),
//!         &ResolveOptions::default(),
//!     )
//!     .expect("no users");
//!
//! let sites = vec!["contoso.sharepoint.com:/sites/team".to_string()];
//! let report = client.follow_all(
//!     &token,
//!     &users,
//!     &sites,
//!     &FollowOptions::default(),
//!     &LooseMatcher,
//!     &mut NoProgress,
//! );
//!
//! let summary = report.summary();
//! println!("{}/{} verified", summary.verified, summary.total);
//! ```
//!
//! ## Execution model
//!
//! Pairs are processed one at a time, in user-major order, with a fixed
//! delay between pairs. There is no concurrency: Graph throttles per tenant
//! and sequential calls keep a run well inside the limits.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod backend;
pub mod error;
pub mod follow;
pub mod reader;
pub mod report;
pub mod types;
pub mod users;

pub use error::{Error, ErrorCategory, Result};
pub use follow::{ExactIdMatcher, LooseMatcher, SiteMatcher};
pub use report::{PairRef, Report, Summary};
pub use types::{
    Credentials, Detail, DirectoryObject, FollowOptions, FollowOutcome, FollowedSite, Page,
    ResolveOptions, Site, Token, UserSource,
};

pub use backend::MockBackend;
use backend::Backend;
use backend::graph::GraphBackend;

/// Progress notifications from [`Client::follow_all`].
pub trait ProgressCallback {
    /// Called once before the first pair.
    fn on_start(&mut self, total: usize);

    /// Called before a pair is processed.
    fn on_pair_start(&mut self, user: &str, site: &str);

    /// Called after a pair is processed.
    fn on_pair_complete(&mut self, outcome: &FollowOutcome);

    /// Called once after the last pair.
    fn on_finish(&mut self);
}

/// No-op progress callback.
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_start(&mut self, _total: usize) {}
    fn on_pair_start(&mut self, _user: &str, _site: &str) {}
    fn on_pair_complete(&mut self, _outcome: &FollowOutcome) {}
    fn on_finish(&mut self) {}
}

/// High-level client for follow operations.
///
/// # Example
///
/// ```
/// use graphkit::{Client, Credentials, FollowOptions, LooseMatcher, MockBackend, NoProgress};
///
/// let client = Client::with_backend(Box::new(MockBackend::new()));
/// let token = client.authenticate(&Credentials::new("t", "c", "s")).unwrap();
///
/// let users = vec!["u1".to_string(), "u2".to_string()];
/// let sites = vec!["siteA".to_string()];
/// let report = client.follow_all(
///     &token,
///     &users,
///     &sites,
///     &FollowOptions::immediate(),
///     &LooseMatcher,
///     &mut NoProgress,
/// );
/// assert_eq!(report.summary().verified, 2);
/// ```
pub struct Client {
    backend: Box<dyn Backend>,
}

impl Client {
    /// Create a new Client with the default Graph backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            backend: Box::new(GraphBackend::new()),
        }
    }

    /// Create a client against custom Graph and login endpoints.
    #[must_use]
    pub fn with_endpoints(graph_url: impl Into<String>, login_url: impl Into<String>) -> Self {
        Self {
            backend: Box::new(GraphBackend::with_endpoints(graph_url, login_url)),
        }
    }

    /// Create a client with a custom backend (useful for testing).
    #[must_use]
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Exchange credentials for the run's bearer token.
    ///
    /// Call once per run and reuse the token for every other operation.
    pub fn authenticate(&self, credentials: &Credentials) -> Result<Token> {
        auth::acquire_token(self.backend.as_ref(), credentials)
    }

    /// Resolve the users to process.
    pub fn resolve_users(
        &self,
        token: &Token,
        explicit: &[String],
        source: &UserSource,
        options: &ResolveOptions,
    ) -> Result<Vec<String>> {
        users::resolve(self.backend.as_ref(), token, explicit, source, options)
    }

    /// Make one user follow one site.
    pub fn ensure_following(
        &self,
        token: &Token,
        user: &str,
        site: &str,
        options: &FollowOptions,
        matcher: &dyn SiteMatcher,
    ) -> FollowOutcome {
        follow::ensure_following(self.backend.as_ref(), token, user, site, options, matcher)
    }

    /// Process every (user, site) pair in sequence.
    ///
    /// Produces exactly `users.len() * sites.len()` outcomes. Per-pair
    /// failures are recorded, never propagated.
    pub fn follow_all(
        &self,
        token: &Token,
        users: &[String],
        sites: &[String],
        options: &FollowOptions,
        matcher: &dyn SiteMatcher,
        progress: &mut dyn ProgressCallback,
    ) -> Report {
        let total = users.len() * sites.len();
        let mut report = Report::new();
        progress.on_start(total);

        for (index, (user, site)) in users
            .iter()
            .flat_map(|u| sites.iter().map(move |s| (u, s)))
            .enumerate()
        {
            if index > 0 {
                follow::pause(options.pair_delay);
            }
            progress.on_pair_start(user, site);
            let outcome = self.ensure_following(token, user, site, options, matcher);
            progress.on_pair_complete(&outcome);
            report.record(outcome);
        }

        progress.on_finish();
        log::info!("Processed {} pairs", report.len());
        report
    }

    /// List the sites a user follows.
    pub fn list_followed(
        &self,
        token: &Token,
        user: &str,
        include_details: bool,
    ) -> Result<Vec<FollowedSite>> {
        reader::list_followed(self.backend.as_ref(), token, user, include_details)
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(mock: &MockBackend) -> Client {
        Client::with_backend(Box::new(mock.clone()))
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[derive(Default)]
    struct Recorder {
        total: usize,
        started: Vec<(String, String)>,
        completed: usize,
        finished: bool,
    }

    impl ProgressCallback for Recorder {
        fn on_start(&mut self, total: usize) {
            self.total = total;
        }
        fn on_pair_start(&mut self, user: &str, site: &str) {
            self.started.push((user.to_string(), site.to_string()));
        }
        fn on_pair_complete(&mut self, _outcome: &FollowOutcome) {
            self.completed += 1;
        }
        fn on_finish(&mut self) {
            self.finished = true;
        }
    }

    #[test]
    fn test_example_scenario() {
        let mock = MockBackend::new();
        let client = client(&mock);
        let token = client.authenticate(&Credentials::new("t", "c", "s")).unwrap();

        let report = client.follow_all(
            &token,
            &strings(&["u1", "u2"]),
            &strings(&["siteA"]),
            &FollowOptions::immediate(),
            &LooseMatcher,
            &mut NoProgress,
        );

        assert_eq!(report.len(), 2);
        for outcome in report.outcomes() {
            assert!(outcome.succeeded);
            assert!(outcome.verified);
            assert_eq!(outcome.attempts, 1);
        }
        let summary = report.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.verified, 2);
    }

    #[test]
    fn test_full_cross_product_even_with_failures() {
        let mock = MockBackend::new();
        mock.fail_follows_for("s2");
        mock.never_apply("s3");
        let client = client(&mock);
        let token = client.authenticate(&Credentials::new("t", "c", "s")).unwrap();

        let users = strings(&["u1", "u2", "u3"]);
        let sites = strings(&["s1", "s2", "s3"]);
        let mut recorder = Recorder::default();
        let report = client.follow_all(
            &token,
            &users,
            &sites,
            &FollowOptions::immediate(),
            &LooseMatcher,
            &mut recorder,
        );

        assert_eq!(report.len(), users.len() * sites.len());
        assert_eq!(recorder.total, 9);
        assert_eq!(recorder.completed, 9);
        assert!(recorder.finished);
        assert_eq!(
            recorder.started[..3],
            [
                ("u1".to_string(), "s1".to_string()),
                ("u1".to_string(), "s2".to_string()),
                ("u1".to_string(), "s3".to_string()),
            ]
        );

        let summary = report.summary();
        assert_eq!(summary.verified, 3);
        assert_eq!(summary.succeeded, 6);
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.unverified.len(), 6);
    }

    #[test]
    fn test_token_fetched_once_per_run() {
        let mock = MockBackend::new();
        mock.set_group_pages("g1", vec![vec![DirectoryObject::user("u2")]]);
        let client = client(&mock);

        let token = client.authenticate(&Credentials::new("t", "c", "s")).unwrap();
        let users = client
            .resolve_users(
                &token,
                &strings(&["u1"]),
                &UserSource::Group("g1".to_string()),
                &ResolveOptions::default(),
            )
            .unwrap();
        client.follow_all(
            &token,
            &users,
            &strings(&["s1", "s2"]),
            &FollowOptions::immediate(),
            &LooseMatcher,
            &mut NoProgress,
        );
        client.list_followed(&token, "u1", true).unwrap();

        assert_eq!(mock.calls().token, 1);
    }

    #[test]
    fn test_group_failure_run_still_completes() {
        let mock = MockBackend::new();
        let client = client(&mock);
        let token = client.authenticate(&Credentials::new("t", "c", "s")).unwrap();

        let users = client
            .resolve_users(
                &token,
                &strings(&["u1", "u2"]),
                &UserSource::Group("unreachable".to_string()),
                &ResolveOptions::default(),
            )
            .unwrap();
        let report = client.follow_all(
            &token,
            &users,
            &strings(&["s1"]),
            &FollowOptions::immediate(),
            &LooseMatcher,
            &mut NoProgress,
        );

        assert_eq!(report.len(), 2);
        assert!(report.summary().is_success());
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let mock = MockBackend::new();
        let client = client(&mock);
        let token = client.authenticate(&Credentials::new("t", "c", "s")).unwrap();
        let users = strings(&["u1", "u2"]);
        let sites = strings(&["s1"]);
        let opts = FollowOptions::immediate();

        client.follow_all(&token, &users, &sites, &opts, &LooseMatcher, &mut NoProgress);
        let writes = mock.calls().follows;

        let second = client.follow_all(&token, &users, &sites, &opts, &LooseMatcher, &mut NoProgress);
        assert_eq!(mock.calls().follows, writes);
        assert_eq!(second.summary().already_following, 2);
    }
}
