//! Follow one site for one user, with post-write verification.
//!
//! Each pair runs through three phases:
//!
//! 1. **Check**: read the user's followed sites. If the target is already
//!    there, stop: no write is made.
//! 2. **Write + verify**: up to `max_attempts` times, ask the API to add the
//!    site, wait `retry_delay`, then re-read and look for it. A failed write
//!    counts as a failed attempt; every failure is retried the same way.
//! 3. **Exhaustion**: report the pair as unverified with the last error.
//!
//! The API accepting a write does not mean the follow is visible yet, so
//! `succeeded` (a write was accepted) and `verified` (a read confirmed it)
//! are reported separately.

use crate::backend::Backend;
use crate::error::Result;
use crate::types::{FollowOptions, FollowOutcome, Site, Token};
use std::thread;
use std::time::Duration;

/// Message recorded when writes were accepted but never became visible.
pub const VERIFICATION_FAILED: &str = "verification failed";

/// Message recorded for pairs skipped by a dry run.
pub const DRY_RUN: &str = "dry run";

/// Decides whether a followed site is the requested target.
///
/// The engine calls this for every entry in the user's followed list; the
/// first match wins.
pub trait SiteMatcher: Send + Sync {
    /// Whether `site` is the site identified by `target`.
    fn matches(&self, target: &str, site: &Site) -> bool;
}

/// Permissive matching: id, URL, short name or display name.
///
/// Callers may pass a site id, a composite `host:/sites/name` path or a URL,
/// and the API does not echo back the same form, so any of these counts:
///
/// - the site id equals the target
/// - the site URL contains the target (or its `host/path` form)
/// - the site short name equals the target's last path segment
/// - the site display name equals the target
#[derive(Debug, Clone, Copy, Default)]
pub struct LooseMatcher;

impl SiteMatcher for LooseMatcher {
    fn matches(&self, target: &str, site: &Site) -> bool {
        if target.is_empty() {
            return false;
        }
        if site.id == target {
            return true;
        }
        if !site.web_url.is_empty() {
            let url_form = composite_to_url_path(target);
            if site.web_url.contains(target) || site.web_url.contains(&url_form) {
                return true;
            }
        }
        let short = short_name(target);
        if !short.is_empty() && site.name == short {
            return true;
        }
        !site.display_name.is_empty() && site.display_name == target
    }
}

/// Strict matching on the opaque site id only.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactIdMatcher;

impl SiteMatcher for ExactIdMatcher {
    fn matches(&self, target: &str, site: &Site) -> bool {
        site.id == target
    }
}

/// `host:/sites/team` -> `host/sites/team`.
fn composite_to_url_path(target: &str) -> String {
    target.replacen(":/", "/", 1)
}

/// Last path segment of a composite id or URL.
fn short_name(target: &str) -> &str {
    target
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or_default()
}

/// Whether the user's followed list currently contains `site`.
///
/// # Errors
///
/// Propagates the read failure.
pub fn is_following(
    backend: &dyn Backend,
    token: &Token,
    user: &str,
    site: &str,
    matcher: &dyn SiteMatcher,
) -> Result<bool> {
    let followed = backend.followed_sites(token, user)?;
    Ok(followed.iter().any(|s| matcher.matches(site, s)))
}

/// Make `user` follow `site`, verifying the result.
///
/// Never fails: every error is captured in the returned outcome.
pub fn ensure_following(
    backend: &dyn Backend,
    token: &Token,
    user: &str,
    site: &str,
    options: &FollowOptions,
    matcher: &dyn SiteMatcher,
) -> FollowOutcome {
    let mut last_error: Option<String> = None;

    match is_following(backend, token, user, site, matcher) {
        Ok(true) => {
            log::debug!("{user} already follows {site}");
            return FollowOutcome::already_following(user, site);
        }
        Ok(false) => {}
        Err(e) => {
            log::warn!("Could not read followed sites for {user}: {e}");
            last_error = Some(e.to_string());
        }
    }

    if options.dry_run {
        return FollowOutcome {
            user: user.to_string(),
            site: site.to_string(),
            succeeded: false,
            verified: false,
            attempts: 0,
            last_error: Some(last_error.unwrap_or_else(|| DRY_RUN.to_string())),
        };
    }

    let mut succeeded = false;

    for attempt in 1..=options.max_attempts {
        match backend.follow_site(token, user, site) {
            Ok(()) => {
                succeeded = true;
                pause(options.retry_delay);

                match is_following(backend, token, user, site, matcher) {
                    Ok(true) => {
                        log::debug!("{user} follows {site} (attempt {attempt})");
                        return FollowOutcome {
                            user: user.to_string(),
                            site: site.to_string(),
                            succeeded: true,
                            verified: true,
                            attempts: attempt,
                            last_error: None,
                        };
                    }
                    Ok(false) => {
                        log::debug!("{user} -> {site}: write accepted but not visible yet");
                        last_error = Some(VERIFICATION_FAILED.to_string());
                    }
                    Err(e) => {
                        log::debug!("{user} -> {site}: verification read failed: {e}");
                        last_error = Some(e.to_string());
                    }
                }
            }
            Err(e) => {
                let kind = if e.category().is_transient() {
                    "transient"
                } else {
                    "permanent"
                };
                log::debug!(
                    "{user} -> {site}: attempt {attempt}/{} failed ({kind}): {e}",
                    options.max_attempts
                );
                last_error = Some(e.to_string());
            }
        }

        if attempt < options.max_attempts {
            pause(options.retry_delay);
        }
    }

    log::warn!(
        "{user} -> {site}: not verified after {} attempts",
        options.max_attempts
    );
    FollowOutcome {
        user: user.to_string(),
        site: site.to_string(),
        succeeded,
        verified: false,
        attempts: options.max_attempts,
        last_error: Some(last_error.unwrap_or_else(|| VERIFICATION_FAILED.to_string())),
    }
}

pub(crate) fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    fn token() -> Token {
        Token::new("t")
    }

    fn team_site() -> Site {
        Site::new(
            "contoso.sharepoint.com,1111,2222",
            "team",
            "Team Site",
            "https://contoso.sharepoint.com/sites/team",
        )
    }

    #[test]
    fn test_loose_matcher_fields() {
        let site = team_site();
        let m = LooseMatcher;
        assert!(m.matches("contoso.sharepoint.com,1111,2222", &site));
        assert!(m.matches("https://contoso.sharepoint.com/sites/team", &site));
        assert!(m.matches("contoso.sharepoint.com:/sites/team", &site));
        assert!(m.matches("team", &site));
        assert!(m.matches("Team Site", &site));
        assert!(!m.matches("other", &site));
        assert!(!m.matches("", &site));
    }

    #[test]
    fn test_loose_matcher_ignores_empty_fields() {
        let site = Site {
            id: "s1".to_string(),
            ..Default::default()
        };
        assert!(!LooseMatcher.matches("host:/", &site));
        assert!(!LooseMatcher.matches("x", &site));
    }

    #[test]
    fn test_exact_matcher() {
        let site = team_site();
        assert!(ExactIdMatcher.matches("contoso.sharepoint.com,1111,2222", &site));
        assert!(!ExactIdMatcher.matches("team", &site));
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("contoso.sharepoint.com:/sites/team"), "team");
        assert_eq!(short_name("https://x/sites/team/"), "team");
        assert_eq!(short_name("plain"), "plain");
    }

    #[test]
    fn test_already_following_performs_no_write() {
        let mock = MockBackend::new();
        mock.set_followed("u1", team_site());

        let outcome = ensure_following(
            &mock,
            &token(),
            "u1",
            "team",
            &FollowOptions::immediate(),
            &LooseMatcher,
        );
        assert_eq!(outcome, FollowOutcome::already_following("u1", "team"));
        assert_eq!(mock.calls().follows, 0);
        assert_eq!(mock.calls().followed_reads, 1);
    }

    #[test]
    fn test_first_attempt_verified() {
        let mock = MockBackend::new();
        mock.add_site(team_site());

        let outcome = ensure_following(
            &mock,
            &token(),
            "u1",
            "contoso.sharepoint.com,1111,2222",
            &FollowOptions::immediate(),
            &LooseMatcher,
        );
        assert!(outcome.succeeded);
        assert!(outcome.verified);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.last_error, None);
    }

    #[test]
    fn test_second_call_is_idempotent() {
        let mock = MockBackend::new();
        let opts = FollowOptions::immediate();

        let first = ensure_following(&mock, &token(), "u1", "s1", &opts, &LooseMatcher);
        assert!(first.verified);
        let writes = mock.calls().follows;

        let second = ensure_following(&mock, &token(), "u1", "s1", &opts, &LooseMatcher);
        assert!(second.verified);
        assert_eq!(second.attempts, 0);
        assert_eq!(mock.calls().follows, writes);
    }

    #[test]
    fn test_retry_cap_when_writes_always_fail() {
        let mock = MockBackend::new();
        mock.fail_follows_for("s1");

        let outcome = ensure_following(
            &mock,
            &token(),
            "u1",
            "s1",
            &FollowOptions::immediate(),
            &LooseMatcher,
        );
        assert!(!outcome.succeeded);
        assert!(!outcome.verified);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(mock.calls().follows, 3);
        assert!(outcome.last_error.unwrap().contains("500"));
    }

    #[test]
    fn test_custom_attempt_cap() {
        let mock = MockBackend::new();
        mock.fail_follows_for("s1");
        let opts = FollowOptions {
            max_attempts: 5,
            ..FollowOptions::immediate()
        };

        let outcome = ensure_following(&mock, &token(), "u1", "s1", &opts, &LooseMatcher);
        assert_eq!(outcome.attempts, 5);
        assert_eq!(mock.calls().follows, 5);
    }

    #[test]
    fn test_verification_lag_is_retried_not_failed() {
        let mock = MockBackend::new();
        mock.set_verify_lag(1);

        let outcome = ensure_following(
            &mock,
            &token(),
            "u1",
            "s1",
            &FollowOptions::immediate(),
            &LooseMatcher,
        );
        assert!(outcome.succeeded);
        assert!(outcome.verified);
        assert_eq!(outcome.attempts, 2);
    }

    #[test]
    fn test_transient_write_failure_recovers() {
        let mock = MockBackend::new();
        mock.fail_next_follows(2);

        let outcome = ensure_following(
            &mock,
            &token(),
            "u1",
            "s1",
            &FollowOptions::immediate(),
            &LooseMatcher,
        );
        assert!(outcome.verified);
        assert_eq!(outcome.attempts, 3);
    }

    #[test]
    fn test_accepted_but_never_visible() {
        let mock = MockBackend::new();
        mock.never_apply("s1");

        let outcome = ensure_following(
            &mock,
            &token(),
            "u1",
            "s1",
            &FollowOptions::immediate(),
            &LooseMatcher,
        );
        assert!(outcome.succeeded);
        assert!(!outcome.verified);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.last_error.as_deref(), Some(VERIFICATION_FAILED));
    }

    #[test]
    fn test_unreadable_follow_list_still_attempts_writes() {
        let mock = MockBackend::new();
        mock.fail_reads_for("u1");

        let outcome = ensure_following(
            &mock,
            &token(),
            "u1",
            "s1",
            &FollowOptions::immediate(),
            &LooseMatcher,
        );
        assert!(outcome.succeeded);
        assert!(!outcome.verified);
        assert_eq!(mock.calls().follows, 3);
    }

    #[test]
    fn test_dry_run_never_writes() {
        let mock = MockBackend::new();
        mock.set_followed("u1", team_site());
        let opts = FollowOptions {
            dry_run: true,
            ..FollowOptions::immediate()
        };

        let followed = ensure_following(&mock, &token(), "u1", "team", &opts, &LooseMatcher);
        assert!(followed.verified);

        let pending = ensure_following(&mock, &token(), "u1", "other", &opts, &LooseMatcher);
        assert!(!pending.succeeded);
        assert_eq!(pending.attempts, 0);
        assert_eq!(pending.last_error.as_deref(), Some(DRY_RUN));
        assert_eq!(mock.calls().follows, 0);
    }

    #[test]
    fn test_strict_matcher_is_pluggable() {
        let mock = MockBackend::new();
        mock.set_followed("u1", team_site());

        // Loose matching would accept "team"; strict matching writes instead.
        let outcome = ensure_following(
            &mock,
            &token(),
            "u1",
            "team",
            &FollowOptions::immediate(),
            &ExactIdMatcher,
        );
        assert_eq!(mock.calls().follows, 1);
        assert!(outcome.verified);
    }
}
