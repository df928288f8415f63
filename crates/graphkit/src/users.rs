//! User-set resolution.
//!
//! Merges explicitly named users with members expanded from a group (or the
//! whole tenant) into one ordered, deduplicated list.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{DirectoryObject, Page, ResolveOptions, Token, UserSource};
use std::collections::HashSet;

/// Resolve the set of users to process.
///
/// Explicit ids are taken verbatim; only empty strings are dropped.
/// Directory failures while expanding `source` are logged and degrade to
/// whatever was collected so far; the explicit users are always kept.
/// Deduplication is by exact, case-sensitive string match with first-seen
/// order preserved.
///
/// # Errors
///
/// Returns `Error::NoUsers` if nothing is left to process.
pub fn resolve(
    backend: &dyn Backend,
    token: &Token,
    explicit: &[String],
    source: &UserSource,
    options: &ResolveOptions,
) -> Result<Vec<String>> {
    let mut candidates: Vec<String> = explicit
        .iter()
        .filter(|u| !u.is_empty())
        .cloned()
        .collect();

    match source {
        UserSource::None => {}
        UserSource::Group(group_id) => {
            let members = collect_pages(|cursor| backend.group_members(token, group_id, cursor));
            let total = members.len();
            let users: Vec<String> = members
                .into_iter()
                .filter(DirectoryObject::is_user)
                .map(|m| m.id)
                .collect();
            log::info!(
                "Group {group_id}: {} user members ({} non-user members skipped)",
                users.len(),
                total - users.len()
            );
            candidates.extend(users);
        }
        UserSource::AllUsers => {
            let users = collect_pages(|cursor| backend.users(token, cursor));
            log::info!("Tenant: {} users", users.len());
            candidates.extend(users.into_iter().map(|u| u.id));
        }
    }

    let mut users = dedup(candidates);

    if options.validate {
        users.retain(|user| match backend.get_user(token, user) {
            Ok(object) => {
                if let Some(upn) = &object.user_principal_name {
                    log::debug!("User {user} is {upn}");
                }
                true
            }
            Err(e) => {
                log::warn!("Skipping user {user}: {e}");
                false
            }
        });
    }

    if users.is_empty() {
        return Err(Error::NoUsers);
    }
    Ok(users)
}

/// Follow continuation cursors until exhausted or a page fails.
fn collect_pages<F>(mut fetch: F) -> Vec<DirectoryObject>
where
    F: FnMut(Option<&str>) -> Result<Page<DirectoryObject>>,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        match fetch(cursor.as_deref()) {
            Ok(page) => {
                items.extend(page.items);
                match page.next_link {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
            Err(e) => {
                log::warn!(
                    "Directory enumeration failed after {} entries: {e}",
                    items.len()
                );
                break;
            }
        }
    }

    items
}

/// Exact-match dedup, keeping first-seen order.
fn dedup(users: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    users
        .into_iter()
        .filter(|u| seen.insert(u.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    fn token() -> Token {
        Token::new("t")
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_explicit_users_only() {
        let mock = MockBackend::new();
        let users = resolve(
            &mock,
            &token(),
            &strings(&["u1", "u2"]),
            &UserSource::None,
            &ResolveOptions::default(),
        )
        .unwrap();
        assert_eq!(users, strings(&["u1", "u2"]));
        assert_eq!(mock.calls().group_pages, 0);
    }

    #[test]
    fn test_dedup_across_explicit_and_group() {
        let mock = MockBackend::new();
        mock.set_group_pages("g1", vec![vec![DirectoryObject::user("a@x.com")]]);

        let users = resolve(
            &mock,
            &token(),
            &strings(&["a@x.com", "a@x.com"]),
            &UserSource::Group("g1".to_string()),
            &ResolveOptions::default(),
        )
        .unwrap();
        assert_eq!(users, strings(&["a@x.com"]));
    }

    #[test]
    fn test_explicit_ids_kept_verbatim() {
        let mock = MockBackend::new();
        let users = resolve(
            &mock,
            &token(),
            &strings(&["", " u1", "u1", ""]),
            &UserSource::None,
            &ResolveOptions::default(),
        )
        .unwrap();
        assert_eq!(users, strings(&[" u1", "u1"]));
    }

    #[test]
    fn test_dedup_is_case_sensitive() {
        let users = dedup(strings(&["A@x.com", "a@x.com", "A@x.com"]));
        assert_eq!(users, strings(&["A@x.com", "a@x.com"]));
    }

    #[test]
    fn test_group_pages_are_followed_and_non_users_skipped() {
        let mock = MockBackend::new();
        mock.set_group_pages(
            "g1",
            vec![
                vec![
                    DirectoryObject::user("u1"),
                    DirectoryObject::typed("g2", "#microsoft.graph.group"),
                ],
                vec![
                    DirectoryObject::typed("sp1", "#microsoft.graph.servicePrincipal"),
                    DirectoryObject::user("u2"),
                ],
            ],
        );

        let users = resolve(
            &mock,
            &token(),
            &strings(&["u0"]),
            &UserSource::Group("g1".to_string()),
            &ResolveOptions::default(),
        )
        .unwrap();
        assert_eq!(users, strings(&["u0", "u1", "u2"]));
        assert_eq!(mock.calls().group_pages, 2);
    }

    #[test]
    fn test_unreachable_group_degrades_to_explicit_users() {
        let mock = MockBackend::new();

        let users = resolve(
            &mock,
            &token(),
            &strings(&["u1"]),
            &UserSource::Group("missing".to_string()),
            &ResolveOptions::default(),
        )
        .unwrap();
        assert_eq!(users, strings(&["u1"]));
    }

    #[test]
    fn test_group_failure_keeps_pages_already_fetched() {
        let mock = MockBackend::new();
        mock.set_group_pages(
            "g1",
            vec![vec![DirectoryObject::user("u1")], vec![DirectoryObject::user("u2")]],
        );
        mock.fail_group_page("g1", 1);

        let users = resolve(
            &mock,
            &token(),
            &[],
            &UserSource::Group("g1".to_string()),
            &ResolveOptions::default(),
        )
        .unwrap();
        assert_eq!(users, strings(&["u1"]));
    }

    #[test]
    fn test_empty_set_fails_fast() {
        let mock = MockBackend::new();
        let err = resolve(
            &mock,
            &token(),
            &strings(&["", "  "]),
            &UserSource::Group("missing".to_string()),
            &ResolveOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NoUsers));
    }

    #[test]
    fn test_all_users() {
        let mock = MockBackend::new();
        mock.set_user_pages(vec![
            vec![DirectoryObject::user("u1"), DirectoryObject::user("u2")],
            vec![DirectoryObject::user("u3")],
        ]);

        let users = resolve(
            &mock,
            &token(),
            &strings(&["u2"]),
            &UserSource::AllUsers,
            &ResolveOptions::default(),
        )
        .unwrap();
        assert_eq!(users, strings(&["u2", "u1", "u3"]));
        assert_eq!(mock.calls().user_pages, 2);
    }

    #[test]
    fn test_validation_drops_unknown_users() {
        let mock = MockBackend::new();
        mock.set_known_users(["u1"]);

        let users = resolve(
            &mock,
            &token(),
            &strings(&["u1", "ghost"]),
            &UserSource::None,
            &ResolveOptions { validate: true },
        )
        .unwrap();
        assert_eq!(users, strings(&["u1"]));
        assert_eq!(mock.calls().user_lookups, 2);
    }

    #[test]
    fn test_validation_can_empty_the_set() {
        let mock = MockBackend::new();
        mock.set_known_users(Vec::<String>::new());

        let err = resolve(
            &mock,
            &token(),
            &strings(&["ghost"]),
            &UserSource::None,
            &ResolveOptions { validate: true },
        )
        .unwrap_err();
        assert!(matches!(err, Error::NoUsers));
    }
}
