//! Read path: list the sites a user follows.

use crate::backend::Backend;
use crate::error::Result;
use crate::types::{FollowedSite, Site, Token};

/// List the sites `user` follows.
///
/// With `include_details`, each site is enriched with its own metadata:
/// first by id, then by searching for its URL. When both lookups fail the
/// detail fields are set to [`Detail::Unavailable`](crate::Detail::Unavailable)
/// and the listing carries on.
///
/// # Errors
///
/// Fails only if the base listing cannot be read.
pub fn list_followed(
    backend: &dyn Backend,
    token: &Token,
    user: &str,
    include_details: bool,
) -> Result<Vec<FollowedSite>> {
    let sites = backend.followed_sites(token, user)?;
    log::info!("{user} follows {} sites", sites.len());

    let mut followed: Vec<FollowedSite> = sites.into_iter().map(FollowedSite::from).collect();
    if include_details {
        for site in &mut followed {
            match lookup_details(backend, token, site) {
                Some(details) => site.enrich(details),
                None => site.mark_unavailable(),
            }
        }
    }
    Ok(followed)
}

fn lookup_details(backend: &dyn Backend, token: &Token, site: &FollowedSite) -> Option<Site> {
    match backend.get_site(token, &site.id) {
        Ok(details) => return Some(details),
        Err(e) => log::debug!("Lookup by id failed for {}: {e}", site.id),
    }

    if site.web_url.is_empty() {
        log::warn!("No details available for {}", site.id);
        return None;
    }

    match backend.search_sites(token, &site.web_url) {
        Ok(mut results) => {
            // Prefer an exact URL hit, else the first result.
            let index = results
                .iter()
                .position(|s| s.web_url == site.web_url)
                .unwrap_or(0);
            if index < results.len() {
                Some(results.swap_remove(index))
            } else {
                log::warn!("No details available for {}: search found nothing", site.id);
                None
            }
        }
        Err(e) => {
            log::warn!("No details available for {}: {e}", site.id);
            None
        }
    }
}
