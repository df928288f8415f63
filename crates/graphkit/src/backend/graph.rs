//! Microsoft Graph backend.
//!
//! This module provides the [`GraphBackend`] implementation that talks to
//! the Graph REST API with a blocking `ureq` agent.
//!
//! # Rate Limiting
//!
//! Graph throttles per tenant and per app. The backend issues one request at
//! a time and never retries on its own; pacing is the caller's job.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{Credentials, DirectoryObject, Page, Site, Token, USER_ODATA_TYPE};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Default Graph API base.
pub const DEFAULT_GRAPH_URL: &str = "https://graph.microsoft.com/v1.0";

/// Default identity provider base.
pub const DEFAULT_LOGIN_URL: &str = "https://login.microsoftonline.com";

const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
const USER_AGENT: &str = concat!("graphkit/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

type Response = ureq::http::Response<ureq::Body>;

/// Graph REST backend.
///
/// # Example
///
/// ```no_run
/// use graphkit::backend::graph::GraphBackend;
/// use graphkit::backend::Backend;
/// use graphkit::Credentials;
///
/// let backend = GraphBackend::new();
/// let token = backend
///     .acquire_token(&Credentials::new("contoso.onmicrosoft.com", "app-id", "secret"))
///     .unwrap();
/// let sites = backend.followed_sites(&token, "adele@contoso.com").unwrap();
/// println!("Following {} sites", sites.len());
/// ```
pub struct GraphBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Graph API base URL.
    graph_url: String,
    /// Identity provider base URL.
    login_url: String,
}

impl GraphBackend {
    /// Create a backend against the public Graph endpoints.
    #[must_use]
    pub fn new() -> Self {
        Self::with_endpoints(DEFAULT_GRAPH_URL, DEFAULT_LOGIN_URL)
    }

    /// Create a backend with custom endpoints (sovereign clouds, beta API).
    #[must_use]
    pub fn with_endpoints(graph_url: impl Into<String>, login_url: impl Into<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build();
        Self {
            agent: config.into(),
            graph_url: graph_url.into().trim_end_matches('/').to_string(),
            login_url: login_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn token_url(&self, tenant: &str) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.login_url, tenant)
    }

    fn group_members_url(&self, group_id: &str) -> String {
        format!("{}/groups/{}/members", self.graph_url, group_id)
    }

    fn users_url(&self) -> String {
        format!("{}/users?$select=id,userPrincipalName", self.graph_url)
    }

    fn user_url(&self, user: &str) -> String {
        format!("{}/users/{}", self.graph_url, user)
    }

    fn followed_sites_url(&self, user: &str) -> String {
        format!("{}/users/{}/followedSites", self.graph_url, user)
    }

    fn follow_url(&self, user: &str) -> String {
        format!("{}/users/{}/followedSites/add", self.graph_url, user)
    }

    fn site_url(&self, site: &str) -> String {
        format!("{}/sites/{}", self.graph_url, site)
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/sites?search={}",
            self.graph_url,
            urlencoding::encode(query)
        )
    }

    fn get(&self, token: &Token, url: &str) -> Result<Response> {
        log::debug!("GET {url}");
        let response = self
            .agent
            .get(url)
            .header("Authorization", format!("Bearer {}", token.as_str()))
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .call()?;
        check_status(response)
    }

    fn get_json<T: DeserializeOwned>(&self, token: &Token, url: &str) -> Result<T> {
        let mut response = self.get(token, url)?;
        response
            .body_mut()
            .read_json()
            .map_err(|e| Error::InvalidResponse(e.to_string()))
    }

    fn page(&self, token: &Token, url: &str) -> Result<Page<DirectoryObject>> {
        let collection: GraphCollection<DirectoryObject> = self.get_json(token, url)?;
        Ok(Page {
            items: collection.value,
            next_link: collection.next_link,
        })
    }
}

impl Default for GraphBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for GraphBackend {
    fn acquire_token(&self, credentials: &Credentials) -> Result<Token> {
        let url = self.token_url(&credentials.tenant_id);
        log::debug!("POST {url}");

        let mut response = self
            .agent
            .post(&url)
            .header("User-Agent", USER_AGENT)
            .send_form([
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("scope", GRAPH_SCOPE),
                ("grant_type", "client_credentials"),
            ])
            .map_err(|e| Error::auth(e.to_string(), None))?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| Error::auth(e.to_string(), Some(status)))?;

        if !response.status().is_success() {
            let message = error_message(&body).unwrap_or_else(|| format!("HTTP {status}"));
            return Err(Error::auth(message, Some(status)));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| Error::auth(format!("malformed token response: {e}"), Some(status)))?;
        Ok(Token::new(token.access_token))
    }

    fn group_members(
        &self,
        token: &Token,
        group_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<DirectoryObject>> {
        let url = cursor.map_or_else(|| self.group_members_url(group_id), str::to_string);
        self.page(token, &url)
    }

    fn users(&self, token: &Token, cursor: Option<&str>) -> Result<Page<DirectoryObject>> {
        let url = cursor.map_or_else(|| self.users_url(), str::to_string);
        let mut page = self.page(token, &url)?;
        // $select drops @odata.type; everything under /users is a user.
        for object in &mut page.items {
            object
                .odata_type
                .get_or_insert_with(|| USER_ODATA_TYPE.to_string());
        }
        Ok(page)
    }

    fn get_user(&self, token: &Token, user: &str) -> Result<DirectoryObject> {
        let mut object: DirectoryObject = self.get_json(token, &self.user_url(user))?;
        object
            .odata_type
            .get_or_insert_with(|| USER_ODATA_TYPE.to_string());
        Ok(object)
    }

    fn followed_sites(&self, token: &Token, user: &str) -> Result<Vec<Site>> {
        let mut sites = Vec::new();
        let mut url = Some(self.followed_sites_url(user));

        while let Some(current) = url {
            let collection: GraphCollection<GraphSite> = self.get_json(token, &current)?;
            sites.extend(collection.value.into_iter().map(Site::from));
            url = collection.next_link;
        }

        Ok(sites)
    }

    fn follow_site(&self, token: &Token, user: &str, site: &str) -> Result<()> {
        let url = self.follow_url(user);
        log::debug!("POST {url} ({site})");

        let body = serde_json::json!({ "value": [{ "id": site }] });
        let response = self
            .agent
            .post(&url)
            .header("Authorization", format!("Bearer {}", token.as_str()))
            .header("User-Agent", USER_AGENT)
            .send_json(&body)?;
        let mut response = check_status(response)?;
        let text = response.body_mut().read_to_string()?;
        add_response(&text)
    }

    fn get_site(&self, token: &Token, site: &str) -> Result<Site> {
        let site: GraphSite = self.get_json(token, &self.site_url(site))?;
        Ok(site.into())
    }

    fn search_sites(&self, token: &Token, query: &str) -> Result<Vec<Site>> {
        let collection: GraphCollection<GraphSite> =
            self.get_json(token, &self.search_url(query))?;
        Ok(collection.value.into_iter().map(Into::into).collect())
    }
}

/// Interpret the body of a successful `followedSites/add`.
///
/// An empty body is accepted. A body must otherwise echo at least one site
/// in `value`.
fn add_response(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Ok(());
    }
    let collection: GraphCollection<serde_json::Value> = serde_json::from_str(text)?;
    if collection.value.is_empty() {
        return Err(Error::InvalidResponse(
            "write returned no site".to_string(),
        ));
    }
    Ok(())
}

/// Turn a non-2xx response into `Error::Http`, keeping the API's message.
fn check_status(mut response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let code = status.as_u16();
    let body = response.body_mut().read_to_string().unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| format!("HTTP {code}"));
    log::debug!("HTTP {code}: {message}");
    Err(Error::http(message, Some(code)))
}

/// Extract a readable message from a Graph or identity-provider error body.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;

    // Identity provider: {"error": "invalid_client", "error_description": "..."}
    if let Some(code) = error.as_str() {
        return Some(
            value
                .get("error_description")
                .and_then(serde_json::Value::as_str)
                .map_or_else(|| code.to_string(), |d| format!("{code}: {d}")),
        );
    }

    // Graph: {"error": {"code": "...", "message": "..."}}
    let code = error.get("code").and_then(serde_json::Value::as_str);
    let message = error.get("message").and_then(serde_json::Value::as_str);
    match (code, message) {
        (Some(c), Some(m)) => Some(format!("{c}: {m}")),
        (Some(c), None) => Some(c.to_string()),
        (None, Some(m)) => Some(m.to_string()),
        (None, None) => None,
    }
}

// =============================================================================
// Graph API response types
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GraphCollection<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphSite {
    id: String,
    name: Option<String>,
    display_name: Option<String>,
    web_url: Option<String>,
    description: Option<String>,
    last_modified_date_time: Option<String>,
    created_date_time: Option<String>,
}

impl From<GraphSite> for Site {
    fn from(s: GraphSite) -> Self {
        Self {
            id: s.id,
            name: s.name.unwrap_or_default(),
            display_name: s.display_name.unwrap_or_default(),
            web_url: s.web_url.unwrap_or_default(),
            description: s.description,
            last_modified: s.last_modified_date_time,
            created_at: s.created_date_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints() {
        let backend = GraphBackend::default();
        assert_eq!(backend.graph_url, "https://graph.microsoft.com/v1.0");
        assert_eq!(
            backend.token_url("contoso.onmicrosoft.com"),
            "https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_custom_endpoints_trim_trailing_slash() {
        let backend = GraphBackend::with_endpoints(
            "https://graph.microsoft.com/beta/",
            "https://login.microsoftonline.us/",
        );
        assert_eq!(backend.graph_url, "https://graph.microsoft.com/beta");
        assert_eq!(
            backend.token_url("t"),
            "https://login.microsoftonline.us/t/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_resource_urls() {
        let backend = GraphBackend::new();
        assert_eq!(
            backend.group_members_url("g1"),
            "https://graph.microsoft.com/v1.0/groups/g1/members"
        );
        assert_eq!(
            backend.users_url(),
            "https://graph.microsoft.com/v1.0/users?$select=id,userPrincipalName"
        );
        assert_eq!(
            backend.user_url("a@x.com"),
            "https://graph.microsoft.com/v1.0/users/a@x.com"
        );
        assert_eq!(
            backend.followed_sites_url("u1"),
            "https://graph.microsoft.com/v1.0/users/u1/followedSites"
        );
        assert_eq!(
            backend.follow_url("u1"),
            "https://graph.microsoft.com/v1.0/users/u1/followedSites/add"
        );
        assert_eq!(
            backend.site_url("contoso.sharepoint.com:/sites/team"),
            "https://graph.microsoft.com/v1.0/sites/contoso.sharepoint.com:/sites/team"
        );
    }

    #[test]
    fn test_search_url_encodes_query() {
        let backend = GraphBackend::new();
        assert_eq!(
            backend.search_url("https://contoso.sharepoint.com/sites/my team"),
            "https://graph.microsoft.com/v1.0/sites?search=https%3A%2F%2Fcontoso.sharepoint.com%2Fsites%2Fmy%20team"
        );
    }

    #[test]
    fn test_error_message_graph_shape() {
        let body = r#"{"error":{"code":"itemNotFound","message":"Site not found"}}"#;
        assert_eq!(
            error_message(body).as_deref(),
            Some("itemNotFound: Site not found")
        );
    }

    #[test]
    fn test_error_message_identity_shape() {
        let body = r#"{"error":"invalid_client","error_description":"AADSTS7000215"}"#;
        assert_eq!(
            error_message(body).as_deref(),
            Some("invalid_client: AADSTS7000215")
        );
    }

    #[test]
    fn test_error_message_unparseable() {
        assert_eq!(error_message("<html>Bad Gateway</html>"), None);
        assert_eq!(error_message(r#"{"ok":true}"#), None);
    }

    #[test]
    fn test_add_response_empty_body_accepted() {
        assert!(add_response("").is_ok());
        assert!(add_response("  \n").is_ok());
    }

    #[test]
    fn test_add_response_with_site_accepted() {
        let body = r#"{"value":[{"id":"contoso.sharepoint.com,1111,2222"}]}"#;
        assert!(add_response(body).is_ok());
    }

    #[test]
    fn test_add_response_without_site_rejected() {
        let err = add_response(r#"{"value":[]}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(ref m) if m == "write returned no site"));

        let err = add_response(r#"{"@odata.context":"x"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn test_add_response_malformed_body() {
        let err = add_response("<html>").unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Format);
    }

    #[test]
    fn test_collection_with_next_link() {
        let json = r##"{
            "@odata.nextLink": "https://graph.microsoft.com/v1.0/groups/g1/members?$skiptoken=abc",
            "value": [
                {"@odata.type": "#microsoft.graph.user", "id": "u1"},
                {"@odata.type": "#microsoft.graph.group", "id": "g2"}
            ]
        }"##;
        let page: GraphCollection<DirectoryObject> = serde_json::from_str(json).unwrap();
        assert_eq!(page.value.len(), 2);
        assert!(page.value[0].is_user());
        assert!(!page.value[1].is_user());
        assert!(page.next_link.unwrap().contains("skiptoken"));
    }

    #[test]
    fn test_graph_site_conversion() {
        let json = r#"{
            "id": "contoso.sharepoint.com,1111,2222",
            "name": "team",
            "displayName": "Team Site",
            "webUrl": "https://contoso.sharepoint.com/sites/team",
            "description": "Shared workspace",
            "lastModifiedDateTime": "2024-03-01T10:00:00Z",
            "createdDateTime": "2023-01-01T00:00:00Z"
        }"#;
        let site: Site = serde_json::from_str::<GraphSite>(json).unwrap().into();
        assert_eq!(site.id, "contoso.sharepoint.com,1111,2222");
        assert_eq!(site.display_name, "Team Site");
        assert_eq!(site.web_url, "https://contoso.sharepoint.com/sites/team");
        assert_eq!(site.last_modified.as_deref(), Some("2024-03-01T10:00:00Z"));
    }

    #[test]
    fn test_graph_site_conversion_with_defaults() {
        let site: Site = serde_json::from_str::<GraphSite>(r#"{"id":"s1"}"#)
            .unwrap()
            .into();
        assert_eq!(site.id, "s1");
        assert_eq!(site.name, "");
        assert_eq!(site.description, None);
    }
}
