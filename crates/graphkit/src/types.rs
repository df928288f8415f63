//! Core types for site-follow management.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// OData type tag carried by user-typed directory objects.
pub const USER_ODATA_TYPE: &str = "#microsoft.graph.user";

// =============================================================================
// Credentials and tokens
// =============================================================================

/// Service-principal credentials for the client-credential grant.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Directory (tenant) id or verified domain.
    pub tenant_id: String,
    /// Application (client) id.
    pub client_id: String,
    /// Application secret.
    pub client_secret: String,
}

impl Credentials {
    /// Create credentials from the three required fields.
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

// Keep the secret out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Opaque bearer token, minted once per run.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Wrap a raw access token.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw token value for the Authorization header.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

// =============================================================================
// Directory objects
// =============================================================================

/// A member entry returned by group or user enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryObject {
    /// Directory object id.
    pub id: String,
    /// OData type tag, e.g. `#microsoft.graph.user`.
    #[serde(rename = "@odata.type", default)]
    pub odata_type: Option<String>,
    /// User principal name, when the object is a user.
    #[serde(rename = "userPrincipalName", default)]
    pub user_principal_name: Option<String>,
}

impl DirectoryObject {
    /// Create a user-typed directory object.
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            odata_type: Some(USER_ODATA_TYPE.to_string()),
            user_principal_name: None,
        }
    }

    /// Create a directory object with an arbitrary type tag.
    pub fn typed(id: impl Into<String>, odata_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            odata_type: Some(odata_type.into()),
            user_principal_name: None,
        }
    }

    /// Whether the type tag marks this object as a user principal.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.odata_type.as_deref() == Some(USER_ODATA_TYPE)
    }
}

/// One page of a paged collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Continuation cursor for the next page, if any.
    pub next_link: Option<String>,
}

/// Where to resolve users from, in addition to the explicit list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UserSource {
    /// Explicit users only.
    #[default]
    None,
    /// Members of a directory group.
    Group(String),
    /// Every user in the tenant.
    AllUsers,
}

/// Options for user resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Drop users that fail an existence lookup.
    pub validate: bool,
}

// =============================================================================
// Sites
// =============================================================================

/// A site as returned by the remote API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    /// Opaque site id (`host,siteGuid,webGuid`).
    pub id: String,
    /// Short name (last path segment).
    pub name: String,
    /// Display name.
    pub display_name: String,
    /// Absolute web URL.
    pub web_url: String,
    /// Description, if present.
    pub description: Option<String>,
    /// Last modification timestamp (RFC 3339).
    pub last_modified: Option<String>,
    /// Creation timestamp (RFC 3339).
    pub created_at: Option<String>,
}

impl Site {
    /// Create a site with the identifying fields set.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        display_name: impl Into<String>,
        web_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            display_name: display_name.into(),
            web_url: web_url.into(),
            ..Default::default()
        }
    }
}

/// A detail field in an enriched listing.
///
/// `Unavailable` is an explicit marker for "lookup failed", distinct from a
/// field the API simply does not have, so renderers keep a stable schema.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Detail {
    /// Value returned by the API.
    Value(String),
    /// Lookup succeeded but the field is absent.
    #[default]
    Missing,
    /// Lookup failed.
    Unavailable,
}

impl Detail {
    /// Marker text rendered for [`Detail::Unavailable`].
    pub const UNAVAILABLE: &'static str = "unavailable";

    /// Build from an optional API field.
    pub fn from_option(value: Option<String>) -> Self {
        value.map_or(Self::Missing, Self::Value)
    }

    /// Text form used by renderers.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Value(v) => v,
            Self::Missing => "",
            Self::Unavailable => Self::UNAVAILABLE,
        }
    }

    /// Whether the lookup for this field failed.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

impl fmt::Display for Detail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Detail {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A site a user follows, optionally enriched with per-site metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowedSite {
    /// Opaque site id.
    pub id: String,
    /// Short name.
    pub name: String,
    /// Display name.
    pub display_name: String,
    /// Absolute web URL.
    pub web_url: String,
    /// Site description.
    pub description: Detail,
    /// Last modification timestamp.
    pub last_modified: Detail,
    /// Creation timestamp.
    pub created_at: Detail,
}

impl From<Site> for FollowedSite {
    fn from(site: Site) -> Self {
        Self {
            id: site.id,
            name: site.name,
            display_name: site.display_name,
            web_url: site.web_url,
            description: Detail::from_option(site.description),
            last_modified: Detail::from_option(site.last_modified),
            created_at: Detail::from_option(site.created_at),
        }
    }
}

impl FollowedSite {
    /// Name to show for this site, falling back to the short name and id.
    #[must_use]
    pub fn label(&self) -> &str {
        if !self.display_name.is_empty() {
            &self.display_name
        } else if !self.name.is_empty() {
            &self.name
        } else {
            &self.id
        }
    }

    /// Replace detail fields with the values from an enrichment lookup.
    pub fn enrich(&mut self, details: Site) {
        if self.display_name.is_empty() {
            self.display_name = details.display_name;
        }
        if self.web_url.is_empty() {
            self.web_url = details.web_url;
        }
        self.description = Detail::from_option(details.description);
        self.last_modified = Detail::from_option(details.last_modified);
        self.created_at = Detail::from_option(details.created_at);
    }

    /// Mark every detail field as unavailable.
    pub fn mark_unavailable(&mut self) {
        self.description = Detail::Unavailable;
        self.last_modified = Detail::Unavailable;
        self.created_at = Detail::Unavailable;
    }
}

// =============================================================================
// Follow engine
// =============================================================================

/// Tuning for the follow engine.
#[derive(Debug, Clone)]
pub struct FollowOptions {
    /// Write+verify attempts per pair.
    pub max_attempts: u32,
    /// Delay after a write before re-reading, and between attempts.
    pub retry_delay: Duration,
    /// Fixed delay between pairs.
    pub pair_delay: Duration,
    /// Check only; never write.
    pub dry_run: bool,
}

impl Default for FollowOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
            pair_delay: Duration::from_millis(500),
            dry_run: false,
        }
    }
}

impl FollowOptions {
    /// Options with every delay set to zero.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            retry_delay: Duration::ZERO,
            pair_delay: Duration::ZERO,
            ..Default::default()
        }
    }
}

/// Result of processing one (user, site) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowOutcome {
    /// User identifier as given.
    pub user: String,
    /// Site identifier as given.
    pub site: String,
    /// A write was accepted (or none was needed).
    pub succeeded: bool,
    /// A read confirmed the follow is visible.
    pub verified: bool,
    /// Write attempts made; 0 when already following.
    pub attempts: u32,
    /// Last error seen, if the pair was not verified.
    pub last_error: Option<String>,
}

impl FollowOutcome {
    /// The pair was already satisfied; no write was made.
    pub fn already_following(user: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            site: site.into(),
            succeeded: true,
            verified: true,
            attempts: 0,
            last_error: None,
        }
    }

    /// Whether this pair was satisfied before the run touched it.
    #[must_use]
    pub fn was_already_following(&self) -> bool {
        self.verified && self.attempts == 0
    }
}
