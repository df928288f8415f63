//! Service-principal authentication.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{Credentials, Token};

/// Validate credentials and exchange them for a bearer token.
///
/// Token failures are configuration errors, not transient ones, so this is
/// never retried.
///
/// # Errors
///
/// Returns `Error::MissingCredential` if any field is empty, or
/// `Error::Auth` if the identity provider rejects the exchange.
pub fn acquire_token(backend: &dyn Backend, credentials: &Credentials) -> Result<Token> {
    validate(credentials)?;
    log::info!(
        "Requesting token for app {} in tenant {}",
        credentials.client_id,
        credentials.tenant_id
    );

    let token = backend.acquire_token(credentials).map_err(|e| match e {
        Error::Auth { .. } => e,
        other => Error::auth(other.to_string(), other.status()),
    })?;
    log::debug!("Token acquired");
    Ok(token)
}

fn validate(credentials: &Credentials) -> Result<()> {
    if credentials.tenant_id.trim().is_empty() {
        return Err(Error::MissingCredential("tenant_id"));
    }
    if credentials.client_id.trim().is_empty() {
        return Err(Error::MissingCredential("client_id"));
    }
    if credentials.client_secret.is_empty() {
        return Err(Error::MissingCredential("client_secret"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    #[test]
    fn test_acquire_token_success() {
        let mock = MockBackend::new();
        let token = acquire_token(&mock, &Credentials::new("t", "app", "s")).unwrap();
        assert_eq!(token.as_str(), "mock-token-app");
        assert_eq!(mock.calls().token, 1);
    }

    #[test]
    fn test_missing_fields_fail_before_network() {
        let mock = MockBackend::new();

        let err = acquire_token(&mock, &Credentials::new("", "app", "s")).unwrap_err();
        assert!(matches!(err, Error::MissingCredential("tenant_id")));

        let err = acquire_token(&mock, &Credentials::new("t", " ", "s")).unwrap_err();
        assert!(matches!(err, Error::MissingCredential("client_id")));

        let err = acquire_token(&mock, &Credentials::new("t", "app", "")).unwrap_err();
        assert!(matches!(err, Error::MissingCredential("client_secret")));

        assert_eq!(mock.calls().token, 0);
    }

    #[test]
    fn test_rejected_credentials_are_auth_errors() {
        let mock = MockBackend::new();
        mock.fail_auth(Some(401), "invalid_client");

        let err = acquire_token(&mock, &Credentials::new("t", "app", "bad")).unwrap_err();
        assert!(matches!(err, Error::Auth { status: Some(401), .. }));
        assert_eq!(mock.calls().token, 1);
    }
}
