//! Credentials and the refresh-provider seam

use async_trait::async_trait;

/// A set of signing credentials.
#[derive(Clone, Debug)]
pub struct Credentials {
    /// Access key id.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: String,
    /// Session token for temporary credentials.
    pub session_token: Option<String>,
}

impl Credentials {
    /// Static credentials without a session token.
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token: None,
        }
    }

    /// Attach a session token.
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

/// Source of fresh credentials, consulted before every signed request.
///
/// Implementations typically wrap an STS endpoint or an instance metadata
/// service and refresh expiring credentials internally. A provider failure
/// surfaces to the caller as [`crate::Error::CredentialRefresh`].
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return credentials valid for the next request.
    async fn credentials(
        &self,
    ) -> std::result::Result<Credentials, Box<dyn std::error::Error + Send + Sync>>;
}

/// Provider that always returns the same credentials.
#[derive(Clone, Debug)]
pub struct StaticProvider {
    credentials: Credentials,
}

impl StaticProvider {
    /// Wrap fixed credentials in a provider.
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl CredentialProvider for StaticProvider {
    async fn credentials(
        &self,
    ) -> std::result::Result<Credentials, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.credentials.clone())
    }
}
