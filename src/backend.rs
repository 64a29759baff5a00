//! The credential-issuing service, as seen by this crate.
//!
//! Implementations own the wire protocol; everything here deals only in the request and response
//! shapes below.

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid Argument: {0}")]
    InvalidArgument(String, #[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String, #[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Permission denied: {0}")]
    PermissionDenied(String, #[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String, #[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Not found: {0}")]
    NotFound(String, #[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Unavailable: {0}")]
    Unavailable(String, #[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Unknown: {0} ({1})")]
    Unknown(String, #[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthFlow {
    UserFederation,
    M2m,
}

impl std::str::FromStr for AuthFlow {
    type Err = crate::Error;
    fn from_str(s: &str) -> std::result::Result<AuthFlow, crate::Error> {
        match s {
            "USER_FEDERATION" => Ok(AuthFlow::UserFederation),
            "M2M" => Ok(AuthFlow::M2m),
            _ => Err(crate::Error::UserError(format!("unknown auth flow: {s}"))),
        }
    }
}

/// GetResourceOAuth2Token. Re-sent unchanged on every polling attempt.
#[derive(Debug, Clone)]
pub struct OAuth2TokenRequest {
    pub credential_provider_name: String,
    pub workload_identity_token: secrecy::SecretString,
    pub auth_flow: AuthFlow,
    pub scopes: Vec<String>,
    pub callback_url: Option<url::Url>,
    pub custom_parameters: std::collections::BTreeMap<String, String>,
    pub custom_state: Option<String>,
    pub force_authentication: bool,
}

impl OAuth2TokenRequest {
    pub fn new(
        credential_provider_name: impl Into<String>,
        workload_identity_token: impl Into<String>,
        auth_flow: AuthFlow,
    ) -> Self {
        let workload_identity_token: String = workload_identity_token.into();
        Self {
            credential_provider_name: credential_provider_name.into(),
            workload_identity_token: workload_identity_token.into(),
            auth_flow,
            scopes: Vec::new(),
            callback_url: None,
            custom_parameters: Default::default(),
            custom_state: None,
            force_authentication: false,
        }
    }
}

/// Exactly one of `access_token` and `authorization_url` is expected; a response with an
/// authorization URL means the token is deferred until the user completes authorization.
#[derive(Debug, Clone, Default)]
pub struct OAuth2TokenResponse {
    pub access_token: Option<secrecy::SecretString>,
    pub authorization_url: Option<url::Url>,
    pub session_uri: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ApiKeyRequest {
    pub credential_provider_name: String,
    pub workload_identity_token: secrecy::SecretString,
}

#[derive(Debug, Clone)]
pub struct AssumeRoleRequest {
    pub workload_identity_token: secrecy::SecretString,
    pub role_session_name: String,
    pub duration_seconds: Option<u32>,
    pub policy: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WorkloadAccessTokenRequest {
    pub workload_identity_name: String,
    pub user_id: Option<String>,
    pub user_token: Option<secrecy::SecretString>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateWorkloadIdentityRequest {
    pub workload_identity_name: String,
    pub role_arn: Option<String>,
    pub identity_provider_name: Option<String>,
    pub allowed_resource_oauth2_return_urls: Vec<url::Url>,
}

#[derive(Debug, Clone)]
pub struct ConfirmUserAuthRequest {
    pub session_uri: String,
    pub user_id: Option<String>,
    pub user_token: Option<secrecy::SecretString>,
}

#[async_trait::async_trait]
pub trait IdentityBackend: Send + Sync {
    async fn get_resource_oauth2_token(
        &self,
        req: &OAuth2TokenRequest,
    ) -> Result<OAuth2TokenResponse>;

    async fn get_resource_api_key(
        &self,
        req: &ApiKeyRequest,
    ) -> Result<Option<secrecy::SecretString>>;

    async fn assume_role_for_workload_identity(
        &self,
        req: &AssumeRoleRequest,
    ) -> Result<crate::credential::StsCredential>;

    async fn get_workload_access_token(
        &self,
        req: &WorkloadAccessTokenRequest,
    ) -> Result<secrecy::SecretString>;

    /// Returns the name of the created workload identity.
    async fn create_workload_identity(&self, req: &CreateWorkloadIdentityRequest)
        -> Result<String>;

    async fn confirm_user_auth(&self, req: &ConfirmUserAuthRequest) -> Result<()>;
}

/// Deferred OAuth2 tokens are fetched by re-sending GetResourceOAuth2Token; a response without an
/// access token means authorization is still pending.
#[async_trait::async_trait]
impl<B> crate::token_poller::TokenSource for B
where
    B: IdentityBackend + ?Sized,
{
    type Request = OAuth2TokenRequest;

    async fn fetch_token(
        &self,
        req: &OAuth2TokenRequest,
    ) -> Result<Option<secrecy::SecretString>> {
        let resp = self.get_resource_oauth2_token(req).await?;
        Ok(resp.access_token)
    }
}
