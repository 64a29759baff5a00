/// Minimum remaining lifetime for a cached STS credential to be served. Entries are given a cache
/// TTL that ends this long before the credential itself expires.
const RENEW_CREDENTIALS_BEFORE_SEC: i64 = 300;

/// Role session name used when the caller doesn't pick one. A fixed name keeps the cache key
/// stable across requests of the same user.
pub const DEFAULT_ROLE_SESSION_NAME: &str = "agent-identity";

/// Receives the URL the end user has to visit when an OAuth2 token needs their authorization.
#[async_trait::async_trait]
pub trait AuthUrlHandler: Send + Sync {
    async fn on_auth_url(&self, url: &url::Url) -> crate::Result<()>;
}

/// Prints the authorization URL to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrAuthUrlHandler;

#[async_trait::async_trait]
impl AuthUrlHandler for StderrAuthUrlHandler {
    async fn on_auth_url(&self, url: &url::Url) -> crate::Result<()> {
        use tokio::io::AsyncWriteExt;
        let product = env!("CARGO_PKG_NAME");
        let message = indoc::formatdoc! {"
            :: {product} :: Authorization required ::::::::
            :: {product} ::
            :: {product} ::   To authorize, visit: {url}
            :: {product} ::
        "};
        let mut stderr = tokio::io::stderr();
        stderr.write_all(message.as_bytes()).await?;
        stderr.flush().await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct StsCredentialRequest {
    pub workload_identity_token: secrecy::SecretString,
    pub user_id: String,
    pub user_token: secrecy::SecretString,
    pub role_session_name: String,
    pub duration_seconds: Option<u32>,
    pub policy: Option<String>,
}

impl StsCredentialRequest {
    pub fn new(
        workload_identity_token: impl Into<String>,
        user_id: impl Into<String>,
        user_token: impl Into<String>,
    ) -> Self {
        let workload_identity_token: String = workload_identity_token.into();
        let user_token: String = user_token.into();
        Self {
            workload_identity_token: workload_identity_token.into(),
            user_id: user_id.into(),
            user_token: user_token.into(),
            role_session_name: DEFAULT_ROLE_SESSION_NAME.to_owned(),
            duration_seconds: None,
            policy: None,
        }
    }

    pub fn cache_key(&self) -> crate::credential_cache::CacheKey {
        use secrecy::ExposeSecret;
        crate::credential_cache::build_cache_key(
            &self.user_id,
            self.user_token.expose_secret(),
            &self.role_session_name,
        )
    }
}

/// Front door for obtaining credentials on behalf of a workload and its end user.
#[derive(Clone)]
pub struct IdentityClient {
    backend: std::sync::Arc<dyn crate::backend::IdentityBackend>,
    cache: crate::credential_cache::CredentialCache,
    settings: crate::config::Settings,
    local_config: Option<std::path::PathBuf>,
}

impl std::fmt::Debug for IdentityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityClient")
            .field("region_id", &self.settings.region_id)
            .finish()
    }
}

impl IdentityClient {
    pub fn new(
        backend: std::sync::Arc<dyn crate::backend::IdentityBackend>,
        settings: crate::config::Settings,
    ) -> Self {
        let cache = crate::credential_cache::CredentialCache::from_settings(&settings);
        Self::with_cache(backend, cache, settings)
    }

    /// Shares `cache` with whoever else holds it.
    pub fn with_cache(
        backend: std::sync::Arc<dyn crate::backend::IdentityBackend>,
        cache: crate::credential_cache::CredentialCache,
        settings: crate::config::Settings,
    ) -> Self {
        Self {
            backend,
            cache,
            settings,
            local_config: None,
        }
    }

    /// Local config file remembering the workload identity name. Defaults to
    /// [`crate::config::local_config_path`].
    pub fn with_local_config(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.local_config = Some(path.into());
        self
    }

    fn local_config(&self) -> crate::Result<std::path::PathBuf> {
        match self.local_config {
            Some(ref p) => Ok(p.clone()),
            None => crate::config::local_config_path(),
        }
    }

    pub fn cache(&self) -> &crate::credential_cache::CredentialCache {
        &self.cache
    }

    pub fn settings(&self) -> &crate::config::Settings {
        &self.settings
    }

    pub fn poller(&self) -> crate::token_poller::TokenPoller {
        crate::token_poller::TokenPoller::from_settings(&self.settings)
    }

    /// Returns an STS credential for the request's (user, token, session), from the cache when a
    /// valid one is there.
    pub async fn get_sts_credential(
        &self,
        req: &StsCredentialRequest,
    ) -> crate::Result<std::sync::Arc<crate::credential::StsCredential>> {
        let key = req.cache_key();
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(key = ?key, "Using cached STS credential");
            return Ok(cached.credential);
        }

        tracing::info!(key = ?key, role_session_name = %req.role_session_name, "Requesting STS credential");
        let credential = self
            .backend
            .assume_role_for_workload_identity(&crate::backend::AssumeRoleRequest {
                workload_identity_token: req.workload_identity_token.clone(),
                role_session_name: req.role_session_name.clone(),
                duration_seconds: req.duration_seconds,
                policy: req.policy.clone(),
            })
            .await?;

        let ttl = self.cache_ttl_for(&credential, chrono::Utc::now());
        let shared = std::sync::Arc::new(credential.clone());
        self.cache.store_with_ttl(key, credential, ttl);
        Ok(shared)
    }

    /// The configured TTL, shortened so the entry is dropped before the credential expires.
    fn cache_ttl_for(
        &self,
        credential: &crate::credential::StsCredential,
        now: chrono::DateTime<chrono::Utc>,
    ) -> std::time::Duration {
        let configured = self.settings.sts_cache_ttl();
        let Some(expires_at) = credential.expires_at() else {
            return configured;
        };
        let usable = expires_at - chrono::Duration::seconds(RENEW_CREDENTIALS_BEFORE_SEC) - now;
        match usable.to_std() {
            Ok(d) => d.min(configured),
            Err(_) => {
                tracing::debug!(expiration = %credential.expiration, "STS credential expires too soon to cache");
                std::time::Duration::ZERO
            }
        }
    }

    /// Obtains an OAuth2 access token from a credential provider. When the user has to authorize
    /// first, `on_auth_url` (stderr when `None`) receives the URL and the request is polled until a
    /// token shows up or the retry budget runs out.
    pub async fn get_token(
        &self,
        req: &crate::backend::OAuth2TokenRequest,
        on_auth_url: Option<&dyn AuthUrlHandler>,
    ) -> crate::Result<secrecy::SecretString> {
        use secrecy::ExposeSecret;

        tracing::debug!(provider = %req.credential_provider_name, auth_flow = ?req.auth_flow, "Requesting OAuth2 token");
        let resp = self.backend.get_resource_oauth2_token(req).await?;

        if let Some(token) = resp
            .access_token
            .filter(|t| !t.expose_secret().is_empty())
        {
            return Ok(token);
        }

        let Some(authorization_url) = resp.authorization_url else {
            return Err(crate::Error::TokenNotObtained);
        };
        tracing::info!(provider = %req.credential_provider_name, session_uri = ?resp.session_uri, "User authorization required");
        match on_auth_url {
            Some(handler) => handler.on_auth_url(&authorization_url).await?,
            None => StderrAuthUrlHandler.on_auth_url(&authorization_url).await?,
        }

        // Re-sending with force_authentication would restart the authorization every attempt.
        let mut poll_req = req.clone();
        poll_req.force_authentication = false;
        self.poller()
            .poll_for_token(self.backend.as_ref(), &poll_req)
            .await
    }

    pub async fn get_api_key(
        &self,
        req: &crate::backend::ApiKeyRequest,
    ) -> crate::Result<secrecy::SecretString> {
        tracing::debug!(provider = %req.credential_provider_name, "Requesting API key");
        match self.backend.get_resource_api_key(req).await? {
            Some(key) => Ok(key),
            None => Err(crate::Error::AuthError(
                "Agent identity service did not return an API key".to_owned(),
            )),
        }
    }

    /// A user token, when given, takes precedence over the user id.
    pub async fn get_workload_access_token(
        &self,
        workload_identity_name: &str,
        user_id: Option<&str>,
        user_token: Option<&secrecy::SecretString>,
    ) -> crate::Result<secrecy::SecretString> {
        let (user_id, user_token) = match user_token {
            Some(t) => (None, Some(t.clone())),
            None => (user_id.map(str::to_owned), None),
        };
        let token = self
            .backend
            .get_workload_access_token(&crate::backend::WorkloadAccessTokenRequest {
                workload_identity_name: workload_identity_name.to_owned(),
                user_id,
                user_token,
            })
            .await?;
        Ok(token)
    }

    /// Creates a workload identity, named `workload-xxxxxxxx` unless the request names it.
    pub async fn create_workload_identity(
        &self,
        mut req: crate::backend::CreateWorkloadIdentityRequest,
    ) -> crate::Result<String> {
        if req.workload_identity_name.is_empty() {
            req.workload_identity_name = crate::utils::generate_workload_identity_name();
        }
        tracing::info!(name = %req.workload_identity_name, "Creating workload identity");
        let name = self.backend.create_workload_identity(&req).await?;
        Ok(name)
    }

    pub async fn confirm_user_auth(
        &self,
        session_uri: &str,
        user_id: Option<&str>,
        user_token: Option<&secrecy::SecretString>,
    ) -> crate::Result<()> {
        if user_id.is_none() && user_token.is_none() {
            return Err(crate::Error::UserError(
                "either user_id or user_token is required to confirm user authorization".to_owned(),
            ));
        }
        self.backend
            .confirm_user_auth(&crate::backend::ConfirmUserAuthRequest {
                session_uri: session_uri.to_owned(),
                user_id: user_id.map(str::to_owned),
                user_token: user_token.cloned(),
            })
            .await?;
        Ok(())
    }

    /// Workload access token for the user in `ctx`.
    ///
    /// Uses the context's token (or `$AGENT_IDENTITY_WORKLOAD_ACCESS_TOKEN`) when present.
    /// Otherwise the workload identity comes from `$AGENT_IDENTITY_WORKLOAD_IDENTITY_NAME`, then
    /// the local config file, then a newly created one; the name used is remembered in the local
    /// config file.
    pub async fn resolve_workload_access_token(
        &self,
        ctx: &crate::context::IdentityContext,
        local_config: &std::path::Path,
    ) -> crate::Result<secrecy::SecretString> {
        if let Some(token) = ctx.workload_access_token() {
            return Ok(token);
        }
        let env_name = std::env::var(crate::config::ENV_WORKLOAD_IDENTITY_NAME)
            .ok()
            .filter(|v| !v.is_empty());
        self.resolve_workload_access_token_with(ctx, local_config, env_name)
            .await
    }

    async fn resolve_workload_access_token_with(
        &self,
        ctx: &crate::context::IdentityContext,
        local_config: &std::path::Path,
        env_name: Option<String>,
    ) -> crate::Result<secrecy::SecretString> {
        let name = match env_name {
            Some(n) => n,
            None => match crate::config::read_local_config(
                crate::config::LOCAL_CONFIG_WORKLOAD_IDENTITY_NAME,
                local_config,
            )
            .await
            {
                Some(n) => n,
                None => {
                    self.create_workload_identity(Default::default())
                        .await?
                }
            },
        };
        crate::config::write_local_config(
            crate::config::LOCAL_CONFIG_WORKLOAD_IDENTITY_NAME,
            &name,
            local_config,
        )
        .await?;

        self.get_workload_access_token(&name, ctx.user_id.as_deref(), ctx.user_token.as_ref())
            .await
    }

    /// OAuth2 access token for the user in `ctx`, or in the scoped [`IdentityContext`] when
    /// `ctx` is `None`. The context's custom state travels with the request.
    ///
    /// [`IdentityContext`]: crate::context::IdentityContext
    pub async fn access_token_for(
        &self,
        ctx: Option<&crate::context::IdentityContext>,
        credential_provider_name: &str,
        auth_flow: crate::backend::AuthFlow,
        scopes: Vec<String>,
        on_auth_url: Option<&dyn AuthUrlHandler>,
    ) -> crate::Result<secrecy::SecretString> {
        let ctx = context_or_current(ctx);
        let workload_identity_token = self.workload_token_for(&ctx).await?;
        let req = crate::backend::OAuth2TokenRequest {
            workload_identity_token,
            scopes,
            custom_state: ctx.custom_state.clone(),
            ..crate::backend::OAuth2TokenRequest::new(credential_provider_name, "", auth_flow)
        };
        self.get_token(&req, on_auth_url).await
    }

    /// API key from a credential provider, for the user in `ctx` (or the scoped context).
    pub async fn api_key_for(
        &self,
        ctx: Option<&crate::context::IdentityContext>,
        credential_provider_name: &str,
    ) -> crate::Result<secrecy::SecretString> {
        let ctx = context_or_current(ctx);
        let workload_identity_token = self.workload_token_for(&ctx).await?;
        self.get_api_key(&crate::backend::ApiKeyRequest {
            credential_provider_name: credential_provider_name.to_owned(),
            workload_identity_token,
        })
        .await
    }

    /// STS credential for the user in `ctx` (or the scoped context). Cached per user id, user
    /// token and role session name; a context without them shares the anonymous entry.
    pub async fn sts_credential_for(
        &self,
        ctx: Option<&crate::context::IdentityContext>,
        role_session_name: Option<&str>,
        duration_seconds: Option<u32>,
        policy: Option<String>,
    ) -> crate::Result<std::sync::Arc<crate::credential::StsCredential>> {
        let ctx = context_or_current(ctx);
        let workload_identity_token = self.workload_token_for(&ctx).await?;
        let req = StsCredentialRequest {
            workload_identity_token,
            user_id: ctx.user_id.clone().unwrap_or_default(),
            user_token: ctx
                .user_token
                .clone()
                .unwrap_or_else(|| String::new().into()),
            role_session_name: role_session_name
                .unwrap_or(DEFAULT_ROLE_SESSION_NAME)
                .to_owned(),
            duration_seconds,
            policy,
        };
        self.get_sts_credential(&req).await
    }

    async fn workload_token_for(
        &self,
        ctx: &crate::context::IdentityContext,
    ) -> crate::Result<secrecy::SecretString> {
        let path = self.local_config()?;
        self.resolve_workload_access_token(ctx, &path).await
    }
}

fn context_or_current(
    ctx: Option<&crate::context::IdentityContext>,
) -> crate::context::IdentityContext {
    match ctx {
        Some(c) => c.clone(),
        None => crate::context::IdentityContext::current().unwrap_or_default(),
    }
}
