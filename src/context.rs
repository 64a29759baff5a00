pub const ENV_WORKLOAD_ACCESS_TOKEN: &str = "AGENT_IDENTITY_WORKLOAD_ACCESS_TOKEN";

tokio::task_local! {
    static CURRENT: IdentityContext;
}

/// Per-request identity state: who the end user is and which workload access token acts for them.
///
/// Pass it explicitly, or install it for the duration of a future with [`IdentityContext::scope`].
/// A scoped context is visible to that future only; tasks spawned from inside it start without
/// one.
#[derive(Debug, Clone, Default)]
pub struct IdentityContext {
    pub user_id: Option<String>,
    pub user_token: Option<secrecy::SecretString>,
    pub custom_state: Option<String>,
    workload_access_token: Option<secrecy::SecretString>,
}

impl IdentityContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_user_token(mut self, user_token: impl Into<String>) -> Self {
        let user_token: String = user_token.into();
        self.user_token = Some(user_token.into());
        self
    }

    pub fn with_custom_state(mut self, custom_state: impl Into<String>) -> Self {
        self.custom_state = Some(custom_state.into());
        self
    }

    pub fn with_workload_access_token(mut self, token: impl Into<String>) -> Self {
        self.set_workload_access_token(Some(token.into()));
        self
    }

    pub fn set_workload_access_token(&mut self, token: Option<String>) {
        self.workload_access_token = token.map(Into::into);
    }

    /// The token set on this context, otherwise `$AGENT_IDENTITY_WORKLOAD_ACCESS_TOKEN`.
    pub fn workload_access_token(&self) -> Option<secrecy::SecretString> {
        self.workload_access_token_with(|k| std::env::var(k).ok())
    }

    pub fn workload_access_token_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<secrecy::SecretString> {
        match &self.workload_access_token {
            Some(t) => Some(t.clone()),
            None => lookup(ENV_WORKLOAD_ACCESS_TOKEN)
                .filter(|t| !t.is_empty())
                .map(Into::into),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub async fn scope<F>(self, fut: F) -> F::Output
    where
        F: std::future::Future,
    {
        CURRENT.scope(self, fut).await
    }

    /// A copy of the context installed by the innermost enclosing [`IdentityContext::scope`].
    pub fn current() -> Option<IdentityContext> {
        CURRENT.try_with(|c| c.clone()).ok()
    }
}
