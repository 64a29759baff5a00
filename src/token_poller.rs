/// Something that can be asked, repeatedly, for a token whose issuance is deferred.
///
/// `Ok(None)` or an empty token means "not yet". Errors are transport or service failures for that
/// attempt only.
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync {
    type Request: Send + Sync;

    async fn fetch_token(
        &self,
        req: &Self::Request,
    ) -> crate::backend::Result<Option<secrecy::SecretString>>;
}

/// Fixed-interval, bounded-retry poll loop.
///
/// Every attempt re-sends the same request. An error from the source uses up the attempt like an
/// empty response does; the loop ends with [`crate::Error::PollExhausted`] once `max_retries`
/// attempts have been made without a token. There is no deadline other than the retry budget;
/// dropping the future stops polling.
#[derive(Debug, Clone, Copy)]
pub struct TokenPoller {
    pub max_retries: u32,
    pub delay: std::time::Duration,
}

impl TokenPoller {
    pub fn new(max_retries: u32, delay: std::time::Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn from_settings(settings: &crate::config::Settings) -> Self {
        Self::new(settings.poll_max_retries, settings.poll_interval())
    }

    pub async fn poll_for_token<S>(
        &self,
        source: &S,
        req: &S::Request,
    ) -> crate::Result<secrecy::SecretString>
    where
        S: TokenSource + ?Sized,
    {
        use secrecy::ExposeSecret;
        let mut last_error = None;
        for attempt in 1..=self.max_retries {
            if attempt > 1 {
                tokio::time::sleep(self.delay).await;
            }
            match source.fetch_token(req).await {
                Ok(Some(token)) if !token.expose_secret().is_empty() => {
                    tracing::info!(attempt, "Obtained deferred token");
                    return Ok(token);
                }
                Ok(_) => {
                    tracing::debug!(attempt, max_retries = self.max_retries, "Token not ready yet");
                }
                Err(e) => {
                    tracing::warn!(attempt, max_retries = self.max_retries, err = ?e, "Error while polling for token");
                    last_error = Some(Box::new(e));
                }
            }
        }
        Err(crate::Error::PollExhausted {
            attempts: self.max_retries,
            last_error,
        })
    }
}
