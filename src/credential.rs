/// Temporary credentials issued by AssumeRoleForWorkloadIdentity.
///
/// The expiration is kept as the string the backend returned; callers that need a timestamp use
/// [`StsCredential::expires_at`].
#[derive(Clone, Debug, serde::Deserialize)]
pub struct StsCredential {
    pub access_key_id: String,
    pub access_key_secret: secrecy::SecretString,
    pub security_token: secrecy::SecretString,
    pub expiration: String,
}

impl StsCredential {
    pub fn new(
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
        security_token: impl Into<String>,
        expiration: impl Into<String>,
    ) -> Self {
        let access_key_secret: String = access_key_secret.into();
        let security_token: String = security_token.into();
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
            security_token: security_token.into(),
            expiration: expiration.into(),
        }
    }

    /// Best-effort parse of `expiration` as RFC 3339.
    pub fn expires_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        match chrono::DateTime::parse_from_rfc3339(&self.expiration) {
            Ok(t) => Some(t.with_timezone(&chrono::Utc)),
            Err(e) => {
                tracing::debug!(expiration = %self.expiration, err = ?e, "Unparseable STS credential expiration");
                None
            }
        }
    }
}
