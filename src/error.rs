#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("UserError: {0}")]
    UserError(String),

    #[error("ConfigError: {0}")]
    ConfigError(String),

    #[error("AuthError: {0}")]
    AuthError(String),

    #[error(transparent)]
    RemoteError(#[from] crate::backend::Error),

    /// No polling attempt yielded a token. Backend errors raised during polling are folded into
    /// this as well; the last one is kept as the source.
    #[error("authorization did not complete in time; failed to get OAuth2 token after {attempts} attempts")]
    PollExhausted {
        attempts: u32,
        #[source]
        last_error: Option<Box<crate::backend::Error>>,
    },

    #[error("Failed to obtain OAuth2 token: backend returned neither a token nor an authorization URL")]
    TokenNotObtained,

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    /// Failure, but we don't want to emit error to stderr/out anymore. Used in cmd
    #[error("")]
    FailureButSilentlyExit,
}

pub type Result<T> = std::result::Result<T, Error>;
