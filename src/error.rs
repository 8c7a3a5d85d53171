use serde::Serialize;
use thiserror::Error;

/// Failure of a response body to produce any markup at all
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Document is not parseable: {0}")]
    Unparseable(String),
}

/// Failures reported by a single GET (including the redirects it follows)
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    #[error("Too many HTTP redirects fetching {url} (budget {budget})")]
    TooManyRedirects { url: String, budget: u32 },

    #[error("Error opening url {url}: {reason}")]
    Open { url: String, reason: String },
}

impl FetchError {
    pub fn open(url: impl Into<String>, reason: impl ToString) -> Self {
        FetchError::Open {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors that end the analysis of an ad tag
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdTagError {
    #[error("Error opening url {url}: {reason}")]
    OpenFailure { url: String, reason: String },

    #[error("Timed out fetching {url}")]
    UrlTimeout { url: String },

    #[error("Too many HTTP redirects fetching {url} (budget {budget})")]
    TooManyRedirects { url: String, budget: u32 },

    #[error("Not a VAST document: {url}")]
    NotAnAdDocument { url: String },

    #[error("Error opening wrapper url {url} at depth {depth}: {cause}")]
    WrapperRedirectFailure {
        url: String,
        depth: usize,
        cause: FetchError,
    },

    #[error("Wrapper depth exceeds {max_depth} redirects")]
    WrapperDepthExceeded { max_depth: usize },

    #[error("Skippability is not defined for VAST version {version}")]
    UnsupportedVersion { version: String },

    #[error("Failed to build HTTP client: {reason}")]
    ClientSetup { reason: String },

    /// The analysis itself crashed; says nothing about the tag
    #[error("Internal failure analyzing {url}: {reason}")]
    Internal { url: String, reason: String },
}

impl AdTagError {
    /// True when some GET, initial or inside the wrapper chain, timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            AdTagError::UrlTimeout { .. }
                | AdTagError::WrapperRedirectFailure {
                    cause: FetchError::Timeout { .. },
                    ..
                }
        )
    }

    /// True when the failure lies in the wrapper chain rather than in the tag itself.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            AdTagError::WrapperRedirectFailure { .. } | AdTagError::WrapperDepthExceeded { .. }
        )
    }
}

impl From<FetchError> for AdTagError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout { url } => AdTagError::UrlTimeout { url },
            FetchError::TooManyRedirects { url, budget } => {
                AdTagError::TooManyRedirects { url, budget }
            }
            FetchError::Open { url, reason } => AdTagError::OpenFailure { url, reason },
        }
    }
}

pub type Result<T> = std::result::Result<T, AdTagError>;
