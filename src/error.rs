use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Permanent,
    Transient,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permanent => write!(f, "permanent"),
            Self::Transient => write!(f, "transient"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{status} {status_text}")]
pub struct StatusError {
    pub status: u16,
    pub status_text: String,
    pub is_permanent: bool,
}

/// Client errors (4xx) are permanent; everything else is transient.
pub fn classify(status: u16, status_text: impl Into<String>) -> StatusError {
    StatusError {
        status,
        status_text: status_text.into(),
        is_permanent: (400..500).contains(&status),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Status(#[from] StatusError),

    #[error("timeout")]
    Timeout,

    #[error("rejected content-type {}", .0.as_deref().unwrap_or("(none)"))]
    RejectedContentType(Option<String>),

    #[error("maxSize exceeded ({size} > {max}) on response")]
    TooLarge { size: u64, max: u64 },

    #[error("too many redirects (max {0})")]
    TooManyRedirects(usize),

    #[error("redirect {0} without location")]
    MissingLocation(u16),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported url scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("fetch cancelled")]
    Cancelled,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Status(status) if status.is_permanent => ErrorKind::Permanent,
            _ => ErrorKind::Transient,
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.kind() == ErrorKind::Permanent
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(status) => Some(status.status),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SamaryError {
    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to fetch page")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Plugin(#[from] anyhow::Error),
}

impl SamaryError {
    /// True only when the page fetch failed with a client error.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::Fetch(err) => err.is_permanent(),
            Self::InvalidUrl { .. } => true,
            Self::Plugin(_) => false,
        }
    }
}
