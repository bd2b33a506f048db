use anidb_nfo_dat::DatError;
use anidb_nfo_mapping::MappingError;

/// Errors that can occur while talking to remote catalogs.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited by {0}")]
    RateLimit(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Client misconfigured: {0}")]
    ClientMisconfigured(String),

    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Cache(#[from] DatError),

    #[error(transparent)]
    Mapping(#[from] MappingError),
}

impl ScrapeError {
    pub fn access_denied(msg: impl Into<String>) -> Self {
        Self::AccessDenied(msg.into())
    }

    pub fn misconfigured(msg: impl Into<String>) -> Self {
        Self::ClientMisconfigured(msg.into())
    }

    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }

    /// Whether the error is a catalog-level fault the user has to fix.
    ///
    /// Everything else is transient or local and only degrades the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AccessDenied(_) | Self::ClientMisconfigured(_))
    }
}

impl From<quick_xml::events::attributes::AttrError> for ScrapeError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(e.into())
    }
}
