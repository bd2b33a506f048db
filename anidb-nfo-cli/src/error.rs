use anidb_nfo_lib::LibError;
use thiserror::Error;

/// Errors that can occur during CLI command execution.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// Identification pipeline failed
    #[error(transparent)]
    Lib(#[from] LibError),

    /// Cache listing or cleanup failed
    #[error("Cache error: {0}")]
    Cache(#[from] anidb_nfo_dat::DatError),

    /// Credentials could not be written
    #[error(transparent)]
    Scrape(#[from] anidb_nfo_scraper::ScrapeError),

    /// Bad flag combination
    #[error("Usage error: {0}")]
    Usage(String),

    /// Runtime creation or async error
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Some directories could not be identified
    #[error("{0}")]
    Incomplete(String),
}

impl CliError {
    pub(crate) fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    pub(crate) fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    pub(crate) fn incomplete(msg: impl Into<String>) -> Self {
        Self::Incomplete(msg.into())
    }
}
