use std::path::PathBuf;

use anidb_nfo_dat::DatError;
use anidb_nfo_mapping::MappingError;
use anidb_nfo_scraper::ScrapeError;

/// Errors surfaced by the resolution pipeline.
#[derive(Debug, thiserror::Error)]
pub enum LibError {
    #[error(transparent)]
    Dat(#[from] DatError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Not a directory: {}", .0.display())]
    InvalidDirectory(PathBuf),

    #[error("No AniDB entry matches '{0}'")]
    NoMatch(String),
}

impl LibError {
    pub fn settings(msg: impl Into<String>) -> Self {
        Self::Settings(msg.into())
    }

    /// Whether the user has to fix credentials or client registration.
    pub fn needs_user_action(&self) -> bool {
        matches!(self, Self::Scrape(e) if e.is_fatal())
    }
}
