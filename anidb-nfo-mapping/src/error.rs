use anidb_nfo_dat::DatError;

/// Errors that can occur while building or persisting the identity map.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error(transparent)]
    Dat(#[from] DatError),

    #[error("I/O error on override store: {0}")]
    Io(#[from] std::io::Error),

    #[error("Override store is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Override store is malformed: {0}")]
    InvalidOverrides(String),

    #[error("AniDB id {0} is not in the title catalog")]
    UnknownId(u32),
}

impl MappingError {
    pub fn invalid_overrides(msg: impl Into<String>) -> Self {
        Self::InvalidOverrides(msg.into())
    }
}
