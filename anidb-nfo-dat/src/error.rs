/// Errors that can occur while fetching or parsing bulk data sources.
#[derive(Debug, thiserror::Error)]
pub enum DatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Data source '{source_name}' unavailable: {reason}")]
    Unavailable { source_name: String, reason: String },

    #[error("Malformed data: {0}")]
    Parse(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl DatError {
    pub fn unavailable(source_name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }
}
