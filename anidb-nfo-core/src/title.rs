use serde::{Deserialize, Serialize};

/// Type tag of a title variant as published in the bulk title dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleType {
    /// Official title in a given language.
    Official,
    /// The single main title (usually romanized).
    Main,
    /// Synonyms, short forms, card titles and the like.
    Other,
}

impl TitleType {
    /// Map a dataset `type` attribute to a tag. Unknown values become `Other`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "official" => Self::Official,
            "main" => Self::Main,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Official => "official",
            Self::Main => "main",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for TitleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed, localized title of an anime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleVariant {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: TitleType,
    pub language: String,
    /// Year embedded as a trailing `(YYYY)` in the title, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

impl TitleVariant {
    pub fn new(title: impl Into<String>, kind: TitleType, language: impl Into<String>) -> Self {
        let title = title.into();
        let year = split_year(&title).1;
        Self {
            title,
            kind,
            language: language.into(),
            year,
        }
    }

    /// The title with any trailing `(YYYY)` removed.
    pub fn base_title(&self) -> &str {
        split_year(&self.title).0
    }

    pub fn is(&self, kind: TitleType, language: &str) -> bool {
        self.kind == kind && self.language == language
    }
}

/// Split a trailing parenthesized four-digit year off a title.
///
/// ```
/// use anidb_nfo_core::split_year;
///
/// assert_eq!(split_year("Hunter x Hunter (2011)"), ("Hunter x Hunter", Some(2011)));
/// assert_eq!(split_year("Hunter x Hunter"), ("Hunter x Hunter", None));
/// ```
pub fn split_year(title: &str) -> (&str, Option<i32>) {
    let trimmed = title.trim_end();
    let Some(inner) = trimmed.strip_suffix(')') else {
        return (title, None);
    };
    let Some(open) = inner.rfind('(') else {
        return (title, None);
    };
    let digits = &inner[open + 1..];
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return (title, None);
    }
    let base = inner[..open].trim_end();
    if base.is_empty() {
        return (title, None);
    }
    match digits.parse() {
        Ok(year) => (base, Some(year)),
        Err(_) => (title, None),
    }
}
