use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ParseTagError;
use crate::title::TitleVariant;

/// Category of a canonical episode, as numbered by AniDB (`epno type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeCategory {
    Regular,
    Special,
    Credit,
    Trailer,
    Parody,
    Other,
}

impl EpisodeCategory {
    /// Numeric category code (1 = regular ... 6 = other).
    pub fn code(&self) -> u32 {
        match self {
            Self::Regular => 1,
            Self::Special => 2,
            Self::Credit => 3,
            Self::Trailer => 4,
            Self::Parody => 5,
            Self::Other => 6,
        }
    }

    pub fn from_code(code: u32) -> Result<Self, ParseTagError> {
        match code {
            1 => Ok(Self::Regular),
            2 => Ok(Self::Special),
            3 => Ok(Self::Credit),
            4 => Ok(Self::Trailer),
            5 => Ok(Self::Parody),
            6 => Ok(Self::Other),
            _ => Err(ParseTagError::new("episode category code", code.to_string())),
        }
    }

    /// Letter prefix used on episode-number tokens. Regular episodes have none.
    pub fn prefix(&self) -> Option<char> {
        match self {
            Self::Regular => None,
            Self::Special => Some('S'),
            Self::Credit => Some('C'),
            Self::Trailer => Some('T'),
            Self::Parody => Some('P'),
            Self::Other => Some('O'),
        }
    }

    pub fn from_prefix(prefix: char) -> Result<Self, ParseTagError> {
        match prefix.to_ascii_uppercase() {
            'S' => Ok(Self::Special),
            'C' => Ok(Self::Credit),
            'T' => Ok(Self::Trailer),
            'P' => Ok(Self::Parody),
            'O' => Ok(Self::Other),
            _ => Err(ParseTagError::new("episode prefix", prefix.to_string())),
        }
    }
}

/// A title in a specific language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedTitle {
    pub title: String,
    pub language: String,
}

/// Authoritative per-episode metadata entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub id: u32,
    /// Episode-number token, e.g. "12" or "S2".
    pub number: String,
    pub category: EpisodeCategory,
    #[serde(default)]
    pub air_date: Option<String>,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub titles: Vec<LocalizedTitle>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl EpisodeRecord {
    pub fn title_for(&self, language: &str) -> Option<&str> {
        self.titles
            .iter()
            .find(|t| t.language == language)
            .map(|t| t.title.as_str())
    }

    pub fn premiered(&self) -> Option<String> {
        self.air_date.as_deref().and_then(normalize_date)
    }
}

/// Full per-anime metadata as fetched from AniDB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimeMetadata {
    pub anidb: u32,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub episode_count: Option<u32>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub titles: Vec<TitleVariant>,
    #[serde(default)]
    pub description: Option<String>,
    /// Poster file name on the AniDB image CDN.
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub restricted: bool,
    #[serde(default)]
    pub episodes: Vec<EpisodeRecord>,
}

impl AnimeMetadata {
    pub fn premiered(&self) -> Option<String> {
        self.start_date.as_deref().and_then(normalize_date)
    }
}

/// Normalize an AniDB date to `YYYY-MM-DD`.
///
/// Month-precision dates (`YYYY-MM`) are expanded to the first of the month.
/// Anything else, including year-only dates, yields `None`.
pub fn normalize_date(date: &str) -> Option<String> {
    let date = date.trim();
    let parsed = match date.len() {
        10 => NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?,
        7 => NaiveDate::parse_from_str(&format!("{date}-01"), "%Y-%m-%d").ok()?,
        _ => return None,
    };
    Some(parsed.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_codes_round_trip_through_prefixes() {
        for code in 2..=6 {
            let cat = EpisodeCategory::from_code(code).unwrap();
            let prefix = cat.prefix().unwrap();
            assert_eq!(EpisodeCategory::from_prefix(prefix).unwrap(), cat);
        }
        assert_eq!(EpisodeCategory::Regular.prefix(), None);
        assert!(EpisodeCategory::from_code(9).is_err());
    }

    #[test]
    fn dates_are_normalized() {
        assert_eq!(normalize_date("2019-04-06").as_deref(), Some("2019-04-06"));
        assert_eq!(normalize_date("2019-04").as_deref(), Some("2019-04-01"));
        assert_eq!(normalize_date("2019"), None);
        assert_eq!(normalize_date("2019-13"), None);
    }
}
