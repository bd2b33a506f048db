use serde::{Deserialize, Serialize};

pub mod episode;
pub mod error;
pub mod ids;
pub mod title;

pub use episode::{AnimeMetadata, EpisodeCategory, EpisodeRecord, LocalizedTitle, normalize_date};
pub use error::ParseTagError;
pub use ids::{AnimeIds, CrossRef, CrossRefField, IdsPatch};
pub use title::{TitleType, TitleVariant, split_year};

/// Language tag of the official Japanese (native script) title.
pub const LANG_NATIVE: &str = "ja";

/// Language tag of the romanized Japanese title (AniDB's "x-jat").
pub const LANG_ROMANIZED: &str = "x-jat";

/// Which script a title is written in, relative to the anime's origin.
///
/// Fuzzy matching tolerates more edits for romanized or translated titles
/// since transliteration schemes vary between catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Script {
    /// Original script (e.g., kanji/kana for Japanese productions).
    Native,
    /// Romanized or translated.
    Romanized,
}

impl Script {
    /// Classify a title variant's language tag.
    pub fn from_language(language: &str) -> Self {
        if language == LANG_NATIVE {
            Self::Native
        } else {
            Self::Romanized
        }
    }
}
