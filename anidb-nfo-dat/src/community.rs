//! Parser for the community-curated anime id mapping
//! (Plex-Meta-Manager `pmm_anime_ids.json`).
//!
//! ```text
//! { "1": { "tvdb_id": 72025, "tvdb_season": 1, "anilist_id": 1, "tmdb_show_id": 26209 } }
//! ```

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use anidb_nfo_core::IdsPatch;
use serde::Deserialize;

use crate::error::DatError;

/// Cross-reference ids keyed by AniDB id.
#[derive(Debug, Clone, Default)]
pub struct CommunityMapping {
    entries: BTreeMap<u32, IdsPatch>,
}

#[derive(Debug, Deserialize)]
struct CommunityRecord {
    #[serde(default)]
    anilist_id: Option<u32>,
    #[serde(default)]
    tmdb_show_id: Option<u32>,
    #[serde(default)]
    tvdb_id: Option<u32>,
    #[serde(default)]
    tvdb_season: Option<i32>,
}

impl From<CommunityRecord> for IdsPatch {
    fn from(r: CommunityRecord) -> Self {
        IdsPatch {
            anilist: r.anilist_id,
            tmdb: r.tmdb_show_id,
            tvdb: r.tvdb_id,
            tvdb_season: r.tvdb_season,
        }
    }
}

impl CommunityMapping {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, aid: u32) -> Option<&IdsPatch> {
        self.entries.get(&aid)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &IdsPatch)> {
        self.entries.iter().map(|(aid, p)| (*aid, p))
    }
}

pub fn parse_community_mapping_file(path: &Path) -> Result<CommunityMapping, DatError> {
    let file = std::fs::File::open(path)?;
    parse_community_mapping(std::io::BufReader::new(file))
}

/// Parse the mapping document.
///
/// The document must be a JSON object. Individual records with non-numeric
/// keys or mistyped fields are skipped with a warning rather than failing
/// the whole dataset.
pub fn parse_community_mapping<R: Read>(reader: R) -> Result<CommunityMapping, DatError> {
    let root: serde_json::Value = serde_json::from_reader(reader)?;
    let serde_json::Value::Object(map) = root else {
        return Err(DatError::parse("community mapping is not a JSON object"));
    };

    let mut entries = BTreeMap::new();
    let mut skipped = 0usize;
    for (key, value) in map {
        let Ok(aid) = key.trim().parse::<u32>() else {
            log::warn!("Skipping community mapping entry with non-numeric id '{key}'");
            skipped += 1;
            continue;
        };
        match serde_json::from_value::<CommunityRecord>(value) {
            Ok(record) => {
                entries.insert(aid, IdsPatch::from(record));
            }
            Err(e) => {
                log::debug!("Skipping community mapping entry {aid}: {e}");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} malformed community mapping entries");
    }

    Ok(CommunityMapping { entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_fields_and_ignores_others() {
        let json = r#"{
            "1": { "tvdb_id": 72025, "tvdb_season": 1, "anilist_id": 1, "imdb_id": "tt0279077" },
            "5": { "tmdb_show_id": 26209, "mal_id": 5 }
        }"#;
        let mapping = parse_community_mapping(json.as_bytes()).unwrap();
        assert_eq!(mapping.len(), 2);

        let one = mapping.get(1).unwrap();
        assert_eq!(one.anilist, Some(1));
        assert_eq!(one.tvdb, Some(72025));
        assert_eq!(one.tvdb_season, Some(1));
        assert_eq!(one.tmdb, None);

        assert_eq!(mapping.get(5).unwrap().tmdb, Some(26209));
    }

    #[test]
    fn malformed_records_are_skipped() {
        let json = r#"{ "abc": { "anilist_id": 1 }, "2": { "anilist_id": "x" }, "3": { "anilist_id": 3 } }"#;
        let mapping = parse_community_mapping(json.as_bytes()).unwrap();
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get(3).unwrap().anilist, Some(3));
    }

    #[test]
    fn non_object_document_is_a_parse_failure() {
        assert!(matches!(
            parse_community_mapping("[1, 2]".as_bytes()),
            Err(DatError::Parse(_))
        ));
        assert!(matches!(
            parse_community_mapping("{ not json".as_bytes()),
            Err(DatError::Json(_))
        ));
    }
}
