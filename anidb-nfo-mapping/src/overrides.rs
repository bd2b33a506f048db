//! Local override store: cross-reference ids confirmed on this machine.
//!
//! The store is a JSON object keyed by AniDB id:
//!
//! ```text
//! { "1530": { "anilist": 20, "tmdb": 46260 } }
//! ```
//!
//! Writes are a plain read-modify-write with no locking; two processes
//! persisting at the same time can lose one update.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anidb_nfo_core::{CrossRef, CrossRefField, IdsPatch};
use serde::{Deserialize, Serialize};

use crate::error::MappingError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct OverrideRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    anilist: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tmdb: Option<u32>,
}

impl From<OverrideRecord> for IdsPatch {
    fn from(r: OverrideRecord) -> Self {
        IdsPatch {
            anilist: r.anilist,
            tmdb: r.tmdb,
            ..Default::default()
        }
    }
}

type OverrideDocument = BTreeMap<String, OverrideRecord>;

/// Handle to the override file on disk.
#[derive(Debug, Clone)]
pub struct OverrideStore {
    path: PathBuf,
}

impl OverrideStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every override. A missing file is an empty store.
    pub fn load(&self) -> Result<BTreeMap<u32, IdsPatch>, MappingError> {
        let doc = self.read_document()?;
        let mut patches = BTreeMap::new();
        for (key, record) in doc {
            let aid = key.trim().parse::<u32>().map_err(|_| {
                MappingError::invalid_overrides(format!("non-numeric anime id '{key}'"))
            })?;
            patches.insert(aid, IdsPatch::from(record));
        }
        Ok(patches)
    }

    /// Record a confirmed cross-reference for `aid`, keeping all other entries.
    pub fn persist(&self, aid: u32, link: CrossRef) -> Result<(), MappingError> {
        let mut doc = self.read_document()?;
        let record = doc.entry(aid.to_string()).or_default();
        match link.field {
            CrossRefField::AniList => record.anilist = Some(link.id),
            CrossRefField::Tmdb => record.tmdb = Some(link.id),
            CrossRefField::Tvdb => {
                log::debug!("Not persisting tvdb link for {aid}: tvdb ids come from the community dataset");
                return Ok(());
            }
        }
        self.write_document(&doc)?;
        log::debug!("Persisted {} id {} for anidb {aid}", link.field, link.id);
        Ok(())
    }

    fn read_document(&self) -> Result<OverrideDocument, MappingError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_document(&self, doc: &OverrideDocument) -> Result<(), MappingError> {
        if let Some(parent) = self.path.parent() {
            anidb_nfo_dat::cache::create_private_dir(parent)?;
        }
        let serialized = serde_json::to_string_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serialized)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = OverrideStore::new(dir.path().join("overrides.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn persist_keeps_other_entries_and_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("overrides.json");
        let store = OverrideStore::new(&path);

        store.persist(1, CrossRef::new(CrossRefField::AniList, 10)).unwrap();
        store.persist(2, CrossRef::new(CrossRefField::Tmdb, 20)).unwrap();
        store.persist(1, CrossRef::new(CrossRefField::Tmdb, 11)).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[&1].anilist, Some(10));
        assert_eq!(loaded[&1].tmdb, Some(11));
        assert_eq!(loaded[&2].tmdb, Some(20));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn tvdb_links_are_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overrides.json");
        let store = OverrideStore::new(&path);
        store.persist(1, CrossRef::new(CrossRefField::Tvdb, 5)).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn non_numeric_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overrides.json");
        std::fs::write(&path, r#"{ "abc": { "anilist": 1 } }"#).unwrap();
        assert!(matches!(
            OverrideStore::new(&path).load(),
            Err(MappingError::InvalidOverrides(_))
        ));
    }
}
