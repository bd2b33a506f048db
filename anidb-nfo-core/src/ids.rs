use serde::{Deserialize, Serialize};

/// Canonical identity of one anime across catalogs.
///
/// `anidb` is the anchor: every other field is a cross-reference that may be
/// filled in later by the community dataset, the local override store, or a
/// confirmed secondary-catalog search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimeIds {
    pub anidb: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anilist: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvdb: Option<u32>,
    /// Season offset hint that accompanies `tvdb`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvdb_season: Option<i32>,
}

impl AnimeIds {
    /// A fresh identity with every cross-reference absent.
    pub fn new(anidb: u32) -> Self {
        Self {
            anidb,
            ..Default::default()
        }
    }

    /// Current value of a single cross-reference field.
    pub fn get(&self, field: CrossRefField) -> Option<u32> {
        match field {
            CrossRefField::AniList => self.anilist,
            CrossRefField::Tmdb => self.tmdb,
            CrossRefField::Tvdb => self.tvdb,
        }
    }

    /// Overwrite the fields present in `patch`, leaving the rest untouched.
    ///
    /// `tvdb_season` is only taken together with a `tvdb` id from the same patch.
    pub fn apply(&mut self, patch: &IdsPatch) {
        if let Some(id) = patch.anilist {
            self.anilist = Some(id);
        }
        if let Some(id) = patch.tmdb {
            self.tmdb = Some(id);
        }
        if let Some(id) = patch.tvdb {
            self.tvdb = Some(id);
            if let Some(season) = patch.tvdb_season {
                self.tvdb_season = Some(season);
            }
        }
    }

    /// Fill only the fields that are still unset.
    pub fn fill_unset(&mut self, patch: &IdsPatch) {
        if self.anilist.is_none() {
            self.anilist = patch.anilist;
        }
        if self.tmdb.is_none() {
            self.tmdb = patch.tmdb;
        }
        if self.tvdb.is_none() && patch.tvdb.is_some() {
            self.tvdb = patch.tvdb;
            if self.tvdb_season.is_none() {
                self.tvdb_season = patch.tvdb_season;
            }
        }
    }
}

/// A partial set of cross-reference ids. `None` means "not provided".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdsPatch {
    pub anilist: Option<u32>,
    pub tmdb: Option<u32>,
    pub tvdb: Option<u32>,
    pub tvdb_season: Option<i32>,
}

impl IdsPatch {
    pub fn is_empty(&self) -> bool {
        self.anilist.is_none() && self.tmdb.is_none() && self.tvdb.is_none()
    }
}

/// Names one cross-reference field of [`AnimeIds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrossRefField {
    AniList,
    Tmdb,
    Tvdb,
}

impl std::fmt::Display for CrossRefField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AniList => write!(f, "anilist"),
            Self::Tmdb => write!(f, "tmdb"),
            Self::Tvdb => write!(f, "tvdb"),
        }
    }
}

/// One resolved cross-reference: a field and its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossRef {
    pub field: CrossRefField,
    pub id: u32,
}

impl CrossRef {
    pub fn new(field: CrossRefField, id: u32) -> Self {
        Self { field, id }
    }

    /// The equivalent single-field patch.
    pub fn to_patch(self) -> IdsPatch {
        let mut patch = IdsPatch::default();
        match self.field {
            CrossRefField::AniList => patch.anilist = Some(self.id),
            CrossRefField::Tmdb => patch.tmdb = Some(self.id),
            CrossRefField::Tvdb => patch.tvdb = Some(self.id),
        }
        patch
    }
}
