//! Application settings: cache location, dataset TTLs, remote sources and
//! matching thresholds.
//!
//! Stored in `~/.config/anidb-nfo/settings.toml`. Every field has a default,
//! so a missing file or a partial one is fine.

use std::path::{Path, PathBuf};

use anidb_nfo_dat::DataSource;
use anidb_nfo_dat::cache;
use anidb_nfo_mapping::{MappingSources, MatchPolicy};
use serde::{Deserialize, Serialize};

use crate::error::LibError;

pub const DEFAULT_TITLES_URL: &str = "https://anidb.net/api/anime-titles.xml.gz";
pub const DEFAULT_COMMUNITY_URL: &str =
    "https://raw.githubusercontent.com/meisnate12/Plex-Meta-Manager-Anime-IDs/master/pmm_anime_ids.json";

const TITLES_FILE: &str = "anime-titles.xml";
const COMMUNITY_FILE: &str = "pmm_anime_ids.json";
const OVERRIDES_FILE: &str = "overrides.json";

/// Canonical path to the settings file: `~/.config/anidb-nfo/settings.toml`.
pub fn settings_path() -> PathBuf {
    let config = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config.join("anidb-nfo").join("settings.toml")
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cache: CacheSettings,
    pub sources: SourceSettings,
    pub matching: MatchPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache root; `~/.cache/anidb-nfo` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Days before per-anime metadata is refetched.
    pub anidb_age: u32,
    /// Days before the bulk title and mapping datasets are refetched.
    pub mapping_age: u32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            path: None,
            anidb_age: 90,
            mapping_age: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub anidb_titles_url: String,
    pub community_mapping_url: String,
    pub anidb_api_url: String,
    /// Local override store; `~/.local/share/anidb-nfo/overrides.json` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_overrides: Option<PathBuf>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            anidb_titles_url: DEFAULT_TITLES_URL.to_string(),
            community_mapping_url: DEFAULT_COMMUNITY_URL.to_string(),
            anidb_api_url: anidb_nfo_scraper::anidb::DEFAULT_API_URL.to_string(),
            local_overrides: None,
        }
    }
}

impl Settings {
    /// Load from the default location. A missing file yields defaults.
    pub fn load() -> Result<Self, LibError> {
        Self::load_from(&settings_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, LibError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&contents)
            .map_err(|e| LibError::settings(format!("{}: {e}", path.display())))
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<PathBuf, LibError> {
        let path = settings_path();
        self.save_to(&path)?;
        Ok(path)
    }

    /// Write atomically: serialize to a temp file, then rename over `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), LibError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = self.to_toml_string()?;
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, &serialized)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, LibError> {
        toml::to_string_pretty(self).map_err(|e| LibError::settings(e.to_string()))
    }

    pub fn cache_root(&self) -> Result<PathBuf, LibError> {
        match &self.cache.path {
            Some(path) => Ok(path.clone()),
            None => Ok(cache::cache_dir()?),
        }
    }

    pub fn overrides_path(&self) -> Result<PathBuf, LibError> {
        if let Some(path) = &self.sources.local_overrides {
            return Ok(path.clone());
        }
        let data = dirs::data_dir()
            .ok_or_else(|| LibError::settings("Could not determine data directory"))?;
        Ok(data.join("anidb-nfo").join(OVERRIDES_FILE))
    }

    /// The three identity-map layers as configured.
    pub fn mapping_sources(&self) -> Result<MappingSources, LibError> {
        let root = self.cache_root()?;
        Ok(MappingSources {
            titles: DataSource::new(
                "AniDB anime titles",
                &self.sources.anidb_titles_url,
                root.join(TITLES_FILE),
                self.cache.mapping_age,
            ),
            community: DataSource::new(
                "community anime id mapping",
                &self.sources.community_mapping_url,
                root.join(COMMUNITY_FILE),
                self.cache.mapping_age,
            ),
            overrides: self.overrides_path()?,
        })
    }
}
