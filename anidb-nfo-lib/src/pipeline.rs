//! End-to-end identification of one anime directory.
//!
//! 1. refresh the identity map (titles, community mapping, local overrides)
//! 2. resolve the directory name (or an explicit id) to an AniDB id
//! 3. fill missing cross-references from the secondary catalogs
//! 4. fetch per-anime metadata and bind the episode files in the directory

use std::path::{Path, PathBuf};

use anidb_nfo_core::{AnimeIds, AnimeMetadata, CrossRef, CrossRefField};
use anidb_nfo_mapping::{IdentityMap, MappingError, RefreshReport};
use anidb_nfo_scraper::{
    AniDbClient, Credentials, CrossReferenceResolver, MetadataSource, MetadataStore,
    configured_catalogs, http_client,
};

use crate::episodes::{BoundEpisode, EpisodeBinder};
use crate::error::LibError;
use crate::settings::Settings;

/// What to identify and how.
#[derive(Debug, Clone, Default)]
pub struct IdentifyRequest {
    pub directory: PathBuf,
    /// Use this AniDB id instead of matching the directory name.
    pub anidb: Option<u32>,
    /// Link this AniList id instead of searching.
    pub anilist: Option<u32>,
    /// Link this TMDB id instead of searching.
    pub tmdb: Option<u32>,
    /// Refetch metadata even if the cached copy is fresh.
    pub force_update: bool,
}

impl IdentifyRequest {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Default::default()
        }
    }
}

/// Everything the renderer needs for one anime.
#[derive(Debug, Clone)]
pub struct ResolvedAnime {
    pub ids: AnimeIds,
    pub title: String,
    pub metadata: AnimeMetadata,
    pub episodes: Vec<BoundEpisode>,
}

/// Holds the identity map and remote clients across identifications.
pub struct Pipeline {
    map: IdentityMap,
    resolver: CrossReferenceResolver,
    metadata: MetadataStore<Box<dyn MetadataSource>>,
}

impl Pipeline {
    /// Build from configuration, refreshing every dataset that is stale.
    ///
    /// Fails if the title catalog is unavailable or no AniDB client is configured.
    pub async fn new(
        settings: &Settings,
        creds: &Credentials,
    ) -> Result<(Self, RefreshReport), LibError> {
        let http = http_client()?;
        let anidb = AniDbClient::new(http.clone(), &settings.sources.anidb_api_url, creds)?;

        let sources = settings.mapping_sources()?;
        let (map, report) = IdentityMap::refresh(&http, &sources, settings.matching).await?;
        log::info!(
            "Loaded {} anime ({} community links, {} local overrides)",
            report.anime_count,
            report
                .community_entries
                .map_or_else(|| "no".to_string(), |n| n.to_string()),
            report
                .local_entries
                .map_or_else(|| "no".to_string(), |n| n.to_string()),
        );

        let resolver = CrossReferenceResolver::new(configured_catalogs(&http, creds));
        if resolver.is_enabled() {
            log::debug!("Secondary catalogs: {}", resolver.catalog_names().join(", "));
        } else {
            log::info!("No secondary catalog credentials configured; skipping cross-references");
        }

        let metadata = MetadataStore::new(
            Box::new(anidb) as Box<dyn MetadataSource>,
            settings.cache_root()?,
            settings.cache.anidb_age,
        );
        Ok((Self::from_parts(map, resolver, metadata), report))
    }

    pub fn from_parts(
        map: IdentityMap,
        resolver: CrossReferenceResolver,
        metadata: MetadataStore<Box<dyn MetadataSource>>,
    ) -> Self {
        Self {
            map,
            resolver,
            metadata,
        }
    }

    pub fn identity_map(&self) -> &IdentityMap {
        &self.map
    }

    /// Resolve the AniDB id for a request without touching the network.
    pub fn lookup(&self, request: &IdentifyRequest) -> Result<u32, LibError> {
        if let Some(aid) = request.anidb {
            if self.map.from_id(aid).is_none() {
                return Err(MappingError::UnknownId(aid).into());
            }
            return Ok(aid);
        }

        let name = directory_name(&request.directory);
        let found = self
            .map
            .match_title(&name)
            .ok_or_else(|| LibError::NoMatch(name.clone()))?;
        if !found.is_exact() {
            log::info!(
                "'{name}' matched '{}' (distance {})",
                self.map.display_title(found.key).unwrap_or("?"),
                found.distance()
            );
        }
        Ok(found.key)
    }

    /// Identify one directory and bind its episode files.
    pub async fn identify(&mut self, request: &IdentifyRequest) -> Result<ResolvedAnime, LibError> {
        if !request.directory.is_dir() {
            return Err(LibError::InvalidDirectory(request.directory.clone()));
        }
        let aid = self.lookup(request)?;

        for (field, id) in [
            (CrossRefField::AniList, request.anilist),
            (CrossRefField::Tmdb, request.tmdb),
        ] {
            if let Some(id) = id {
                self.map.link(aid, CrossRef::new(field, id))?;
            }
        }

        let ids = self
            .resolver
            .resolve(&mut self.map, aid)
            .await?
            .ok_or(MappingError::UnknownId(aid))?;

        let metadata = self.metadata.get(aid, request.force_update).await?;
        let files = EpisodeBinder::scan(&request.directory)?;
        let episodes = EpisodeBinder::new(&metadata.episodes).bind_all(&files);
        log::debug!(
            "Bound {} of {} files in {}",
            episodes.len(),
            files.len(),
            request.directory.display()
        );

        let title = self
            .map
            .display_title(aid)
            .map(str::to_string)
            .unwrap_or_else(|| format!("anidb-{aid}"));

        Ok(ResolvedAnime {
            ids,
            title,
            metadata,
            episodes,
        })
    }
}

fn directory_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
