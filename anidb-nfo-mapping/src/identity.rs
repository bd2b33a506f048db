//! The AniDB id to cross-reference table.
//!
//! Built in three layers of decreasing precedence:
//!
//! 1. the title catalog, which establishes the universe of ids (mandatory)
//! 2. the community mapping dataset (best effort, overwrites)
//! 3. the local override store (best effort, fills unset fields only)
//!
//! Resolver confirmations are applied on top with [`IdentityMap::link`] and
//! persisted immediately to the override store.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use anidb_nfo_core::{
    AnimeIds, CrossRef, IdsPatch, LANG_ROMANIZED, TitleType, TitleVariant,
};
use anidb_nfo_dat::cache::{self, DataSource};
use anidb_nfo_dat::{CommunityMapping, DatError, TitleCatalog, parse_community_mapping_file};
use regex::Regex;

use crate::error::MappingError;
use crate::fuzzy::{CaseMode, FuzzyMatcher, Match, MatchKind, MatchPolicy};
use crate::overrides::OverrideStore;

static ANIDB_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[anidb-(\d+)\]").expect("valid anidb tag pattern"));

/// Where the three identity layers come from.
#[derive(Debug, Clone)]
pub struct MappingSources {
    pub titles: DataSource,
    pub community: DataSource,
    /// Path of the local override store.
    pub overrides: PathBuf,
}

/// What happened to each layer during [`IdentityMap::refresh`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub anime_count: usize,
    /// Whether the title catalog came from a stale copy after a failed download.
    pub titles_stale: bool,
    /// Records merged from the community dataset, `None` if the layer was skipped.
    pub community_entries: Option<usize>,
    /// Records merged from the local store, `None` if the layer was skipped.
    pub local_entries: Option<usize>,
}

/// Owned identity table plus the title catalog it was seeded from.
#[derive(Debug)]
pub struct IdentityMap {
    titles: TitleCatalog,
    ids: BTreeMap<u32, AnimeIds>,
    overrides: OverrideStore,
    policy: MatchPolicy,
}

impl IdentityMap {
    /// Seed one empty identity for every id in `titles`.
    pub fn new(titles: TitleCatalog, overrides: OverrideStore, policy: MatchPolicy) -> Self {
        let mut map = Self {
            titles: TitleCatalog::default(),
            ids: BTreeMap::new(),
            overrides,
            policy,
        };
        map.ingest_titles(titles);
        map
    }

    /// Replace the title catalog, registering any ids not yet known.
    pub fn ingest_titles(&mut self, titles: TitleCatalog) {
        for aid in titles.ids() {
            self.ids.entry(aid).or_insert_with(|| AnimeIds::new(aid));
        }
        self.titles = titles;
    }

    /// Download (when stale) and merge all three layers.
    ///
    /// Fails only when the title catalog can neither be fetched nor read from
    /// a previous copy. The other layers degrade to a warning.
    pub async fn refresh(
        http: &reqwest::Client,
        sources: &MappingSources,
        policy: MatchPolicy,
    ) -> Result<(Self, RefreshReport), MappingError> {
        let mut report = RefreshReport::default();

        if let Err(e) = cache::ensure_fresh(http, &sources.titles).await {
            if !sources.titles.has_local_copy() {
                return Err(e.into());
            }
            log::warn!("{e}; using stale copy of {}", sources.titles.name);
            report.titles_stale = true;
        }
        let titles = TitleCatalog::parse_file(&sources.titles.cache)?;
        log::debug!("Loaded titles for {} anime", titles.len());

        let mut map = Self::new(titles, OverrideStore::new(&sources.overrides), policy);
        report.anime_count = map.len();

        match load_community(http, &sources.community).await {
            Ok(community) => report.community_entries = Some(map.merge_community(&community)),
            Err(e) => log::warn!("Skipping {}: {e}", sources.community.name),
        }

        match map.merge_local() {
            Ok(count) => report.local_entries = Some(count),
            Err(e) => log::warn!(
                "Skipping local overrides at {}: {e}",
                map.overrides.path().display()
            ),
        }

        Ok((map, report))
    }

    /// Merge the community dataset via [`update`](Self::update). Returns the record count.
    pub fn merge_community(&mut self, community: &CommunityMapping) -> usize {
        for (aid, patch) in community.iter() {
            self.update(aid, patch);
        }
        community.len()
    }

    /// Merge the local override store into fields that are still unset.
    pub fn merge_local(&mut self) -> Result<usize, MappingError> {
        let local = self.overrides.load()?;
        for (aid, patch) in &local {
            self.ids
                .entry(*aid)
                .or_insert_with(|| AnimeIds::new(*aid))
                .fill_unset(patch);
        }
        Ok(local.len())
    }

    /// Overwrite the fields provided in `patch` for `aid`, creating the entry if needed.
    pub fn update(&mut self, aid: u32, patch: &IdsPatch) -> &AnimeIds {
        let ids = self.ids.entry(aid).or_insert_with(|| AnimeIds::new(aid));
        ids.apply(patch);
        ids
    }

    /// Record a confirmed cross-reference and persist it to the override store.
    ///
    /// The in-memory link is kept even when the override store cannot be written.
    pub fn link(&mut self, aid: u32, link: CrossRef) -> Result<&AnimeIds, MappingError> {
        if !self.ids.contains_key(&aid) {
            return Err(MappingError::UnknownId(aid));
        }
        self.update(aid, &link.to_patch());
        log::info!("Linked anidb {aid} to {} {}", link.field, link.id);
        if let Err(e) = self.overrides.persist(aid, link) {
            log::warn!("Could not persist {} {} for anidb {aid}: {e}", link.field, link.id);
        }
        Ok(&self.ids[&aid])
    }

    pub fn from_id(&self, aid: u32) -> Option<&AnimeIds> {
        self.ids.get(&aid)
    }

    /// Resolve a free-form title to an identity.
    pub fn from_title(&self, query: &str) -> Option<&AnimeIds> {
        let found = self.match_title(query)?;
        self.ids.get(&found.key)
    }

    /// Like [`from_title`](Self::from_title) but reports how the id was found.
    ///
    /// A literal `[anidb-<id>]` tag in the query selects that id directly.
    /// Otherwise the query is matched case-sensitively against every
    /// retained title, in ascending id order.
    pub fn match_title(&self, query: &str) -> Option<Match<u32>> {
        if let Some(aid) = tagged_id(query) {
            if self.ids.contains_key(&aid) {
                return Some(Match {
                    key: aid,
                    kind: MatchKind::Exact,
                });
            }
            log::warn!("Tagged anidb id {aid} is not in the title catalog");
        }

        let query = query.trim();
        let matcher = FuzzyMatcher::new(CaseMode::Sensitive, self.policy.threshold);
        let pool = self
            .titles
            .iter()
            .flat_map(|(aid, variants)| variants.iter().map(move |v| (aid, v.title.as_str())));
        let found = matcher.best_match(query, pool);
        if let Some(Match {
            key,
            kind: MatchKind::Fuzzy { distance },
        }) = found
        {
            log::debug!("'{query}' matched anidb {key} at distance {distance}");
        }
        found
    }

    pub fn titles(&self, aid: u32) -> &[TitleVariant] {
        self.titles.titles(aid)
    }

    /// Preferred display title: the main romanized title, else the first known one.
    pub fn display_title(&self, aid: u32) -> Option<&str> {
        self.titles
            .find(aid, TitleType::Main, LANG_ROMANIZED)
            .or_else(|| self.titles.titles(aid).first())
            .map(|v| v.title.as_str())
    }

    pub fn catalog(&self) -> &TitleCatalog {
        &self.titles
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

fn tagged_id(query: &str) -> Option<u32> {
    ANIDB_TAG
        .captures(query)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

async fn load_community(
    http: &reqwest::Client,
    source: &DataSource,
) -> Result<CommunityMapping, DatError> {
    if let Err(e) = cache::ensure_fresh(http, source).await {
        if !source.has_local_copy() {
            return Err(e);
        }
        log::warn!("{e}; using stale copy of {}", source.name);
    }
    parse_community_mapping_file(&source.cache)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> TitleCatalog {
        TitleCatalog::from_entries([
            (
                1,
                vec![
                    TitleVariant::new("Naruko", TitleType::Main, "x-jat"),
                    TitleVariant::new("ナルコ", TitleType::Official, "ja"),
                ],
            ),
            (
                2,
                vec![
                    TitleVariant::new("ナルト", TitleType::Official, "ja"),
                    TitleVariant::new("Naruto", TitleType::Main, "x-jat"),
                ],
            ),
        ])
    }

    fn map() -> IdentityMap {
        IdentityMap::new(
            catalog(),
            OverrideStore::new("/nonexistent/anidb-nfo/overrides.json"),
            MatchPolicy::default(),
        )
    }

    #[test]
    fn every_catalog_id_is_seeded_empty() {
        let map = map();
        assert_eq!(map.len(), 2);
        assert_eq!(map.from_id(2), Some(&AnimeIds::new(2)));
        assert_eq!(map.from_id(3), None);
    }

    #[test]
    fn exact_title_beats_fuzzy_candidate_with_lower_id() {
        let map = map();
        let found = map.match_title("Naruto").unwrap();
        assert_eq!(found.key, 2);
        assert!(found.is_exact());
    }

    #[test]
    fn fuzzy_title_lookup() {
        let map = map();
        let found = map.match_title("Narutoo").unwrap();
        assert_eq!(found.key, 2);
        assert_eq!(found.distance(), 1);
        assert!(map.from_title("Completely Different Show").is_none());
    }

    #[test]
    fn anidb_tag_bypasses_matching() {
        let map = map();
        assert_eq!(map.from_title("Whatever [anidb-1]").unwrap().anidb, 1);
        // Unknown tag falls back to title matching.
        assert!(map.from_title("Whatever [anidb-999]").is_none());
    }

    #[test]
    fn display_title_prefers_main_romanized() {
        let map = map();
        assert_eq!(map.display_title(2), Some("Naruto"));
        assert_eq!(map.display_title(7), None);
    }

    #[test]
    fn link_rejects_unknown_ids() {
        let mut map = map();
        let err = map
            .link(42, CrossRef::new(anidb_nfo_core::CrossRefField::AniList, 1))
            .unwrap_err();
        assert!(matches!(err, MappingError::UnknownId(42)));
    }
}
