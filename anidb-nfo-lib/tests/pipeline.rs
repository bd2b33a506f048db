use std::fs;
use std::path::Path;

use anidb_nfo_core::{
    AnimeMetadata, CrossRefField, EpisodeCategory, EpisodeRecord, TitleType, TitleVariant,
};
use anidb_nfo_dat::TitleCatalog;
use anidb_nfo_lib::{IdentifyRequest, LibError, Pipeline};
use anidb_nfo_mapping::{IdentityMap, MappingError, MatchPolicy, OverrideStore};
use anidb_nfo_scraper::{
    Candidate, CrossReferenceResolver, MetadataSource, MetadataStore, ScrapeError, SearchQuery,
    SecondaryCatalog,
};
use async_trait::async_trait;

struct StaticMetadata;

fn episode(id: u32, number: &str, category: EpisodeCategory) -> EpisodeRecord {
    EpisodeRecord {
        id,
        number: number.to_string(),
        category,
        air_date: Some("1998-10-24".to_string()),
        length: Some(25),
        titles: Vec::new(),
        summary: None,
    }
}

#[async_trait]
impl MetadataSource for StaticMetadata {
    async fn fetch(&self, aid: u32) -> Result<AnimeMetadata, ScrapeError> {
        Ok(AnimeMetadata {
            anidb: aid,
            kind: Some("TV Series".to_string()),
            episode_count: Some(3),
            start_date: Some("1998-04".to_string()),
            end_date: None,
            titles: Vec::new(),
            description: None,
            picture: None,
            restricted: false,
            episodes: vec![
                episode(230, "1", EpisodeCategory::Regular),
                episode(231, "2", EpisodeCategory::Regular),
                episode(232, "3", EpisodeCategory::Regular),
                episode(900, "S1", EpisodeCategory::Special),
            ],
        })
    }
}

struct AnimeOnlyTmdb;

#[async_trait]
impl SecondaryCatalog for AnimeOnlyTmdb {
    fn field(&self) -> CrossRefField {
        CrossRefField::Tmdb
    }

    fn name(&self) -> &str {
        "fake TMDB"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, ScrapeError> {
        Ok(vec![Candidate {
            id: 30991,
            titles: vec![query.title.to_uppercase()],
            year: Some(1998),
            in_category: true,
        }])
    }
}

fn pipeline(root: &Path) -> Pipeline {
    let catalog = TitleCatalog::from_entries([(
        23,
        vec![
            TitleVariant::new("Cowboy Bebop", TitleType::Main, "x-jat"),
            TitleVariant::new("カウボーイビバップ", TitleType::Official, "ja"),
        ],
    )]);
    let map = IdentityMap::new(
        catalog,
        OverrideStore::new(root.join("overrides.json")),
        MatchPolicy::default(),
    );
    let resolver = CrossReferenceResolver::new(vec![Box::new(AnimeOnlyTmdb)]);
    let metadata = MetadataStore::new(
        Box::new(StaticMetadata) as Box<dyn MetadataSource>,
        root.join("cache"),
        90,
    );
    Pipeline::from_parts(map, resolver, metadata)
}

fn show_dir(root: &Path, name: &str, files: &[&str]) -> std::path::PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    for file in files {
        fs::write(dir.join(file), b"").unwrap();
    }
    dir
}

#[tokio::test]
async fn directory_is_identified_and_episodes_bound() {
    let root = tempfile::tempdir().unwrap();
    let dir = show_dir(
        root.path(),
        "Cowboy Bebop",
        &[
            "Cowboy Bebop - 01-02 - Asteroid Blues (ABCDEF12).mkv",
            "Cowboy Bebop - 03 - Honky Tonk Women.mkv",
            "Cowboy Bebop - S01 - Session XX.mp4",
            "notes.txt",
            "garbage.mkv",
        ],
    );
    let mut pipeline = pipeline(root.path());

    let resolved = pipeline.identify(&IdentifyRequest::new(&dir)).await.unwrap();
    assert_eq!(resolved.ids.anidb, 23);
    assert_eq!(resolved.ids.tmdb, Some(30991));
    assert_eq!(resolved.title, "Cowboy Bebop");
    assert_eq!(resolved.metadata.premiered().as_deref(), Some("1998-04-01"));

    // Sorted scan; garbage.mkv is skipped.
    assert_eq!(resolved.episodes.len(), 3);
    let first = &resolved.episodes[0];
    assert_eq!(first.file.title, "Asteroid Blues");
    assert_eq!(first.episodes.len(), 2);
    let special = &resolved.episodes[2];
    assert_eq!(special.episodes[0].id, 900);
    assert_eq!(special.display_number().unwrap().episode, 201);
}

#[tokio::test]
async fn explicit_ids_override_search_and_are_persisted() {
    let root = tempfile::tempdir().unwrap();
    let dir = show_dir(root.path(), "Some Folder", &[]);
    let mut pipeline = pipeline(root.path());

    let request = IdentifyRequest {
        anidb: Some(23),
        anilist: Some(1),
        tmdb: Some(4242),
        ..IdentifyRequest::new(&dir)
    };
    let resolved = pipeline.identify(&request).await.unwrap();
    assert_eq!(resolved.ids.anilist, Some(1));
    assert_eq!(resolved.ids.tmdb, Some(4242));
    assert!(resolved.episodes.is_empty());

    let stored = OverrideStore::new(root.path().join("overrides.json"))
        .load()
        .unwrap();
    assert_eq!(stored[&23].tmdb, Some(4242));
}

#[tokio::test]
async fn unknown_directory_name_is_no_match() {
    let root = tempfile::tempdir().unwrap();
    let dir = show_dir(root.path(), "Completely Unrelated Series", &[]);
    let mut pipeline = pipeline(root.path());

    let err = pipeline.identify(&IdentifyRequest::new(&dir)).await.unwrap_err();
    assert!(matches!(err, LibError::NoMatch(name) if name == "Completely Unrelated Series"));
}

#[tokio::test]
async fn explicit_unknown_anidb_id_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let dir = show_dir(root.path(), "x", &[]);
    let mut pipeline = pipeline(root.path());

    let request = IdentifyRequest {
        anidb: Some(999),
        ..IdentifyRequest::new(&dir)
    };
    let err = pipeline.identify(&request).await.unwrap_err();
    assert!(matches!(err, LibError::Mapping(MappingError::UnknownId(999))));
}

#[tokio::test]
async fn missing_directory_is_invalid() {
    let root = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline(root.path());

    let err = pipeline
        .identify(&IdentifyRequest::new(root.path().join("missing")))
        .await
        .unwrap_err();
    assert!(matches!(err, LibError::InvalidDirectory(_)));
}
