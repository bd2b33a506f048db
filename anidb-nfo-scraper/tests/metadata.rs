use std::fs::File;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use anidb_nfo_core::AnimeMetadata;
use anidb_nfo_scraper::{MetadataSource, MetadataStore, ScrapeError};
use async_trait::async_trait;

/// Succeeds on the first fetch; later fetches fail with `then_fail` when set.
struct CountingSource {
    calls: AtomicUsize,
    then_fail: Option<fn() -> ScrapeError>,
}

impl CountingSource {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            then_fail: None,
        }
    }

    fn failing_after_first(fail: fn() -> ScrapeError) -> Self {
        Self {
            then_fail: Some(fail),
            ..Self::new()
        }
    }
}

#[async_trait]
impl MetadataSource for CountingSource {
    async fn fetch(&self, aid: u32) -> Result<AnimeMetadata, ScrapeError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(fail) = self.then_fail.filter(|_| n > 0) {
            return Err(fail());
        }
        Ok(AnimeMetadata {
            anidb: aid,
            kind: Some(format!("fetch {n}")),
            episode_count: None,
            start_date: None,
            end_date: None,
            titles: Vec::new(),
            description: None,
            picture: None,
            restricted: false,
            episodes: Vec::new(),
        })
    }
}

#[tokio::test]
async fn second_get_is_served_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(CountingSource::new(), dir.path(), 90);

    let first = store.get(23, false).await.unwrap();
    let second = store.get(23, false).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(second.kind.as_deref(), Some("fetch 0"));
    assert!(dir.path().join("anidb").join("23.json").is_file());
}

#[tokio::test]
async fn force_bypasses_fresh_cache() {
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(CountingSource::new(), dir.path(), 90);

    store.get(23, false).await.unwrap();
    let forced = store.get(23, true).await.unwrap();
    assert_eq!(forced.kind.as_deref(), Some("fetch 1"));
}

fn expire(store: &MetadataStore<CountingSource>, aid: u32) {
    let file = File::options()
        .write(true)
        .open(store.cache_path(aid))
        .unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(86_400 * 91))
        .unwrap();
}

#[tokio::test]
async fn transient_failure_falls_back_to_expired_entry() {
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(
        CountingSource::failing_after_first(|| ScrapeError::RateLimit("anidb".into())),
        dir.path(),
        90,
    );

    store.get(23, false).await.unwrap();
    expire(&store, 23);

    let stale = store.get(23, false).await.unwrap();
    assert_eq!(stale.kind.as_deref(), Some("fetch 0"));
    // Forcing still falls back when the fetch cannot complete.
    let forced = store.get(23, true).await.unwrap();
    assert_eq!(forced.kind.as_deref(), Some("fetch 0"));
}

#[tokio::test]
async fn transient_failure_without_cache_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(
        CountingSource::failing_after_first(|| ScrapeError::RateLimit("anidb".into())),
        dir.path(),
        90,
    );

    store.get(23, false).await.unwrap();
    let err = store.get(24, false).await.unwrap_err();
    assert!(matches!(err, ScrapeError::RateLimit(_)));
}

#[tokio::test]
async fn access_denied_ignores_the_stale_entry() {
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(
        CountingSource::failing_after_first(|| ScrapeError::access_denied("banned")),
        dir.path(),
        90,
    );

    store.get(23, false).await.unwrap();
    expire(&store, 23);

    let err = store.get(23, false).await.unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn expired_entry_is_refetched() {
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(CountingSource::new(), dir.path(), 90);

    store.get(23, false).await.unwrap();
    expire(&store, 23);

    let refreshed = store.get(23, false).await.unwrap();
    assert_eq!(refreshed.kind.as_deref(), Some("fetch 1"));
}
