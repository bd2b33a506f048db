//! AniDB HTTP API client for per-anime metadata, plus its on-disk cache.
//!
//! The API answers `request=anime` with an XML document:
//!
//! ```text
//! <anime id="1" restricted="false">
//!   <type>TV Series</type>
//!   <episodecount>13</episodecount>
//!   <startdate>1999-01-03</startdate>
//!   <titles><title xml:lang="x-jat" type="main">Seikai no Monshou</title></titles>
//!   <episodes>
//!     <episode id="1"><epno type="1">1</epno><title xml:lang="en">Invasion</title></episode>
//!   </episodes>
//! </anime>
//! ```
//!
//! or with `<error>message</error>`. Bodies are usually gzip-compressed
//! regardless of what the request asked for.

use std::io::Read;
use std::path::{Path, PathBuf};

use anidb_nfo_core::{
    AnimeMetadata, EpisodeCategory, EpisodeRecord, LocalizedTitle, TitleType, TitleVariant,
};
use anidb_nfo_dat::cache;
use async_trait::async_trait;
use flate2::read::GzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tokio::time::Duration;

use crate::client::{RateLimiter, status_error};
use crate::credentials::Credentials;
use crate::error::ScrapeError;

pub const DEFAULT_API_URL: &str = "http://api.anidb.net:9001/httpapi";
const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(2);
const PROTOCOL_VERSION: &str = "1";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Anything that can produce full metadata for an AniDB id.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch(&self, aid: u32) -> Result<AnimeMetadata, ScrapeError>;
}

#[async_trait]
impl<T: MetadataSource + ?Sized> MetadataSource for Box<T> {
    async fn fetch(&self, aid: u32) -> Result<AnimeMetadata, ScrapeError> {
        (**self).fetch(aid).await
    }
}

/// Client for the AniDB HTTP API.
pub struct AniDbClient {
    http: reqwest::Client,
    api_url: String,
    client: String,
    version: String,
    limiter: RateLimiter,
}

impl AniDbClient {
    /// Requires a registered client name and version in `creds`.
    pub fn new(
        http: reqwest::Client,
        api_url: impl Into<String>,
        creds: &Credentials,
    ) -> Result<Self, ScrapeError> {
        let (client, version) = creds.anidb_client().ok_or_else(|| {
            ScrapeError::misconfigured(
                "No AniDB HTTP client configured. Register one on anidb.net and run 'anidb-nfo config credentials'",
            )
        })?;
        Ok(Self {
            http,
            api_url: api_url.into(),
            client: client.to_string(),
            version: version.to_string(),
            limiter: RateLimiter::new(MIN_REQUEST_INTERVAL),
        })
    }
}

#[async_trait]
impl MetadataSource for AniDbClient {
    async fn fetch(&self, aid: u32) -> Result<AnimeMetadata, ScrapeError> {
        self.limiter.wait().await;
        log::debug!("Fetching AniDB metadata for {aid}");

        let aid_param = aid.to_string();
        let resp = self
            .http
            .get(&self.api_url)
            .query(&[
                ("request", "anime"),
                ("client", self.client.as_str()),
                ("clientver", self.version.as_str()),
                ("protover", PROTOCOL_VERSION),
                ("aid", aid_param.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body = decode_body(&resp.bytes().await?)?;
        if !status.is_success() {
            return Err(status_error("AniDB", status, &String::from_utf8_lossy(&body)));
        }
        parse_anime(&body)
    }
}

/// Inflate a response body when it carries the gzip magic.
pub fn decode_body(bytes: &[u8]) -> Result<Vec<u8>, ScrapeError> {
    if !bytes.starts_with(&GZIP_MAGIC) {
        return Ok(bytes.to_vec());
    }
    let mut out = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}

fn classify_error(message: &str) -> ScrapeError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("client version missing or invalid") || lower.contains("client values missing")
    {
        ScrapeError::misconfigured(format!(
            "AniDB rejected the client ({message}). Please register an HTTP client on anidb.net and update the credentials"
        ))
    } else if lower.contains("banned") {
        ScrapeError::access_denied(format!("AniDB: {message}"))
    } else {
        ScrapeError::api(format!("AniDB: {message}"))
    }
}

#[derive(Default)]
struct PendingEpisode {
    id: u32,
    number: String,
    category: Option<EpisodeCategory>,
    air_date: Option<String>,
    length: Option<u32>,
    titles: Vec<LocalizedTitle>,
    summary: Option<String>,
}

impl PendingEpisode {
    fn finish(self) -> EpisodeRecord {
        let category = self.category.unwrap_or_else(|| {
            self.number
                .chars()
                .next()
                .filter(|c| c.is_ascii_alphabetic())
                .and_then(|c| EpisodeCategory::from_prefix(c).ok())
                .unwrap_or(EpisodeCategory::Regular)
        });
        EpisodeRecord {
            id: self.id,
            number: self.number,
            category,
            air_date: self.air_date,
            length: self.length,
            titles: self.titles,
            summary: self.summary,
        }
    }
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, ScrapeError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Parse an `anime` response (already inflated).
pub fn parse_anime(xml: &[u8]) -> Result<AnimeMetadata, ScrapeError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut path = String::new();
    let mut text = String::new();
    let mut anime: Option<AnimeMetadata> = None;
    let mut error: Option<String> = None;
    // (type, lang) of the title being read
    let mut title_attrs: (Option<String>, Option<String>) = (None, None);
    let mut episode: Option<PendingEpisode> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                path.push('/');
                path.push_str(&name);
                text.clear();

                match path.as_str() {
                    "/error" => error = Some(String::new()),
                    "/anime" => {
                        let id = attribute(e, b"id")?
                            .and_then(|v| v.parse().ok())
                            .ok_or_else(|| ScrapeError::api("AniDB: <anime> without id"))?;
                        anime = Some(AnimeMetadata {
                            anidb: id,
                            kind: None,
                            episode_count: None,
                            start_date: None,
                            end_date: None,
                            titles: Vec::new(),
                            description: None,
                            picture: None,
                            restricted: attribute(e, b"restricted")?.as_deref() == Some("true"),
                            episodes: Vec::new(),
                        });
                    }
                    "/anime/titles/title" | "/anime/episodes/episode/title" => {
                        title_attrs = (attribute(e, b"type")?, attribute(e, b"xml:lang")?);
                    }
                    "/anime/episodes/episode" => {
                        episode = Some(PendingEpisode {
                            id: attribute(e, b"id")?.and_then(|v| v.parse().ok()).unwrap_or(0),
                            ..Default::default()
                        });
                    }
                    "/anime/episodes/episode/epno" => {
                        if let Some(ep) = episode.as_mut() {
                            ep.category = attribute(e, b"type")?
                                .and_then(|v| v.parse().ok())
                                .and_then(|code| EpisodeCategory::from_code(code).ok());
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(ref e) => text.push_str(&e.unescape()?),
            Event::CData(ref e) => text.push_str(&String::from_utf8_lossy(e)),
            Event::End(_) => {
                let value = non_empty(&text);
                if path == "/anime/episodes/episode" {
                    if let (Some(a), Some(ep)) = (anime.as_mut(), episode.take()) {
                        a.episodes.push(ep.finish());
                    }
                }
                match (path.as_str(), anime.as_mut(), episode.as_mut()) {
                    ("/error", _, _) => error = Some(text.trim().to_string()),
                    ("/anime/type", Some(a), _) => a.kind = value,
                    ("/anime/episodecount", Some(a), _) => {
                        a.episode_count = value.and_then(|v| v.parse().ok())
                    }
                    ("/anime/startdate", Some(a), _) => a.start_date = value,
                    ("/anime/enddate", Some(a), _) => a.end_date = value,
                    ("/anime/description", Some(a), _) => a.description = value,
                    ("/anime/picture", Some(a), _) => a.picture = value,
                    ("/anime/titles/title", Some(a), _) => {
                        let (kind, lang) = std::mem::take(&mut title_attrs);
                        if let Some(title) = value {
                            a.titles.push(TitleVariant::new(
                                title,
                                TitleType::from_tag(kind.as_deref().unwrap_or("")),
                                lang.unwrap_or_default(),
                            ));
                        }
                    }
                    ("/anime/episodes/episode/epno", _, Some(ep)) => {
                        ep.number = value.unwrap_or_default()
                    }
                    ("/anime/episodes/episode/length", _, Some(ep)) => {
                        ep.length = value.and_then(|v| v.parse().ok())
                    }
                    ("/anime/episodes/episode/airdate", _, Some(ep)) => ep.air_date = value,
                    ("/anime/episodes/episode/summary", _, Some(ep)) => ep.summary = value,
                    ("/anime/episodes/episode/title", _, Some(ep)) => {
                        let (_, lang) = std::mem::take(&mut title_attrs);
                        if let Some(title) = value {
                            ep.titles.push(LocalizedTitle {
                                title,
                                language: lang.unwrap_or_default(),
                            });
                        }
                    }
                    _ => {}
                }
                text.clear();
                if let Some(pos) = path.rfind('/') {
                    path.truncate(pos);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(message) = error {
        return Err(classify_error(&message));
    }
    anime.ok_or_else(|| ScrapeError::api("AniDB: response contains no <anime> element"))
}

/// Per-anime metadata with a TTL-gated JSON cache at `<root>/anidb/<aid>.json`.
pub struct MetadataStore<S = AniDbClient> {
    source: S,
    cache_root: PathBuf,
    max_age_days: u32,
}

impl<S: MetadataSource> MetadataStore<S> {
    pub fn new(source: S, cache_root: impl Into<PathBuf>, max_age_days: u32) -> Self {
        Self {
            source,
            cache_root: cache_root.into(),
            max_age_days,
        }
    }

    pub fn cache_path(&self, aid: u32) -> PathBuf {
        entity_path(&self.cache_root, aid)
    }

    /// Cached metadata when fresh, otherwise a fetch that refreshes the cache.
    ///
    /// `force` bypasses the freshness check. When the fetch fails with a
    /// non-fatal error, any older cached copy is returned instead.
    pub async fn get(&self, aid: u32, force: bool) -> Result<AnimeMetadata, ScrapeError> {
        let path = self.cache_path(aid);
        if let Some(cached) = cache::load_entity::<AnimeMetadata>(&path, self.max_age_days, force)?
        {
            log::debug!("Using cached metadata for {aid}");
            return Ok(cached);
        }

        let metadata = match self.source.fetch(aid).await {
            Ok(metadata) => metadata,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => match cache::read_entity::<AnimeMetadata>(&path)? {
                Some(stale) => {
                    log::warn!("Fetching metadata for {aid} failed ({e}); using stale cache");
                    return Ok(stale);
                }
                None => return Err(e),
            },
        };
        cache::store_entity(&path, &metadata)?;
        Ok(metadata)
    }
}

fn entity_path(root: &Path, aid: u32) -> PathBuf {
    root.join("anidb").join(format!("{aid}.json"))
}
