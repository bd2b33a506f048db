//! TTL-gated cache for remote bulk datasets and per-anime metadata.
//!
//! Every cached artifact is a plain file under the cache root. An artifact is
//! fresh while `now - mtime < max_age`; stale artifacts are refetched, but a
//! failed refetch never removes the previous copy, so callers can fall back
//! to stale data.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};
use flate2::write::GzDecoder;
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::DatError;

const SECS_PER_DAY: f64 = 86_400.0;

/// A remote resource mirrored to a local file.
#[derive(Debug, Clone)]
pub struct DataSource {
    /// Human-readable name used in logs and errors.
    pub name: String,
    pub url: String,
    /// Local path of the cached artifact.
    pub cache: PathBuf,
    /// Maximum age in days before the artifact is refetched.
    pub max_age_days: u32,
}

impl DataSource {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        cache: impl Into<PathBuf>,
        max_age_days: u32,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            cache: cache.into(),
            max_age_days,
        }
    }

    /// Whether the remote file is gzip-compressed and must be inflated on the way in.
    pub fn is_gzip(&self) -> bool {
        self.url
            .split(['?', '#'])
            .next()
            .is_some_and(|path| path.ends_with(".gz"))
    }

    pub fn has_local_copy(&self) -> bool {
        self.cache.is_file()
    }

    pub fn is_fresh(&self) -> bool {
        is_fresh(&self.cache, self.max_age_days)
    }
}

/// Outcome of [`ensure_fresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// The local artifact was young enough; no network access happened.
    Fresh,
    /// The artifact was (re)downloaded.
    Downloaded,
}

/// Information about a cached artifact for display purposes.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Path relative to the cache root.
    pub name: String,
    pub file_size: u64,
    pub modified: String,
}

/// Default cache root: `~/.cache/anidb-nfo`.
pub fn cache_dir() -> Result<PathBuf, DatError> {
    let base =
        dirs::cache_dir().ok_or_else(|| DatError::cache("Could not determine cache directory"))?;
    Ok(base.join("anidb-nfo"))
}

/// Age of a file in (fractional) days relative to `now`, or `None` if it doesn't exist.
///
/// Modification times in the future count as age zero.
pub fn age_days_at(path: &Path, now: SystemTime) -> Option<f64> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
    Some(age.as_secs_f64() / SECS_PER_DAY)
}

/// Whether `path` exists and is younger than `max_age_days` at time `now`.
pub fn is_fresh_at(path: &Path, max_age_days: u32, now: SystemTime) -> bool {
    age_days_at(path, now).is_some_and(|age| age < f64::from(max_age_days))
}

pub fn is_fresh(path: &Path, max_age_days: u32) -> bool {
    is_fresh_at(path, max_age_days, SystemTime::now())
}

/// Create a directory tree readable only by owner and group.
pub fn create_private_dir(path: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o750);
    }
    builder.create(path)
}

fn create_private_file(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o660);
    }
    options.open(path)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Make sure the artifact for `source` is fresh, downloading it if needed.
///
/// On any network or stream failure this returns [`DatError::Unavailable`]
/// and leaves an existing (stale) artifact in place.
pub async fn ensure_fresh(
    http: &reqwest::Client,
    source: &DataSource,
) -> Result<CacheStatus, DatError> {
    if source.is_fresh() {
        log::debug!("{} is fresh ({})", source.name, source.cache.display());
        return Ok(CacheStatus::Fresh);
    }

    if let Some(parent) = source.cache.parent() {
        create_private_dir(parent)?;
    }

    log::info!("Downloading {} from {}", source.name, source.url);
    let response = http
        .get(&source.url)
        .send()
        .await
        .map_err(|e| DatError::unavailable(&source.name, e))?;

    if !response.status().is_success() {
        return Err(DatError::unavailable(
            &source.name,
            format!("HTTP {}", response.status()),
        ));
    }

    let gzip_encoded = response
        .headers()
        .get(reqwest::header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("gzip"));

    let written = write_body(
        response.bytes_stream(),
        &source.cache,
        source.is_gzip() || gzip_encoded,
    )
    .await
    .map_err(|e| DatError::unavailable(&source.name, e))?;

    log::debug!(
        "Wrote {} bytes to {}",
        written,
        source.cache.display()
    );
    Ok(CacheStatus::Downloaded)
}

enum Sink {
    Plain(BufWriter<File>),
    Gzip(GzDecoder<BufWriter<File>>),
}

impl Sink {
    fn new(file: File, gzip: bool) -> Self {
        let writer = BufWriter::new(file);
        if gzip {
            Self::Gzip(GzDecoder::new(writer))
        } else {
            Self::Plain(writer)
        }
    }

    fn write_all(&mut self, chunk: &[u8]) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.write_all(chunk),
            Self::Gzip(w) => w.write_all(chunk),
        }
    }

    fn finish(self) -> io::Result<()> {
        let writer = match self {
            Self::Plain(w) => w,
            Self::Gzip(w) => w.finish()?,
        };
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    }
}

/// Stream `body` into `dest`, inflating gzip on the fly when `gzip` is set.
///
/// Data goes to a `.part` sibling first and only replaces `dest` once fully
/// flushed, so a broken stream never clobbers a previous copy. Returns the
/// number of (compressed) bytes received.
pub async fn write_body<S, B, E>(body: S, dest: &Path, gzip: bool) -> Result<u64, DatError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let tmp = partial_path(dest);
    let result = stream_to(body, &tmp, gzip).await;
    match result {
        Ok(received) => {
            fs::rename(&tmp, dest)?;
            Ok(received)
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

async fn stream_to<S, B, E>(body: S, path: &Path, gzip: bool) -> Result<u64, DatError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut sink = Sink::new(create_private_file(path)?, gzip);
    let mut body = std::pin::pin!(body);
    let mut received = 0u64;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| DatError::cache(format!("stream interrupted: {e}")))?;
        let bytes = chunk.as_ref();
        received += bytes.len() as u64;
        sink.write_all(bytes)?;
    }

    sink.finish()?;
    Ok(received)
}

/// Load a cached JSON entity if it is fresh and `force` is not set.
///
/// A cached file that no longer deserializes is treated as absent.
pub fn load_entity<T: DeserializeOwned>(
    path: &Path,
    max_age_days: u32,
    force: bool,
) -> Result<Option<T>, DatError> {
    if force || !is_fresh(path, max_age_days) {
        return Ok(None);
    }
    read_entity(path)
}

/// Load a cached JSON entity regardless of its age.
///
/// Missing and unreadable files are both `None`.
pub fn read_entity<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, DatError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_str(&contents) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            log::warn!("Ignoring unreadable cache file {}: {e}", path.display());
            Ok(None)
        }
    }
}

/// Write a JSON entity to the cache, replacing any previous copy.
pub fn store_entity<T: Serialize>(path: &Path, value: &T) -> Result<(), DatError> {
    if let Some(parent) = path.parent() {
        create_private_dir(parent)?;
    }
    let tmp = partial_path(path);
    let mut file = create_private_file(&tmp)?;
    serde_json::to_writer(&mut file, value)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// List every cached artifact below `root`.
pub fn list(root: &Path) -> Result<Vec<CacheEntry>, DatError> {
    let mut entries = Vec::new();
    if root.is_dir() {
        collect_entries(root, root, &mut entries)?;
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

fn collect_entries(root: &Path, dir: &Path, out: &mut Vec<CacheEntry>) -> Result<(), DatError> {
    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_entries(root, &path, out)?;
            continue;
        }
        let meta = entry.metadata()?;
        let modified = meta
            .modified()
            .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let name = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();
        out.push(CacheEntry {
            name,
            file_size: meta.len(),
            modified,
        });
    }
    Ok(())
}

/// Remove every cached artifact below `root`. Returns the number of bytes freed.
pub fn clear(root: &Path) -> Result<u64, DatError> {
    let mut total_size = 0u64;
    for entry in list(root)? {
        let path = root.join(&entry.name);
        fs::remove_file(&path)?;
        total_size += entry.file_size;
    }
    Ok(total_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_detection_uses_url_path() {
        let gz = DataSource::new("t", "https://example.org/a.xml.gz", "/tmp/a.xml", 7);
        let plain = DataSource::new("t", "https://example.org/a.json?x=.gz", "/tmp/a.json", 7);
        assert!(gz.is_gzip());
        assert!(!plain.is_gzip());
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/cache/anime-titles.xml")),
            PathBuf::from("/cache/anime-titles.xml.part")
        );
    }

    #[test]
    fn missing_file_is_never_fresh() {
        assert!(!is_fresh(Path::new("/nonexistent/anidb-nfo/file"), 365));
    }
}
