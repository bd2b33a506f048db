//! Binding of episode video files to canonical episode records.
//!
//! Filenames are expected in one of two shapes:
//!
//! ```text
//! Show - 01 - Title (ABCDEF12).mkv        single episode
//! Show - 01-03 - Title (ABCDEF12).mkv     inclusive range
//! ```
//!
//! Episode tokens may carry a one-letter category prefix (`S`, `C`, `T`,
//! `P`, `O`); an `E` prefix marks a regular episode. The trailing CRC tag is
//! optional and removed from the title.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anidb_nfo_core::{EpisodeCategory, EpisodeRecord};
use regex::Regex;

use crate::error::LibError;

/// Video container extensions picked up by [`EpisodeBinder::scan`].
pub const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "ogm", "avi"];

static SINGLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s-\s(?P<episode>[SCTPOE]?\d+)\s-\s(?P<title>.+)\.\w{3}$")
        .expect("valid single-episode pattern")
});

static RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s-\s(?P<start>[SCTPO]?\d+)-(?P<end>[SCTPO]?\d+)\s-\s(?P<title>.+)\.\w{3}$")
        .expect("valid episode-range pattern")
});

static CRC_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([A-Za-z0-9]{8}\)").expect("valid checksum pattern"));

/// What a filename says about its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeFileMatch {
    pub path: PathBuf,
    /// First episode token, normalized (`"1"`, `"S2"`).
    pub start: String,
    /// Last episode token; equal to `start` for single-episode files.
    pub end: String,
    /// Free-text title with the checksum tag removed.
    pub title: String,
}

impl EpisodeFileMatch {
    pub fn is_range(&self) -> bool {
        self.start != self.end
    }

    /// Every episode token the file covers, in order.
    pub fn tokens(&self) -> Box<dyn Iterator<Item = String>> {
        expand_range(&self.start, &self.end)
    }

    /// Offset of an episode number within the file's range, if covered.
    ///
    /// Matches what [`tokens`](Self::tokens) would yield without expanding it.
    pub fn position(&self, number: &str) -> Option<u32> {
        if number == self.start {
            return Some(0);
        }
        let (prefix, from, to) = range_bounds(&self.start, &self.end)?;
        let (number_prefix, digits) = split_token(number);
        let n: u32 = digits.parse().ok()?;
        if number_prefix != prefix || !(from..=to).contains(&n) || format_token(prefix, n) != number {
            return None;
        }
        Some(n - from)
    }
}

/// Parse a file's name. Returns `None` when it fits neither shape.
pub fn parse_filename(path: &Path) -> Option<EpisodeFileMatch> {
    let name = path.file_name()?.to_str()?;

    let (start, end, title) = if let Some(caps) = RANGE.captures(name) {
        (
            normalize_token(&caps["start"]),
            normalize_token(&caps["end"]),
            caps["title"].to_string(),
        )
    } else {
        let caps = SINGLE.captures(name)?;
        let token = normalize_token(&caps["episode"]);
        (token.clone(), token, caps["title"].to_string())
    };

    Some(EpisodeFileMatch {
        path: path.to_path_buf(),
        start,
        end,
        title: CRC_TAG.replace_all(&title, "").trim().to_string(),
    })
}

fn split_token(token: &str) -> (Option<char>, &str) {
    match token.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => (Some(c.to_ascii_uppercase()), &token[1..]),
        _ => (None, token),
    }
}

/// Canonical form of an episode token: no leading zeros, uppercase prefix,
/// and no `E` prefix on regular episodes.
pub fn normalize_token(token: &str) -> String {
    let (prefix, digits) = split_token(token.trim());
    let Ok(number) = digits.parse::<u32>() else {
        return token.trim().to_string();
    };
    match prefix {
        None | Some('E') => number.to_string(),
        Some(p) => format!("{p}{number}"),
    }
}

fn format_token(prefix: Option<char>, number: u32) -> String {
    match prefix {
        Some(p) => format!("{p}{number}"),
        None => number.to_string(),
    }
}

/// Prefix and numeric bounds of an expandable range.
fn range_bounds(start: &str, end: &str) -> Option<(Option<char>, u32, u32)> {
    if start == end {
        return None;
    }
    let (start_prefix, start_digits) = split_token(start);
    let (end_prefix, end_digits) = split_token(end);
    let from = start_digits.parse::<u32>().ok()?;
    let to = end_digits.parse::<u32>().ok()?;
    if start_prefix != end_prefix || from > to {
        return None;
    }
    Some((start_prefix, from, to))
}

/// Lazily expand an inclusive token range.
///
/// Both ends must share the same prefix (or none) and ascend; anything else
/// is an unexpandable unit made of the start token alone.
pub fn expand_range(start: &str, end: &str) -> Box<dyn Iterator<Item = String>> {
    match range_bounds(start, end) {
        Some((prefix, from, to)) => Box::new((from..=to).map(move |n| format_token(prefix, n))),
        None => {
            if start != end {
                log::debug!("Not expanding episode range {start}-{end}");
            }
            Box::new(std::iter::once(start.to_string()))
        }
    }
}

/// Season/episode pair used for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayNumber {
    pub season: u32,
    pub episode: u32,
}

/// Display numbering for an episode token.
///
/// Regular episodes go to season 1 with their own number. Every other
/// category goes to season 0 as `number + category code * 100`, which keeps
/// specials, credits, trailers and so on from colliding.
pub fn display_number(token: &str, category: EpisodeCategory) -> Option<DisplayNumber> {
    let (_, digits) = split_token(token.trim());
    let number: u32 = digits.parse().ok()?;
    Some(match category {
        EpisodeCategory::Regular => DisplayNumber {
            season: 1,
            episode: number,
        },
        other => DisplayNumber {
            season: 0,
            episode: other.code().checked_mul(100)?.checked_add(number)?,
        },
    })
}

/// A file and the canonical records it contains.
#[derive(Debug, Clone)]
pub struct BoundEpisode {
    pub file: EpisodeFileMatch,
    pub episodes: Vec<EpisodeRecord>,
}

impl BoundEpisode {
    /// Display number of the first record in the file.
    pub fn display_number(&self) -> Option<DisplayNumber> {
        let first = self.episodes.first()?;
        display_number(&first.number, first.category)
    }
}

/// Binds parsed filenames to the episode list of one anime.
pub struct EpisodeBinder<'a> {
    episodes: &'a [EpisodeRecord],
}

impl<'a> EpisodeBinder<'a> {
    pub fn new(episodes: &'a [EpisodeRecord]) -> Self {
        Self { episodes }
    }

    /// List the video files directly inside `dir`, sorted by path.
    pub fn scan(dir: &Path) -> Result<Vec<PathBuf>, LibError> {
        if !dir.is_dir() {
            return Err(LibError::InvalidDirectory(dir.to_path_buf()));
        }
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_video(path))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Every record whose episode number equals one of the file's tokens,
    /// ordered by token.
    pub fn bind(&self, file: &EpisodeFileMatch) -> Vec<&'a EpisodeRecord> {
        let mut matched: Vec<(u32, &'a EpisodeRecord)> = self
            .episodes
            .iter()
            .filter_map(|ep| file.position(&ep.number).map(|pos| (pos, ep)))
            .collect();
        matched.sort_by_key(|(pos, _)| *pos);
        matched.into_iter().map(|(_, ep)| ep).collect()
    }

    /// Parse and bind each file, skipping those that cannot be used.
    pub fn bind_all(&self, files: &[PathBuf]) -> Vec<BoundEpisode> {
        let mut bound = Vec::new();
        for path in files {
            let Some(file) = parse_filename(path) else {
                log::warn!("Skipping unparseable filename: {}", path.display());
                continue;
            };
            let episodes: Vec<EpisodeRecord> = self.bind(&file).into_iter().cloned().collect();
            if episodes.is_empty() {
                log::warn!(
                    "No episode {}-{} for {}",
                    file.start,
                    file.end,
                    path.display()
                );
                continue;
            }
            bound.push(BoundEpisode { file, episodes });
        }
        bound
    }
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(ext)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u32, number: &str, category: EpisodeCategory) -> EpisodeRecord {
        EpisodeRecord {
            id,
            number: number.to_string(),
            category,
            air_date: None,
            length: None,
            titles: Vec::new(),
            summary: None,
        }
    }

    #[test]
    fn range_filename_expands_and_strips_checksum() {
        let file = parse_filename(Path::new("Show - 01-03 - Title (ABCDEF12).mkv")).unwrap();
        assert_eq!(file.tokens().collect::<Vec<_>>(), ["1", "2", "3"]);
        assert_eq!(file.title, "Title");
        assert!(file.is_range());

        let episodes = [
            record(10, "1", EpisodeCategory::Regular),
            record(11, "2", EpisodeCategory::Regular),
            record(12, "3", EpisodeCategory::Regular),
            record(13, "4", EpisodeCategory::Regular),
        ];
        let bound = EpisodeBinder::new(&episodes).bind(&file);
        let ids: Vec<_> = bound.iter().map(|e| e.id).collect();
        assert_eq!(ids, [10, 11, 12]);
    }

    #[test]
    fn single_filename_keeps_prefix() {
        let file = parse_filename(Path::new("/media/Show - S01 - Special Title.mkv")).unwrap();
        assert_eq!(file.start, "S1");
        assert!(!file.is_range());
        assert_eq!(file.title, "Special Title");

        let explicit = parse_filename(Path::new("Show - E07 - Seven.mp4")).unwrap();
        assert_eq!(explicit.start, "7");
    }

    #[test]
    fn prefixed_ranges() {
        let expand = |start, end| expand_range(start, end).collect::<Vec<_>>();
        assert_eq!(expand("S1", "S3"), ["S1", "S2", "S3"]);
        assert_eq!(expand("S1", "C3"), ["S1"]);
        assert_eq!(expand("5", "3"), ["5"]);
    }

    #[test]
    fn position_follows_token_equality() {
        let file = parse_filename(Path::new("Show - S1-S3 - Specials.mkv")).unwrap();
        assert_eq!(file.position("S1"), Some(0));
        assert_eq!(file.position("S3"), Some(2));
        assert_eq!(file.position("S03"), None);
        assert_eq!(file.position("2"), None);
        assert_eq!(file.position("S4"), None);

        let mixed = parse_filename(Path::new("Show - S1-C3 - Mixed.mkv")).unwrap();
        assert_eq!(mixed.position("S1"), Some(0));
        assert_eq!(mixed.position("S2"), None);
    }

    #[test]
    fn huge_range_binds_without_expanding() {
        let file = parse_filename(Path::new("Show - 0001-4294967295 - x.mkv")).unwrap();
        assert_eq!(file.end, "4294967295");

        let episodes = [
            record(3, "3", EpisodeCategory::Regular),
            record(1, "1", EpisodeCategory::Regular),
            record(9, "S1", EpisodeCategory::Special),
            record(2, "2", EpisodeCategory::Regular),
        ];
        let bound = EpisodeBinder::new(&episodes).bind(&file);
        let ids: Vec<_> = bound.iter().map(|e| e.id).collect();
        assert_eq!(ids, [1, 2, 3]);
    }

    #[test]
    fn unparseable_names_are_rejected() {
        assert!(parse_filename(Path::new("Show 01.mkv")).is_none());
        assert!(parse_filename(Path::new("Show - Pilot - Title.mkv")).is_none());
    }

    #[test]
    fn display_numbering() {
        assert_eq!(
            display_number("S2", EpisodeCategory::Credit),
            Some(DisplayNumber {
                season: 0,
                episode: 302
            })
        );
        assert_eq!(
            display_number("12", EpisodeCategory::Regular),
            Some(DisplayNumber {
                season: 1,
                episode: 12
            })
        );
        assert_eq!(
            display_number("S1", EpisodeCategory::Special).map(|d| d.episode),
            Some(201)
        );
        assert_eq!(display_number("OP", EpisodeCategory::Other), None);
        assert_eq!(display_number("S4294967295", EpisodeCategory::Special), None);
        assert_eq!(
            display_number("4294967295", EpisodeCategory::Regular).map(|d| d.episode),
            Some(u32::MAX)
        );
    }

    #[test]
    fn one_file_may_bind_several_records() {
        let episodes = [
            record(1, "1", EpisodeCategory::Regular),
            record(2, "1", EpisodeCategory::Regular),
        ];
        let file = parse_filename(Path::new("Show - 1 - Double.mkv")).unwrap();
        assert_eq!(EpisodeBinder::new(&episodes).bind(&file).len(), 2);
    }
}
