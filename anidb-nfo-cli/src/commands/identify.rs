use std::path::{Path, PathBuf};

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use anidb_nfo_lib::{BoundEpisode, IdentifyRequest, Pipeline, ResolvedAnime, Settings};
use anidb_nfo_scraper::Credentials;

use crate::CliError;
use crate::spinner::Spinner;

/// Language used for episode titles in the summary.
const DISPLAY_LANGUAGE: &str = "en";

pub(crate) struct IdentifyArgs {
    pub dirs: Vec<PathBuf>,
    pub aid: Option<u32>,
    pub anilist: Option<u32>,
    pub tmdb: Option<u32>,
    pub force_update: bool,
}

impl IdentifyArgs {
    fn has_explicit_ids(&self) -> bool {
        self.aid.is_some() || self.anilist.is_some() || self.tmdb.is_some()
    }

    fn request_for(&self, dir: &Path) -> IdentifyRequest {
        IdentifyRequest {
            anidb: self.aid,
            anilist: self.anilist,
            tmdb: self.tmdb,
            force_update: self.force_update,
            ..IdentifyRequest::new(dir)
        }
    }
}

/// Identify each directory and print what was found.
pub(crate) fn run_identify(args: IdentifyArgs) -> Result<(), CliError> {
    if args.has_explicit_ids() && args.dirs.len() > 1 {
        return Err(CliError::usage(
            "--aid, --anilistid and --tmdbid apply to a single directory",
        ));
    }

    let settings = Settings::load()?;
    let creds = Credentials::load();
    let rt = tokio::runtime::Runtime::new().map_err(|e| CliError::runtime(e.to_string()))?;

    rt.block_on(identify_all(&args, &settings, &creds))
}

async fn identify_all(
    args: &IdentifyArgs,
    settings: &Settings,
    creds: &Credentials,
) -> Result<(), CliError> {
    let spinner = Spinner::new("Loading AniDB title catalog...");
    let loaded = Pipeline::new(settings, creds).await;
    spinner.finish();
    let (mut pipeline, _report) = loaded?;
    crate::log_blank();

    let mut failed = 0usize;
    for dir in &args.dirs {
        let spinner = Spinner::new(format!("Identifying {}", dir.display()));
        let result = pipeline.identify(&args.request_for(dir)).await;
        spinner.finish();

        match result {
            Ok(resolved) => print_resolved(&resolved),
            // Credentials or client registration are wrong; every other directory would fail too.
            Err(e) if e.needs_user_action() => return Err(e.into()),
            Err(e) => {
                failed += 1;
                log::warn!(
                    "{} {}: {}",
                    "\u{2718}".if_supports_color(Stdout, |t| t.red()),
                    dir.display(),
                    e,
                );
                crate::log_blank();
            }
        }
    }

    if failed > 0 {
        return Err(CliError::incomplete(format!(
            "{} of {} directories could not be identified",
            failed,
            args.dirs.len(),
        )));
    }
    Ok(())
}

fn print_resolved(resolved: &ResolvedAnime) {
    let ids = &resolved.ids;
    log::info!(
        "{} {} {}",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        resolved.title.if_supports_color(Stdout, |t| t.bold()),
        format!("[anidb-{}]", ids.anidb).if_supports_color(Stdout, |t| t.dimmed()),
    );

    let mut links = Vec::new();
    if let Some(id) = ids.anilist {
        links.push(format!("AniList {id}"));
    }
    if let Some(id) = ids.tmdb {
        links.push(format!("TMDB {id}"));
    }
    if let Some(id) = ids.tvdb {
        match ids.tvdb_season {
            Some(season) => links.push(format!("TVDB {id} (season {season})")),
            None => links.push(format!("TVDB {id}")),
        }
    }
    if links.is_empty() {
        log::info!(
            "    {}",
            "no cross-references".if_supports_color(Stdout, |t| t.dimmed()),
        );
    } else {
        log::info!("    {}", links.join(", "));
    }

    let meta = &resolved.metadata;
    let mut facts = Vec::new();
    if let Some(kind) = &meta.kind {
        facts.push(kind.clone());
    }
    if let Some(count) = meta.episode_count {
        facts.push(format!("{count} episodes"));
    }
    if let Some(date) = meta.premiered() {
        facts.push(format!("premiered {date}"));
    }
    if !facts.is_empty() {
        log::info!("    {}", facts.join(", "));
    }

    for bound in &resolved.episodes {
        let file_name = bound
            .file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let title = bound
            .episodes
            .first()
            .and_then(|ep| ep.title_for(DISPLAY_LANGUAGE))
            .unwrap_or(&bound.file.title);
        log::info!(
            "    {}  {} {}",
            episode_label(bound).if_supports_color(Stdout, |t| t.cyan()),
            title,
            format!("({file_name})").if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
    crate::log_blank();
}

/// `S01E05`, or `S01E05-E07` for a file holding several episodes.
fn episode_label(bound: &BoundEpisode) -> String {
    let Some(first) = bound.display_number() else {
        return "S??E??".to_string();
    };
    let last = bound
        .episodes
        .last()
        .and_then(|ep| anidb_nfo_lib::display_number(&ep.number, ep.category));
    match last {
        Some(last) if bound.episodes.len() > 1 && last != first => format!(
            "S{:02}E{:02}-E{:02}",
            first.season, first.episode, last.episode
        ),
        _ => format!("S{:02}E{:02}", first.season, first.episode),
    }
}

#[cfg(test)]
mod tests {
    use anidb_nfo_core::{EpisodeCategory, EpisodeRecord};
    use anidb_nfo_lib::parse_filename;

    use super::*;

    fn record(number: &str, category: EpisodeCategory) -> EpisodeRecord {
        EpisodeRecord {
            id: 1,
            number: number.to_string(),
            category,
            air_date: None,
            length: None,
            titles: Vec::new(),
            summary: None,
        }
    }

    fn bound(name: &str, episodes: Vec<EpisodeRecord>) -> BoundEpisode {
        BoundEpisode {
            file: parse_filename(Path::new(name)).unwrap(),
            episodes,
        }
    }

    #[test]
    fn labels() {
        let single = bound(
            "Show - 05 - Five.mkv",
            vec![record("5", EpisodeCategory::Regular)],
        );
        assert_eq!(episode_label(&single), "S01E05");

        let range = bound(
            "Show - 05-07 - Three.mkv",
            vec![
                record("5", EpisodeCategory::Regular),
                record("6", EpisodeCategory::Regular),
                record("7", EpisodeCategory::Regular),
            ],
        );
        assert_eq!(episode_label(&range), "S01E05-E07");

        let special = bound(
            "Show - S1 - Special.mkv",
            vec![record("S1", EpisodeCategory::Special)],
        );
        assert_eq!(episode_label(&special), "S00E201");
    }

    #[test]
    fn explicit_ids_are_carried_into_the_request() {
        let args = IdentifyArgs {
            dirs: vec![PathBuf::from("/anime/Show")],
            aid: Some(23),
            anilist: None,
            tmdb: Some(30991),
            force_update: true,
        };
        assert!(args.has_explicit_ids());
        let request = args.request_for(&args.dirs[0]);
        assert_eq!(request.anidb, Some(23));
        assert_eq!(request.tmdb, Some(30991));
        assert!(request.force_update);
        assert_eq!(request.directory, PathBuf::from("/anime/Show"));
    }
}
