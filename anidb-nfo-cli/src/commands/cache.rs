use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use anidb_nfo_lib::Settings;

use crate::{CliError, format_bytes};

/// List cached datasets and metadata files.
pub(crate) fn run_cache_list() -> Result<(), CliError> {
    let root = Settings::load()?.cache_root()?;
    let entries = anidb_nfo_dat::cache::list(&root)?;

    if entries.is_empty() {
        log::info!(
            "{}",
            "No cached files.".if_supports_color(Stdout, |t| t.dimmed()),
        );
        log::info!("Run 'anidb-nfo identify <dir>' to download the AniDB datasets.");
        return Ok(());
    }

    log::info!(
        "{} {}",
        "Cached files in".if_supports_color(Stdout, |t| t.bold()),
        root.display().if_supports_color(Stdout, |t| t.cyan()),
    );
    crate::log_blank();

    let mut total_size = 0u64;
    for entry in &entries {
        total_size += entry.file_size;
        log::info!(
            "  {}  {}, {}",
            entry.name.if_supports_color(Stdout, |t| t.bold()),
            format_bytes(entry.file_size),
            entry.modified.if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
    crate::log_blank();
    log::info!(
        "Total: {} files, {}",
        entries.len(),
        format_bytes(total_size)
    );
    Ok(())
}

/// Clear the cache. The local override store lives elsewhere and is kept.
pub(crate) fn run_cache_clear() -> Result<(), CliError> {
    let root = Settings::load()?.cache_root()?;
    let freed = anidb_nfo_dat::cache::clear(&root)?;
    log::info!(
        "{} Cache cleared ({} freed)",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        format_bytes(freed),
    );
    Ok(())
}
