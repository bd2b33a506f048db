use std::path::Path;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use anidb_nfo_lib::{Settings, settings_path};

use crate::CliError;

pub(crate) fn file_status(label: &str, path: Option<&Path>) {
    match path {
        Some(p) if p.exists() => {
            log::info!(
                "  {}: {} {}",
                label,
                p.display().if_supports_color(Stdout, |t| t.cyan()),
                "(exists)".if_supports_color(Stdout, |t| t.green()),
            );
        }
        Some(p) => {
            log::info!(
                "  {}: {} {}",
                label,
                p.display().if_supports_color(Stdout, |t| t.cyan()),
                "(not found)".if_supports_color(Stdout, |t| t.dimmed()),
            );
        }
        None => {
            log::info!(
                "  {}: {}",
                label,
                "could not determine path".if_supports_color(Stdout, |t| t.red()),
            );
        }
    }
}

/// Show the effective settings, defaults included.
pub(crate) fn run_config_show() -> Result<(), CliError> {
    let settings = Settings::load()?;

    log::info!(
        "{}",
        "anidb-nfo Settings".if_supports_color(Stdout, |t| t.bold()),
    );
    crate::log_blank();
    file_status("Settings file", Some(&settings_path()));
    log::info!(
        "  Cache root: {}",
        settings
            .cache_root()?
            .display()
            .if_supports_color(Stdout, |t| t.cyan()),
    );
    log::info!(
        "  Local overrides: {}",
        settings
            .overrides_path()?
            .display()
            .if_supports_color(Stdout, |t| t.cyan()),
    );
    crate::log_blank();

    for line in settings.to_toml_string()?.lines() {
        log::info!("  {}", line);
    }
    Ok(())
}

/// Print the config file paths.
pub(crate) fn run_config_path() -> Result<(), CliError> {
    log::info!("{}", settings_path().display());
    match anidb_nfo_scraper::config_path() {
        Some(path) => log::info!("{}", path.display()),
        None => log::warn!("Could not determine the credentials file path"),
    }
    Ok(())
}
