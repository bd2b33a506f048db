use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use anidb_nfo_scraper::{CredentialSource, Credentials};

use crate::CliError;

fn mask_value(s: &str) -> String {
    if s.chars().count() <= 2 {
        "****".to_string()
    } else {
        let head: String = s.chars().take(2).collect();
        format!("{head}****")
    }
}

/// Show current credentials and their sources.
pub(crate) fn run_credentials_show() -> Result<(), CliError> {
    let path = anidb_nfo_scraper::config_path();
    let sources = anidb_nfo_scraper::credential_sources();
    let creds = Credentials::load();

    log::info!(
        "{}",
        "Catalog Credentials".if_supports_color(Stdout, |t| t.bold()),
    );
    crate::log_blank();
    super::config::file_status("Config file", path.as_deref());
    crate::log_blank();

    let fields: [(&str, &CredentialSource, Option<&String>, bool); 4] = [
        (
            "anidb client",
            &sources.anidb_client,
            creds.anidb_client.as_ref(),
            false,
        ),
        (
            "anidb version",
            &sources.anidb_version,
            creds.anidb_version.as_ref(),
            false,
        ),
        (
            "anilist token",
            &sources.anilist_token,
            creds.anilist_token.as_ref(),
            true,
        ),
        (
            "tmdb api key",
            &sources.tmdb_api_key,
            creds.tmdb_api_key.as_ref(),
            true,
        ),
    ];

    for (name, source, value, is_secret) in fields {
        let source_str = format!("({})", source);
        match value {
            Some(v) => {
                let shown = if is_secret { mask_value(v) } else { v.clone() };
                log::info!(
                    "  {} {} {}",
                    format!("{}:", name).if_supports_color(Stdout, |t| t.cyan()),
                    shown,
                    source_str.if_supports_color(Stdout, |t| t.dimmed()),
                );
            }
            None => {
                log::info!(
                    "  {} {} {}",
                    format!("{}:", name).if_supports_color(Stdout, |t| t.cyan()),
                    "not set".if_supports_color(Stdout, |t| t.yellow()),
                    source_str.if_supports_color(Stdout, |t| t.dimmed()),
                );
            }
        }
    }

    crate::log_blank();
    if creds.anidb_client().is_none() {
        log::warn!(
            "{} AniDB client name and version are required for identification.",
            "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
        );
    }
    Ok(())
}

/// Merge the given values into the stored credentials and save them.
pub(crate) fn run_credentials_set(
    anidb_client: Option<String>,
    anidb_version: Option<String>,
    anilist_token: Option<String>,
    tmdb_api_key: Option<String>,
) -> Result<(), CliError> {
    if anidb_client.is_none()
        && anidb_version.is_none()
        && anilist_token.is_none()
        && tmdb_api_key.is_none()
    {
        return Err(CliError::usage(
            "nothing to set; pass at least one of --anidb-client, --anidb-version, --anilist-token, --tmdb-api-key",
        ));
    }

    let stored = match anidb_nfo_scraper::config_path() {
        Some(path) => Credentials::stored_in(&path),
        None => Credentials::default(),
    };
    let merged = stored.with_overrides(anidb_client, anidb_version, anilist_token, tmdb_api_key);
    let path = anidb_nfo_scraper::save_to_file(&merged)?;
    log::info!(
        "{} Credentials saved to {}",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        path.display(),
    );
    Ok(())
}
