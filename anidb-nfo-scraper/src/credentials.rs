use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ScrapeError;

pub const ENV_ANIDB_CLIENT: &str = "ANIDB_CLIENT";
pub const ENV_ANIDB_CLIENT_VERSION: &str = "ANIDB_CLIENT_VERSION";
pub const ENV_ANILIST_TOKEN: &str = "ANILIST_TOKEN";
pub const ENV_TMDB_API_KEY: &str = "TMDB_API_KEY";

/// Credentials for every remote catalog. Each catalog is optional; a missing
/// credential disables that catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Registered AniDB HTTP client name.
    pub anidb_client: Option<String>,
    /// Version the AniDB client was registered with.
    pub anidb_version: Option<String>,
    pub anilist_token: Option<String>,
    pub tmdb_api_key: Option<String>,
}

/// Where a credential field's value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from an environment variable.
    EnvVar(&'static str),
    /// Loaded from the config file.
    ConfigFile,
    /// Not set anywhere.
    Missing,
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EnvVar(var) => write!(f, "env ${}", var),
            Self::ConfigFile => write!(f, "config file"),
            Self::Missing => write!(f, "not set"),
        }
    }
}

/// Provenance of each credential field.
#[derive(Debug)]
pub struct CredentialSources {
    pub anidb_client: CredentialSource,
    pub anidb_version: CredentialSource,
    pub anilist_token: CredentialSource,
    pub tmdb_api_key: CredentialSource,
}

/// TOML config file format.
#[derive(Debug, Default, Deserialize, Serialize)]
struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    anidb: Option<AniDbConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    anilist: Option<AniListConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tmdb: Option<TmdbConfig>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct AniDbConfig {
    client: Option<String>,
    version: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct AniListConfig {
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct TmdbConfig {
    api_key: Option<String>,
}

impl ConfigFile {
    fn anidb_client(&self) -> Option<&String> {
        self.anidb.as_ref()?.client.as_ref()
    }

    fn anidb_version(&self) -> Option<&String> {
        self.anidb.as_ref()?.version.as_ref()
    }

    fn anilist_token(&self) -> Option<&String> {
        self.anilist.as_ref()?.token.as_ref()
    }

    fn tmdb_api_key(&self) -> Option<&String> {
        self.tmdb.as_ref()?.api_key.as_ref()
    }
}

impl Credentials {
    /// Load credentials from environment variables and the config file.
    ///
    /// Priority: env vars > config file. Nothing is required here; each
    /// client checks for what it needs when it is built.
    pub fn load() -> Self {
        let config = load_config_file().unwrap_or_default();
        Self::resolve(&config, env_var)
    }

    /// Only the values stored in the config file at `path`, ignoring env vars.
    pub fn stored_in(path: &Path) -> Self {
        let config = read_config_file(path).unwrap_or_default();
        Self::resolve(&config, |_| None)
    }

    fn resolve(config: &ConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            anidb_client: env(ENV_ANIDB_CLIENT).or_else(|| config.anidb_client().cloned()),
            anidb_version: env(ENV_ANIDB_CLIENT_VERSION)
                .or_else(|| config.anidb_version().cloned()),
            anilist_token: env(ENV_ANILIST_TOKEN).or_else(|| config.anilist_token().cloned()),
            tmdb_api_key: env(ENV_TMDB_API_KEY).or_else(|| config.tmdb_api_key().cloned()),
        }
    }

    /// Apply explicit values (e.g., from CLI args) on top of the loaded ones.
    pub fn with_overrides(
        mut self,
        anidb_client: Option<String>,
        anidb_version: Option<String>,
        anilist_token: Option<String>,
        tmdb_api_key: Option<String>,
    ) -> Self {
        if anidb_client.is_some() {
            self.anidb_client = anidb_client;
        }
        if anidb_version.is_some() {
            self.anidb_version = anidb_version;
        }
        if anilist_token.is_some() {
            self.anilist_token = anilist_token;
        }
        if tmdb_api_key.is_some() {
            self.tmdb_api_key = tmdb_api_key;
        }
        self
    }

    /// The registered AniDB client name and version, if both are set.
    pub fn anidb_client(&self) -> Option<(&str, &str)> {
        Some((self.anidb_client.as_deref()?, self.anidb_version.as_deref()?))
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Return the path to the credentials config file.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("anidb-nfo").join("credentials.toml"))
}

/// Save credentials to the config file, creating parent directories as needed.
///
/// The file is readable by the owner only. Returns the path written to.
pub fn save_to_file(creds: &Credentials) -> Result<PathBuf, ScrapeError> {
    let path = config_path()
        .ok_or_else(|| ScrapeError::Config("Could not determine config directory".to_string()))?;
    save_to_path(creds, &path)?;
    Ok(path)
}

pub fn save_to_path(creds: &Credentials, path: &Path) -> Result<(), ScrapeError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let config = ConfigFile {
        anidb: (creds.anidb_client.is_some() || creds.anidb_version.is_some()).then(|| {
            AniDbConfig {
                client: creds.anidb_client.clone(),
                version: creds.anidb_version.clone(),
            }
        }),
        anilist: creds.anilist_token.as_ref().map(|t| AniListConfig {
            token: Some(t.clone()),
        }),
        tmdb: creds.tmdb_api_key.as_ref().map(|k| TmdbConfig {
            api_key: Some(k.clone()),
        }),
    };

    let toml_str = toml::to_string_pretty(&config)
        .map_err(|e| ScrapeError::Config(format!("Failed to serialize config: {}", e)))?;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    std::io::Write::write_all(&mut file, toml_str.as_bytes())?;
    Ok(())
}

/// Determine where each credential field is coming from.
pub fn credential_sources() -> CredentialSources {
    let config = load_config_file().unwrap_or_default();
    sources_for(&config, |name| env_var(name).is_some())
}

fn sources_for(config: &ConfigFile, has_env: impl Fn(&str) -> bool) -> CredentialSources {
    let source = |var: &'static str, in_file: bool| {
        if has_env(var) {
            CredentialSource::EnvVar(var)
        } else if in_file {
            CredentialSource::ConfigFile
        } else {
            CredentialSource::Missing
        }
    };

    CredentialSources {
        anidb_client: source(ENV_ANIDB_CLIENT, config.anidb_client().is_some()),
        anidb_version: source(ENV_ANIDB_CLIENT_VERSION, config.anidb_version().is_some()),
        anilist_token: source(ENV_ANILIST_TOKEN, config.anilist_token().is_some()),
        tmdb_api_key: source(ENV_TMDB_API_KEY, config.tmdb_api_key().is_some()),
    }
}

fn load_config_file() -> Option<ConfigFile> {
    read_config_file(&config_path()?)
}

fn read_config_file(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            log::warn!("Ignoring unreadable credentials file {}: {e}", path.display());
            None
        }
    }
}
