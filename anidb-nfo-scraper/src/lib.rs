pub mod anidb;
pub mod anilist;
pub mod catalog;
pub mod client;
pub mod credentials;
pub mod error;
pub mod resolver;
pub mod tmdb;

pub use anidb::{AniDbClient, MetadataSource, MetadataStore};
pub use anilist::AniListClient;
pub use catalog::{Candidate, SearchQuery, SecondaryCatalog};
pub use client::{RateLimiter, http_client};
pub use credentials::{
    CredentialSource, CredentialSources, Credentials, config_path, credential_sources,
    save_to_file,
};
pub use error::ScrapeError;
pub use resolver::{CrossReferenceResolver, SearchPlan};
pub use tmdb::TmdbClient;

/// Secondary catalogs enabled by the credentials present.
pub fn configured_catalogs(
    http: &reqwest::Client,
    creds: &Credentials,
) -> Vec<Box<dyn SecondaryCatalog>> {
    let mut catalogs: Vec<Box<dyn SecondaryCatalog>> = Vec::new();
    if let Some(token) = &creds.anilist_token {
        catalogs.push(Box::new(AniListClient::new(http.clone(), token)));
    }
    if let Some(key) = &creds.tmdb_api_key {
        catalogs.push(Box::new(TmdbClient::new(http.clone(), key)));
    }
    catalogs
}
