use anidb_nfo_core::CrossRefField;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::Duration;

use crate::catalog::{Candidate, SearchQuery, SecondaryCatalog};
use crate::client::{RateLimiter, status_error};
use crate::error::ScrapeError;

const BASE_URL: &str = "https://api.themoviedb.org/3";
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(250);

/// TMDB genre id for "Animation".
pub const ANIMATION_GENRE: u32 = 16;

/// TV search client for The Movie Database.
pub struct TmdbClient {
    http: reqwest::Client,
    api_key: String,
    limiter: RateLimiter,
}

impl TmdbClient {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            limiter: RateLimiter::new(MIN_REQUEST_INTERVAL),
        }
    }
}

#[async_trait]
impl SecondaryCatalog for TmdbClient {
    fn field(&self) -> CrossRefField {
        CrossRefField::Tmdb
    }

    fn name(&self) -> &str {
        "TMDB"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, ScrapeError> {
        self.limiter.wait().await;

        let resp = self
            .http
            .get(format!("{}/search/tv", BASE_URL))
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("query", query.title.as_str()),
                ("include_adult", "false"),
            ])
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(status_error(self.name(), status, &text));
        }
        parse_search_response(&text)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<TvResult>,
}

#[derive(Debug, Deserialize)]
struct TvResult {
    id: u32,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    original_name: Option<String>,
    #[serde(default)]
    first_air_date: Option<String>,
    #[serde(default)]
    genre_ids: Vec<u32>,
}

impl From<TvResult> for Candidate {
    fn from(r: TvResult) -> Self {
        let mut titles: Vec<String> = r.original_name.into_iter().collect();
        if let Some(name) = r.name
            && !titles.contains(&name)
        {
            titles.push(name);
        }
        let year = r
            .first_air_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse().ok());
        Candidate {
            id: r.id,
            titles,
            year,
            in_category: r.genre_ids.contains(&ANIMATION_GENRE),
        }
    }
}

fn parse_search_response(text: &str) -> Result<Vec<Candidate>, ScrapeError> {
    let response: SearchResponse = serde_json::from_str(text)?;
    Ok(response.results.into_iter().map(Candidate::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_become_candidates() {
        let text = r#"{"page":1,"results":[
            {"id":30991,"name":"Cowboy Bebop","original_name":"カウボーイビバップ",
             "first_air_date":"1998-04-03","genre_ids":[16,10759]},
            {"id":94664,"name":"Cowboy Bebop","original_name":"Cowboy Bebop",
             "first_air_date":"2021-11-19","genre_ids":[10759]},
            {"id":5,"name":"Unaired","first_air_date":"","genre_ids":[16]}
        ]}"#;
        let candidates = parse_search_response(text).unwrap();
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].titles, ["カウボーイビバップ", "Cowboy Bebop"]);
        assert_eq!(candidates[0].year, Some(1998));
        assert!(candidates[0].in_category);
        assert_eq!(candidates[1].titles, ["Cowboy Bebop"]);
        assert!(!candidates[1].in_category);
        assert_eq!(candidates[2].year, None);
    }
}
