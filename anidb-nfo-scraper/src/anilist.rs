use anidb_nfo_core::CrossRefField;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::time::Duration;

use crate::catalog::{Candidate, SearchQuery, SecondaryCatalog};
use crate::client::{RateLimiter, status_error};
use crate::error::ScrapeError;

const API_URL: &str = "https://graphql.anilist.co";
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(700);

const SEARCH_QUERY: &str = r#"
query ($search: String) {
  Page(perPage: 10) {
    media(search: $search) {
      id
      type
      seasonYear
      startDate { year }
      title { native romaji english }
    }
  }
}
"#;

/// GraphQL search client for AniList.
pub struct AniListClient {
    http: reqwest::Client,
    token: String,
    limiter: RateLimiter,
}

impl AniListClient {
    pub fn new(http: reqwest::Client, token: impl Into<String>) -> Self {
        Self {
            http,
            token: token.into(),
            limiter: RateLimiter::new(MIN_REQUEST_INTERVAL),
        }
    }
}

#[async_trait]
impl SecondaryCatalog for AniListClient {
    fn field(&self) -> CrossRefField {
        CrossRefField::AniList
    }

    fn name(&self) -> &str {
        "AniList"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, ScrapeError> {
        self.limiter.wait().await;

        let body = json!({
            "query": SEARCH_QUERY,
            "variables": { "search": query.title },
        });
        let resp = self
            .http
            .post(API_URL)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            if text.contains("Invalid token") {
                return Err(ScrapeError::access_denied("AniList rejected the token"));
            }
            return Err(status_error(self.name(), status, &text));
        }
        parse_search_response(&text)
    }
}

#[derive(Debug, Deserialize)]
struct Response {
    data: Option<Data>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Data {
    #[serde(rename = "Page")]
    page: Page,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    media: Vec<Media>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Media {
    id: u32,
    #[serde(rename = "type")]
    kind: Option<String>,
    season_year: Option<i32>,
    start_date: Option<FuzzyDate>,
    title: MediaTitle,
}

#[derive(Debug, Deserialize)]
struct FuzzyDate {
    year: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct MediaTitle {
    native: Option<String>,
    romaji: Option<String>,
    english: Option<String>,
}

impl From<Media> for Candidate {
    fn from(m: Media) -> Self {
        let titles = [m.title.native, m.title.romaji, m.title.english]
            .into_iter()
            .flatten()
            .collect();
        Candidate {
            id: m.id,
            titles,
            year: m.season_year.or(m.start_date.and_then(|d| d.year)),
            in_category: m.kind.as_deref() == Some("ANIME"),
        }
    }
}

fn parse_search_response(text: &str) -> Result<Vec<Candidate>, ScrapeError> {
    let response: Response = serde_json::from_str(text)?;
    if let Some(data) = response.data {
        return Ok(data.page.media.into_iter().map(Candidate::from).collect());
    }
    let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
    Err(ScrapeError::api(format!("AniList: {}", messages.join("; "))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_become_candidates() {
        let text = r#"{"data":{"Page":{"media":[
            {"id":1,"type":"ANIME","seasonYear":1998,"startDate":{"year":1998},
             "title":{"native":"カウボーイビバップ","romaji":"Cowboy Bebop","english":"Cowboy Bebop"}},
            {"id":30,"type":"MANGA","seasonYear":null,"startDate":{"year":1997},
             "title":{"native":"カウボーイビバップ","romaji":"Cowboy Bebop","english":null}}
        ]}}}"#;
        let candidates = parse_search_response(text).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].titles[0], "カウボーイビバップ");
        assert_eq!(candidates[0].titles.len(), 3);
        assert!(candidates[0].in_category);
        assert!(!candidates[1].in_category);
        assert_eq!(candidates[1].year, Some(1997));
    }

    #[test]
    fn graphql_errors_surface_as_api_error() {
        let text = r#"{"data":null,"errors":[{"message":"Too many requests"}]}"#;
        assert!(matches!(
            parse_search_response(text),
            Err(ScrapeError::Api(msg)) if msg.contains("Too many")
        ));
    }
}
