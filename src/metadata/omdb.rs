use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

use super::{ExternalMetadata, MetadataSource};
use crate::models::MediaKind;
use crate::CatalogError;

pub const OMDB_BASE_URL: &str = "https://www.omdbapi.com";

/// Raw OMDb answer. Every value is a string and missing data is `"N/A"`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OmdbResponse {
    response: String,
    error: Option<String>,
    title: Option<String>,
    year: Option<String>,
    #[serde(rename = "Type")]
    kind: Option<String>,
    genre: Option<String>,
    plot: Option<String>,
    director: Option<String>,
    runtime: Option<String>,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
    #[serde(rename = "imdbID")]
    imdb_id: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty() && v != "N/A")
}

/// "2021", "2019–2022" and "2019–" all start with the release year.
fn parse_year(year: &str) -> Option<i32> {
    let digits: String = year.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

impl OmdbResponse {
    fn into_metadata(self) -> Option<ExternalMetadata> {
        if !self.response.eq_ignore_ascii_case("true") {
            return None;
        }
        let title = present(self.title)?;
        let kind = match present(self.kind).as_deref() {
            Some("series") | Some("episode") => MediaKind::Series,
            _ => MediaKind::Movie,
        };
        Some(ExternalMetadata {
            title,
            year: present(self.year).as_deref().and_then(parse_year),
            kind,
            rating: present(self.imdb_rating).and_then(|r| r.parse().ok()),
            genres: present(self.genre)
                .map(|g| {
                    g.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            plot: present(self.plot),
            imdb_id: present(self.imdb_id),
            director: present(self.director),
            runtime: present(self.runtime),
        })
    }
}

/// HTTP client for the OMDb API.
pub struct OmdbClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OmdbClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, CatalogError> {
        Self::with_base_url(api_key, OMDB_BASE_URL)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CatalogError::Metadata(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn fetch(&self, query: &[(&str, String)]) -> Result<Option<ExternalMetadata>, CatalogError> {
        let response = self
            .http
            .get(format!("{}/", self.base_url))
            .query(&[("apikey", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .map_err(|e| CatalogError::Metadata(format!("request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(CatalogError::Metadata("OMDb rejected the API key".into()));
        }
        if !status.is_success() {
            return Err(CatalogError::Metadata(format!(
                "OMDb answered with status {}",
                status
            )));
        }

        let body: OmdbResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::Metadata(format!("unreadable OMDb response: {}", e)))?;
        if let Some(error) = body.error.as_deref() {
            tracing::debug!("OMDb lookup returned no result: {}", error);
        }
        Ok(body.into_metadata())
    }
}

#[async_trait]
impl MetadataSource for OmdbClient {
    #[instrument(name = "metadata.lookup", skip(self))]
    async fn lookup(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Option<ExternalMetadata>, CatalogError> {
        let mut query = vec![("t", title.trim().to_string())];
        if let Some(year) = year {
            query.push(("y", year.to_string()));
        }
        self.fetch(&query).await
    }

    #[instrument(name = "metadata.lookup_by_id", skip(self))]
    async fn lookup_by_id(&self, imdb_id: &str) -> Result<Option<ExternalMetadata>, CatalogError> {
        self.fetch(&[("i", imdb_id.trim().to_string())]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_series_response() {
        let raw = r#"{
            "Title": "Severance", "Year": "2022–", "Type": "series",
            "Genre": "Drama, Mystery, Sci-Fi", "Plot": "Mark leads a team.",
            "Director": "N/A", "Runtime": "55 min", "imdbRating": "8.7",
            "imdbID": "tt11280740", "Response": "True"
        }"#;
        let parsed: OmdbResponse = serde_json::from_str(raw).unwrap();
        let meta = parsed.into_metadata().unwrap();

        assert_eq!(meta.title, "Severance");
        assert_eq!(meta.year, Some(2022));
        assert_eq!(meta.kind, MediaKind::Series);
        assert_eq!(meta.rating, Some(8.7));
        assert_eq!(meta.genres, vec!["Drama", "Mystery", "Sci-Fi"]);
        assert_eq!(meta.director, None);
        assert_eq!(meta.imdb_id.as_deref(), Some("tt11280740"));
    }

    #[test]
    fn test_not_found_response_is_none() {
        let raw = r#"{"Response": "False", "Error": "Movie not found!"}"#;
        let parsed: OmdbResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.into_metadata().is_none());
    }

    #[test]
    fn test_missing_rating_is_none() {
        let raw = r#"{"Title": "Obscure", "Year": "1931", "Type": "movie",
                      "imdbRating": "N/A", "Response": "True"}"#;
        let parsed: OmdbResponse = serde_json::from_str(raw).unwrap();
        let meta = parsed.into_metadata().unwrap();
        assert_eq!(meta.rating, None);
        assert_eq!(meta.year, Some(1931));
        assert!(meta.genres.is_empty());
    }
}
