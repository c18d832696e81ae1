//! OMDb (Open Movie Database) metadata provider.
//!
//! The secondary provider. OMDb answers with a single best match instead of
//! a result list, reports most failures in the body with HTTP 200, and uses
//! `"N/A"` for missing values. Its contribution is mostly what TMDB lacks:
//! content rating, director, cast and awards.

use std::time::Duration;

use async_trait::async_trait;
use reelname_common::{Error, MediaKind, ProviderError, ProviderKind, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ProviderOptions;
use crate::metadata::provider::{LookupRequest, MetadataProvider};
use crate::metadata::record::MediaMetadata;

const OMDB_BASE_URL: &str = "https://www.omdbapi.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const SOURCE_LABEL: &str = "Open Movie Database";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct OmdbResponse {
    response: String,
    error: Option<String>,
    title: Option<String>,
    year: Option<String>,
    rated: Option<String>,
    runtime: Option<String>,
    genre: Option<String>,
    director: Option<String>,
    actors: Option<String>,
    plot: Option<String>,
    language: Option<String>,
    country: Option<String>,
    awards: Option<String>,
    season: Option<String>,
    episode: Option<String>,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
    #[serde(rename = "imdbID")]
    imdb_id: Option<String>,
    #[serde(rename = "seriesID")]
    series_id: Option<String>,
    #[serde(rename = "totalSeasons")]
    total_seasons: Option<String>,
    episodes: Option<Vec<serde_json::Value>>,
}

/// OMDb metadata provider.
pub struct OmdbProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl Default for OmdbProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OmdbProvider {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: String::new(),
            base_url: OMDB_BASE_URL.to_string(),
        }
    }

    pub fn with_key(api_key: impl Into<String>) -> Self {
        let mut provider = Self::new();
        provider.api_key = api_key.into();
        provider
    }

    fn params(request: &LookupRequest) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        match request.media_kind {
            MediaKind::Movie | MediaKind::Show => {
                params.push(("t", request.name.clone()));
                let kind = if request.media_kind == MediaKind::Movie {
                    "movie"
                } else {
                    "series"
                };
                params.push(("type", kind.to_string()));
                if let Some(y) = request.year {
                    params.push(("y", y.to_string()));
                }
            }
            MediaKind::Season | MediaKind::Episode => {
                match request.show_id("imdb") {
                    Some(imdb) => params.push(("i", imdb.to_string())),
                    None => params.push(("t", request.name.clone())),
                }
                if let Some(s) = request.season {
                    params.push(("Season", s.to_string()));
                }
                if let Some(e) = request.episode.filter(|_| request.media_kind == MediaKind::Episode) {
                    params.push(("Episode", e.to_string()));
                }
            }
            MediaKind::Unknown => {}
        }
        params
    }

    async fn query(
        &self,
        params: &[(&'static str, String)],
    ) -> std::result::Result<OmdbResponse, ProviderError> {
        debug!(url = %self.base_url, ?params, "OMDb request");

        let resp = self
            .client
            .get(format!("{}/", self.base_url))
            .query(&[("apikey", self.api_key.as_str())])
            .query(params)
            .send()
            .await
            .map_err(|e| ProviderError::Network(format!("OMDb request failed: {e}")))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited { retry_after: None });
        }

        let text = resp
            .text()
            .await
            .map_err(|e| ProviderError::Network(format!("OMDb body read failed: {e}")))?;

        let body: OmdbResponse = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                return Err(ProviderError::Auth(format!("OMDb returned {status}")));
            }
            Err(_) if !status.is_success() => {
                return Err(ProviderError::Request(format!("OMDb returned {status}")));
            }
            Err(e) => {
                return Err(ProviderError::Parse(format!("failed to parse OMDb response: {e}")));
            }
        };

        if !body.response.eq_ignore_ascii_case("true") {
            return Err(classify_error(body.error.as_deref().unwrap_or("unknown error")));
        }
        Ok(body)
    }
}

/// Map OMDb's in-body error strings onto the provider taxonomy.
fn classify_error(message: &str) -> ProviderError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("not found") || lower.contains("incorrect imdb id") {
        ProviderError::not_found(message)
    } else if lower.contains("api key") {
        ProviderError::Auth(message.to_string())
    } else if lower.contains("request limit") {
        ProviderError::RateLimited { retry_after: None }
    } else {
        ProviderError::Request(message.to_string())
    }
}

/// Drop OMDb's `"N/A"` placeholders and empty strings.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty() && v.trim() != "N/A")
}

fn split_list(value: Option<String>) -> Vec<String> {
    present(value)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// First year of `"2010"` or a range like `"2005–2013"`.
fn parse_year(value: &Option<String>) -> Option<u16> {
    value
        .as_deref()
        .and_then(|v| v.get(..4))
        .and_then(|y| y.parse().ok())
}

fn parse_number<T: std::str::FromStr>(value: Option<String>) -> Option<T> {
    present(value).and_then(|v| v.parse().ok())
}

fn into_metadata(body: OmdbResponse, request: &LookupRequest) -> MediaMetadata {
    let mut meta = MediaMetadata {
        year: parse_year(&body.year),
        overview: present(body.plot),
        rating: parse_number(body.imdb_rating),
        genres: split_list(body.genre),
        language: split_list(body.language).into_iter().next(),
        country: split_list(body.country).into_iter().next(),
        ..Default::default()
    };

    let title = present(body.title);
    match request.media_kind {
        MediaKind::Season => {
            meta.season = parse_number(body.season).or(request.season);
            let episodes = body.episodes.map(|e| e.len()).unwrap_or_default();
            meta.extensions.insert("episodes".into(), episodes.to_string());
        }
        MediaKind::Episode => {
            meta.season = parse_number(body.season).or(request.season);
            meta.episode = parse_number(body.episode).or(request.episode);
            if let Some(t) = title {
                meta.extensions.insert("episode_title".into(), t);
            }
            if let Some(series) = present(body.series_id) {
                meta.external_ids.insert("show.imdb".into(), series);
            }
        }
        _ => {
            meta.confidence = match &title {
                Some(t) if t.eq_ignore_ascii_case(request.name.trim()) => 0.5,
                _ => 0.3,
            };
            meta.title = title;
            if let Some(n) = present(body.total_seasons) {
                meta.extensions.insert("seasons".into(), n);
            }
        }
    }

    if let Some(imdb) = present(body.imdb_id) {
        meta.external_ids.insert("imdb".into(), imdb);
    }
    for (key, value) in [
        ("rated", body.rated),
        ("runtime", body.runtime),
        ("director", body.director),
        ("actors", body.actors),
        ("awards", body.awards),
    ] {
        if let Some(v) = present(value) {
            meta.extensions.insert(key.into(), v);
        }
    }
    meta.with_source("omdb", SOURCE_LABEL)
}

#[async_trait]
impl MetadataProvider for OmdbProvider {
    fn name(&self) -> &'static str {
        "omdb"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Secondary
    }

    fn configure(&mut self, options: &ProviderOptions) -> Result<()> {
        self.api_key = if options.enabled {
            options.api_key.as_deref().unwrap_or_default().trim().to_string()
        } else {
            String::new()
        };
        if let Some(base_url) = &options.base_url {
            self.base_url = base_url.trim_end_matches('/').to_string();
        }
        self.client = reqwest::Client::builder()
            .timeout(options.timeout.unwrap_or(REQUEST_TIMEOUT))
            .build()
            .map_err(|e| Error::config(format!("failed to build OMDb client: {e}")))?;
        Ok(())
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn fetch(
        &self,
        request: &LookupRequest,
        _cancel: &CancellationToken,
    ) -> std::result::Result<Option<MediaMetadata>, ProviderError> {
        match request.media_kind {
            MediaKind::Unknown => return Ok(None),
            MediaKind::Season if request.season.is_none() => return Ok(None),
            MediaKind::Episode if request.season.is_none() || request.episode.is_none() => {
                return Ok(None)
            }
            _ => {}
        }

        let body = self.query(&Self::params(request)).await?;
        Ok(Some(into_metadata(body, request)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::collections::HashMap;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OmdbProvider {
        let mut provider = OmdbProvider::new();
        provider
            .configure(&ProviderOptions {
                enabled: true,
                api_key: Some("omdb-key".into()),
                base_url: Some(server.uri()),
                timeout: Some(Duration::from_secs(5)),
                ..Default::default()
            })
            .unwrap();
        provider
    }

    fn request(kind: MediaKind, name: &str) -> LookupRequest {
        LookupRequest {
            media_kind: kind,
            name: name.into(),
            year: None,
            season: None,
            episode: None,
            extra: HashMap::new(),
        }
    }

    #[test]
    fn error_strings() {
        assert_matches!(classify_error("Movie not found!"), ProviderError::NotFound(_));
        assert_matches!(classify_error("Series or episode not found!"), ProviderError::NotFound(_));
        assert_matches!(classify_error("Invalid API key!"), ProviderError::Auth(_));
        assert_matches!(classify_error("No API key provided."), ProviderError::Auth(_));
        assert_matches!(
            classify_error("Request limit reached!"),
            ProviderError::RateLimited { retry_after: None }
        );
        assert_matches!(classify_error("Something odd"), ProviderError::Request(_));
    }

    #[test]
    fn value_helpers() {
        assert_eq!(present(Some("N/A".into())), None);
        assert_eq!(
            split_list(Some("Action, Adventure,Sci-Fi".into())),
            vec!["Action", "Adventure", "Sci-Fi"]
        );
        assert_eq!(parse_year(&Some("2005–2013".into())), Some(2005));
        assert_eq!(parse_number::<f64>(Some("8.8".into())), Some(8.8));
        assert_eq!(parse_number::<f64>(Some("N/A".into())), None);
    }

    #[test]
    fn season_params_prefer_parent_imdb_id() {
        let mut req = request(MediaKind::Episode, "The Office");
        req.season = Some(2);
        req.episode = Some(1);
        req.extra.insert("show.imdb".into(), "tt0386676".into());

        let params = OmdbProvider::params(&req);
        assert_eq!(
            params,
            vec![
                ("i", "tt0386676".to_string()),
                ("Season", "2".to_string()),
                ("Episode", "1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn movie_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("apikey", "omdb-key"))
            .and(query_param("t", "Inception"))
            .and(query_param("type", "movie"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Title": "Inception",
                "Year": "2010",
                "Rated": "PG-13",
                "Runtime": "148 min",
                "Genre": "Action, Adventure, Sci-Fi",
                "Director": "Christopher Nolan",
                "Actors": "Leonardo DiCaprio, Joseph Gordon-Levitt",
                "Plot": "A thief who steals corporate secrets...",
                "Language": "English, Japanese, French",
                "Country": "United States, United Kingdom",
                "Awards": "Won 4 Oscars",
                "imdbRating": "8.8",
                "imdbID": "tt1375666",
                "Type": "movie",
                "Response": "True"
            })))
            .mount(&server)
            .await;

        let meta = provider(&server)
            .fetch(&request(MediaKind::Movie, "Inception"), &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(meta.title.as_deref(), Some("Inception"));
        assert_eq!(meta.year, Some(2010));
        assert_eq!(meta.rating, Some(8.8));
        assert_eq!(meta.genres, vec!["Action", "Adventure", "Sci-Fi"]);
        assert_eq!(meta.language.as_deref(), Some("English"));
        assert_eq!(meta.country.as_deref(), Some("United States"));
        assert_eq!(meta.extensions["rated"], "PG-13");
        assert_eq!(meta.extensions["director"], "Christopher Nolan");
        assert_eq!(meta.external_ids["imdb"], "tt1375666");
        assert_eq!(meta.sources["omdb"], SOURCE_LABEL);
    }

    #[tokio::test]
    async fn in_body_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("t", "Nothing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Response": "False",
                "Error": "Movie not found!"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("t", "Locked"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "Response": "False",
                "Error": "Invalid API key!"
            })))
            .mount(&server)
            .await;

        let omdb = provider(&server);
        let cancel = CancellationToken::new();

        let missing = omdb.fetch(&request(MediaKind::Movie, "Nothing"), &cancel).await;
        assert_matches!(missing, Err(ProviderError::NotFound(_)));

        let locked = omdb.fetch(&request(MediaKind::Movie, "Locked"), &cancel).await;
        assert_matches!(locked, Err(ProviderError::Auth(_)));
    }

    #[tokio::test]
    async fn unknown_kind_is_skipped() {
        let server = MockServer::start().await;
        let result = provider(&server)
            .fetch(&request(MediaKind::Unknown, "x"), &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
