//! TMDB (The Movie Database) metadata provider.
//!
//! Implements [`MetadataProvider`] by querying the TMDB v3 REST API. This is
//! the primary provider: its titles and ids are the default naming
//! vocabulary.
//!
//! Features:
//! - Token-bucket rate limiting at 4 requests / second via [`governor`].
//! - HTTP 429 surfaces as [`ProviderError::RateLimited`] with the
//!   `Retry-After` hint; the engine owns the backoff.
//! - Confidence scoring based on title similarity and year proximity.
//! - Season and episode lookups reuse the show id resolved in phase 0.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reelname_common::{Error, MediaKind, ProviderError, ProviderKind, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ProviderOptions;
use crate::metadata::provider::{LookupRequest, MetadataProvider};
use crate::metadata::record::MediaMetadata;

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const SOURCE_LABEL: &str = "The Movie Database";

// ---------------------------------------------------------------------------
// TMDB API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieSearchResult {
    id: u64,
    title: Option<String>,
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbTvSearchResult {
    id: u64,
    name: Option<String>,
    first_air_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieDetail {
    id: u64,
    title: Option<String>,
    overview: Option<String>,
    release_date: Option<String>,
    vote_average: Option<f64>,
    runtime: Option<u32>,
    genres: Option<Vec<TmdbGenre>>,
    imdb_id: Option<String>,
    original_language: Option<String>,
    production_countries: Option<Vec<TmdbCountry>>,
}

#[derive(Debug, Deserialize)]
struct TmdbTvDetail {
    id: u64,
    name: Option<String>,
    overview: Option<String>,
    first_air_date: Option<String>,
    vote_average: Option<f64>,
    genres: Option<Vec<TmdbGenre>>,
    original_language: Option<String>,
    origin_country: Option<Vec<String>>,
    number_of_seasons: Option<u32>,
    external_ids: Option<TmdbExternalIds>,
}

#[derive(Debug, Deserialize)]
struct TmdbSeasonDetail {
    id: u64,
    name: Option<String>,
    overview: Option<String>,
    air_date: Option<String>,
    season_number: Option<u32>,
    #[serde(default)]
    episodes: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TmdbEpisodeDetail {
    id: u64,
    name: Option<String>,
    overview: Option<String>,
    air_date: Option<String>,
    season_number: Option<u32>,
    episode_number: Option<u32>,
    vote_average: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TmdbGenre {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TmdbCountry {
    iso_3166_1: String,
}

#[derive(Debug, Deserialize)]
struct TmdbExternalIds {
    imdb_id: Option<String>,
    tvdb_id: Option<u64>,
}

/// A scored search hit.
#[derive(Debug, Clone)]
struct Candidate {
    id: String,
    confidence: f64,
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// TMDB metadata provider.
///
/// # Examples
///
/// ```no_run
/// use reelname::metadata::providers::TmdbProvider;
///
/// let provider = TmdbProvider::with_key("your-api-key", "en-US");
/// ```
pub struct TmdbProvider {
    client: reqwest::Client,
    api_key: String,
    language: String,
    base_url: String,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl Default for TmdbProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TmdbProvider {
    /// Create an unconfigured provider. It stays unavailable until an API
    /// key is supplied through [`MetadataProvider::configure`].
    pub fn new() -> Self {
        let quota = Quota::per_second(NonZeroU32::MIN.saturating_add(3));
        Self {
            client: reqwest::Client::new(),
            api_key: String::new(),
            language: "en-US".to_string(),
            base_url: TMDB_BASE_URL.to_string(),
            rate_limiter: RateLimiter::direct(quota),
        }
    }

    pub fn with_key(api_key: impl Into<String>, language: impl Into<String>) -> Self {
        let mut provider = Self::new();
        provider.api_key = api_key.into();
        provider.language = language.into();
        provider
    }

    /// Execute a rate-limited GET and decode the JSON body.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> std::result::Result<T, ProviderError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "TMDB request");

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("language", self.language.as_str()),
            ])
            .query(params)
            .send()
            .await
            .map_err(|e| ProviderError::Network(format!("TMDB request failed: {e}")))?;

        match resp.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs);
                return Err(ProviderError::RateLimited { retry_after });
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ProviderError::Auth(format!("TMDB returned {}", resp.status())));
            }
            StatusCode::NOT_FOUND => {
                return Err(ProviderError::not_found(format!("TMDB has no {path}")));
            }
            status if !status.is_success() => {
                return Err(ProviderError::Request(format!(
                    "TMDB returned {status} for {path}"
                )));
            }
            _ => {}
        }

        resp.json()
            .await
            .map_err(|e| ProviderError::Parse(format!("failed to parse TMDB response: {e}")))
    }

    /// Compute confidence score for a search result based on title similarity
    /// and year proximity.
    fn confidence(
        query_title: &str,
        result_title: &str,
        query_year: Option<u16>,
        result_year: Option<u16>,
    ) -> f64 {
        let base = if query_title == result_title {
            0.5
        } else if query_title.eq_ignore_ascii_case(result_title) {
            0.4
        } else if result_title
            .to_ascii_lowercase()
            .contains(&query_title.to_ascii_lowercase())
        {
            0.2
        } else {
            0.1
        };

        let year_bonus = match (query_year, result_year) {
            (Some(q), Some(r)) if q == r => 0.3,
            (Some(q), Some(r)) if q.abs_diff(r) <= 1 => 0.15,
            _ => 0.0,
        };

        base + year_bonus
    }

    /// Best-scored hit, or `NotFound`.
    fn best(
        mut candidates: Vec<Candidate>,
        query: &str,
    ) -> std::result::Result<Candidate, ProviderError> {
        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::not_found(format!("no TMDB match for {query:?}")))
    }

    async fn search_movie(
        &self,
        title: &str,
        year: Option<u16>,
    ) -> std::result::Result<Candidate, ProviderError> {
        let mut params = vec![("query", title.to_string())];
        if let Some(y) = year {
            params.push(("year", y.to_string()));
        }

        let body: TmdbSearchResponse<TmdbMovieSearchResult> =
            self.get("/search/movie", &params).await?;

        let candidates = body
            .results
            .into_iter()
            .map(|r| {
                let result_title = r.title.unwrap_or_default();
                Candidate {
                    id: r.id.to_string(),
                    confidence: Self::confidence(
                        title,
                        &result_title,
                        year,
                        parse_year(&r.release_date),
                    ),
                }
            })
            .collect();
        Self::best(candidates, title)
    }

    async fn search_tv(
        &self,
        title: &str,
        year: Option<u16>,
    ) -> std::result::Result<Candidate, ProviderError> {
        let mut params = vec![("query", title.to_string())];
        if let Some(y) = year {
            params.push(("first_air_date_year", y.to_string()));
        }

        let body: TmdbSearchResponse<TmdbTvSearchResult> = self.get("/search/tv", &params).await?;

        let candidates = body
            .results
            .into_iter()
            .map(|r| {
                let result_title = r.name.unwrap_or_default();
                Candidate {
                    id: r.id.to_string(),
                    confidence: Self::confidence(
                        title,
                        &result_title,
                        year,
                        parse_year(&r.first_air_date),
                    ),
                }
            })
            .collect();
        Self::best(candidates, title)
    }

    async fn movie(&self, id: &str) -> std::result::Result<MediaMetadata, ProviderError> {
        let detail: TmdbMovieDetail = self.get(&format!("/movie/{id}"), &[]).await?;

        let mut meta = MediaMetadata {
            title: detail.title,
            year: parse_year(&detail.release_date),
            overview: detail.overview,
            rating: detail.vote_average,
            genres: genre_names(detail.genres),
            language: detail.original_language,
            country: detail
                .production_countries
                .and_then(|c| c.into_iter().next())
                .map(|c| c.iso_3166_1),
            ..Default::default()
        };
        meta.external_ids.insert("tmdb".into(), detail.id.to_string());
        if let Some(imdb) = detail.imdb_id.filter(|i| !i.is_empty()) {
            meta.external_ids.insert("imdb".into(), imdb);
        }
        if let Some(runtime) = detail.runtime {
            meta.extensions.insert("runtime".into(), format!("{runtime} min"));
        }
        Ok(meta.with_source("tmdb", SOURCE_LABEL))
    }

    async fn show(&self, id: &str) -> std::result::Result<MediaMetadata, ProviderError> {
        let detail: TmdbTvDetail = self
            .get(
                &format!("/tv/{id}"),
                &[("append_to_response", "external_ids".to_string())],
            )
            .await?;

        let mut meta = MediaMetadata {
            title: detail.name,
            year: parse_year(&detail.first_air_date),
            overview: detail.overview,
            rating: detail.vote_average,
            genres: genre_names(detail.genres),
            language: detail.original_language,
            country: detail.origin_country.and_then(|c| c.into_iter().next()),
            ..Default::default()
        };
        meta.external_ids.insert("tmdb".into(), detail.id.to_string());
        if let Some(ext) = detail.external_ids {
            if let Some(imdb) = ext.imdb_id.filter(|i| !i.is_empty()) {
                meta.external_ids.insert("imdb".into(), imdb);
            }
            if let Some(tvdb) = ext.tvdb_id {
                meta.external_ids.insert("tvdb".into(), tvdb.to_string());
            }
        }
        if let Some(n) = detail.number_of_seasons {
            meta.extensions.insert("seasons".into(), n.to_string());
        }
        Ok(meta.with_source("tmdb", SOURCE_LABEL))
    }

    async fn season(
        &self,
        show_id: &str,
        season: u32,
    ) -> std::result::Result<MediaMetadata, ProviderError> {
        let detail: TmdbSeasonDetail = self
            .get(&format!("/tv/{show_id}/season/{season}"), &[])
            .await?;

        let mut meta = MediaMetadata {
            year: parse_year(&detail.air_date),
            season: detail.season_number.or(Some(season)),
            overview: detail.overview,
            ..Default::default()
        };
        meta.external_ids.insert("tmdb".into(), detail.id.to_string());
        if let Some(name) = detail.name {
            meta.extensions.insert("season_name".into(), name);
        }
        meta.extensions
            .insert("episodes".into(), detail.episodes.len().to_string());
        Ok(meta.with_source("tmdb", SOURCE_LABEL))
    }

    async fn episode(
        &self,
        show_id: &str,
        season: u32,
        episode: u32,
    ) -> std::result::Result<MediaMetadata, ProviderError> {
        let detail: TmdbEpisodeDetail = self
            .get(
                &format!("/tv/{show_id}/season/{season}/episode/{episode}"),
                &[],
            )
            .await?;

        let mut meta = MediaMetadata {
            year: parse_year(&detail.air_date),
            season: detail.season_number.or(Some(season)),
            episode: detail.episode_number.or(Some(episode)),
            overview: detail.overview,
            rating: detail.vote_average,
            ..Default::default()
        };
        meta.external_ids.insert("tmdb".into(), detail.id.to_string());
        if let Some(name) = detail.name {
            meta.extensions.insert("episode_title".into(), name);
        }
        if let Some(date) = detail.air_date {
            meta.extensions.insert("air_date".into(), date);
        }
        Ok(meta.with_source("tmdb", SOURCE_LABEL))
    }

    /// The parent show's TMDB id, from phase 0 if it resolved one,
    /// otherwise by searching for the show name.
    async fn show_id(
        &self,
        request: &LookupRequest,
    ) -> std::result::Result<Candidate, ProviderError> {
        if let Some(id) = request.show_id("tmdb") {
            return Ok(Candidate {
                id: id.to_string(),
                confidence: 1.0,
            });
        }
        self.search_tv(&request.name, request.year).await
    }
}

fn genre_names(genres: Option<Vec<TmdbGenre>>) -> Vec<String> {
    genres
        .unwrap_or_default()
        .into_iter()
        .map(|g| g.name)
        .collect()
}

/// Extract a four-digit year from a date string like `"2023-04-15"`.
fn parse_year(date: &Option<String>) -> Option<u16> {
    date.as_deref()
        .and_then(|d| d.get(..4))
        .and_then(|y| y.parse::<u16>().ok())
}

#[async_trait]
impl MetadataProvider for TmdbProvider {
    fn name(&self) -> &'static str {
        "tmdb"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Primary
    }

    fn configure(&mut self, options: &ProviderOptions) -> Result<()> {
        self.api_key = if options.enabled {
            options.api_key.as_deref().unwrap_or_default().trim().to_string()
        } else {
            String::new()
        };
        if let Some(language) = &options.language {
            self.language.clone_from(language);
        }
        if let Some(base_url) = &options.base_url {
            self.base_url = base_url.trim_end_matches('/').to_string();
        }
        self.client = reqwest::Client::builder()
            .timeout(options.timeout.unwrap_or(REQUEST_TIMEOUT))
            .build()
            .map_err(|e| Error::config(format!("failed to build TMDB client: {e}")))?;
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
        let meta = match request.media_kind {
            MediaKind::Movie => {
                let hit = self.search_movie(&request.name, request.year).await?;
                let mut meta = self.movie(&hit.id).await?;
                meta.confidence = hit.confidence;
                meta
            }
            MediaKind::Show => {
                let hit = self.search_tv(&request.name, request.year).await?;
                let mut meta = self.show(&hit.id).await?;
                meta.confidence = hit.confidence;
                meta
            }
            MediaKind::Season => {
                let Some(season) = request.season else {
                    return Ok(None);
                };
                let show = self.show_id(request).await?;
                let mut meta = self.season(&show.id, season).await?;
                meta.external_ids.insert("show.tmdb".into(), show.id);
                meta.confidence = show.confidence;
                meta
            }
            MediaKind::Episode => {
                let (Some(season), Some(episode)) = (request.season, request.episode) else {
                    return Ok(None);
                };
                let show = self.show_id(request).await?;
                let mut meta = self.episode(&show.id, season, episode).await?;
                meta.external_ids.insert("show.tmdb".into(), show.id);
                meta.confidence = show.confidence;
                meta
            }
            MediaKind::Unknown => return Ok(None),
        };
        Ok(Some(meta))
    }
}
