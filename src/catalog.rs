//! Track search and artist lookups against the catalog API.

use serde::Deserialize;

use crate::auth::Credential;
use crate::config::ApiEndpoints;
use crate::error::Result;
use crate::http::{Pause, RateLimitedFetcher, Transport};

// ============================================================================
// Response Models
// ============================================================================

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    tracks: Option<TrackPage>,
}

#[derive(Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<TrackItem>,
}

/// Search hit for a track.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TrackItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>, // Credited order
    #[serde(default)]
    pub album: Option<AlbumItem>,
    #[serde(default)]
    pub explicit: Option<bool>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub popularity: Option<i64>,
}

impl TrackItem {
    pub fn primary_artist(&self) -> Option<&ArtistRef> {
        self.artists.first()
    }

    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ArtistRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AlbumItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
}

/// Aggregate artist stats.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ArtistItem {
    #[serde(default)]
    pub followers: Option<Followers>,
    #[serde(default)]
    pub popularity: Option<i64>,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Followers {
    #[serde(default)]
    pub total: Option<u64>,
}

// ============================================================================
// Catalog
// ============================================================================

/// Lookups the enricher needs. Errors are fatal for the run.
pub trait Catalog {
    /// Top search result, or None when nothing matched
    fn search_track(&self, query: &str) -> Result<Option<TrackItem>>;

    fn artist(&self, artist_id: &str) -> Result<ArtistItem>;
}

pub struct SpotifyCatalog<'a, T, P> {
    fetcher: RateLimitedFetcher<T, P>,
    endpoints: &'a ApiEndpoints,
    credential: Credential,
}

impl<'a, T: Transport, P: Pause> SpotifyCatalog<'a, T, P> {
    pub fn new(fetcher: RateLimitedFetcher<T, P>, endpoints: &'a ApiEndpoints, credential: Credential) -> Self {
        Self {
            fetcher,
            endpoints,
            credential,
        }
    }

    fn auth_headers(&self) -> [(&'static str, String); 1] {
        [("Authorization", self.credential.authorization())]
    }
}

impl<'a, T: Transport, P: Pause> Catalog for SpotifyCatalog<'a, T, P> {
    fn search_track(&self, query: &str) -> Result<Option<TrackItem>> {
        let params = [
            ("q", query.to_string()),
            ("type", "track".to_string()),
            ("limit", "1".to_string()),
        ];
        let response = self
            .fetcher
            .get(&self.endpoints.search_url, &self.auth_headers(), &params)?;
        let body: SearchResponse = response.json()?;
        Ok(body.tracks.and_then(|page| page.items.into_iter().next()))
    }

    fn artist(&self, artist_id: &str) -> Result<ArtistItem> {
        let url = format!("{}/{}", self.endpoints.artists_url.trim_end_matches('/'), artist_id);
        let response = self.fetcher.get(&url, &self.auth_headers(), &[])?;
        response.json()
    }
}
