//! Run configuration.
//!
//! Built once by a binary and handed to each component; nothing below this
//! module reads the environment on its own.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub const CLIENT_ID_VAR: &str = "SPOTIFY_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "SPOTIFY_CLIENT_SECRET";
pub const DATA_DIR_VAR: &str = "CHART_DATA_DIR";

pub const USER_AGENT: &str = concat!("chart-enrich/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Sections
// ============================================================================

/// Metadata API endpoints.
#[derive(Clone, Debug)]
pub struct ApiEndpoints {
    pub token_url: String,
    pub search_url: String,
    pub artists_url: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            search_url: "https://api.spotify.com/v1/search".to_string(),
            artists_url: "https://api.spotify.com/v1/artists".to_string(),
        }
    }
}

/// Bounded retry for a single logical GET.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    /// Added on top of the server's Retry-After hint
    pub rate_limit_padding: Duration,
    /// Used when a 429 carries no usable Retry-After
    pub default_retry_after: Duration,
    /// Linear backoff unit: attempt i waits step * (i + 1)
    pub backoff_step: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_padding: Duration::from_millis(500),
            default_retry_after: Duration::from_secs(1),
            backoff_step: Duration::from_millis(600),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Knobs of the enrichment loop.
#[derive(Clone, Debug)]
pub struct EnrichSettings {
    pub limit: usize,
    /// Pause between successive rows, whatever their outcome
    pub call_delay: Duration,
    pub checkpoint_every: usize,
    pub fetch_artist_stats: bool,
    /// Persist accumulated rows before propagating a fatal error
    pub flush_on_error: bool,
}

impl Default for EnrichSettings {
    fn default() -> Self {
        Self {
            limit: 400,
            call_delay: Duration::from_millis(120),
            checkpoint_every: 50,
            fetch_artist_stats: true,
            flush_on_error: true,
        }
    }
}

/// Artifact locations under the data directory.
#[derive(Clone, Debug)]
pub struct DataPaths {
    pub data_dir: PathBuf,
}

impl DataPaths {
    pub const LEADERBOARD_FILE: &'static str = "kworb_top_400.csv";
    pub const ENRICHED_FILE: &'static str = "spotify_from_kworb_400.csv";
    pub const AUDIO_MERGED_FILE: &'static str = "spotify_kworb_kaggle1.csv";
    pub const VIDEO_MERGED_FILE: &'static str = "spotify_kworb_kaggle1_kaggle2.csv";
    pub const AUDIO_EXTRACT_DIR: &'static str = "kaggle_audio_lyrics";
    pub const VIDEO_EXTRACT_DIR: &'static str = "kaggle_youtube";

    pub const AUDIO_DATASET: &'static str = "imuhammad/audio-features-and-lyrics-of-spotify-songs";
    pub const VIDEO_DATASET: &'static str = "asmonline/most-viewed-youtube-music-videos";

    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn leaderboard(&self) -> PathBuf {
        self.data_dir.join(Self::LEADERBOARD_FILE)
    }

    pub fn enriched(&self) -> PathBuf {
        self.data_dir.join(Self::ENRICHED_FILE)
    }

    pub fn audio_merged(&self) -> PathBuf {
        self.data_dir.join(Self::AUDIO_MERGED_FILE)
    }

    pub fn video_merged(&self) -> PathBuf {
        self.data_dir.join(Self::VIDEO_MERGED_FILE)
    }

    pub fn audio_extract_dir(&self) -> PathBuf {
        self.data_dir.join(Self::AUDIO_EXTRACT_DIR)
    }

    pub fn video_extract_dir(&self) -> PathBuf {
        self.data_dir.join(Self::VIDEO_EXTRACT_DIR)
    }
}

impl Default for DataPaths {
    fn default() -> Self {
        Self::new("data")
    }
}

/// Client-credentials identity for the token endpoint.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Config
// ============================================================================

#[derive(Clone, Debug, Default)]
pub struct Config {
    pub api: ApiEndpoints,
    pub retry: RetryPolicy,
    pub enrich: EnrichSettings,
    pub paths: DataPaths,
    pub credentials: Option<Credentials>,
}

impl Config {
    /// Load `.env` (if present) and read credentials and the data directory
    /// from the environment. Missing credentials are not an error here; the
    /// enrichment stage asks for them via `credentials()`.
    pub fn from_env(env_file: Option<&Path>, data_dir: Option<PathBuf>) -> Self {
        match env_file {
            Some(path) => {
                if let Err(e) = dotenvy::from_path(path) {
                    tracing::warn!(path = %path.display(), error = %e, "could not load env file");
                }
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }

        let data_dir = data_dir
            .or_else(|| std::env::var_os(DATA_DIR_VAR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("data"));

        Self {
            paths: DataPaths::new(data_dir),
            credentials: credentials_from(
                std::env::var(CLIENT_ID_VAR).ok(),
                std::env::var(CLIENT_SECRET_VAR).ok(),
            ),
            ..Self::default()
        }
    }

    /// Credentials for the enrichment stage; absent credentials are fatal.
    pub fn credentials(&self) -> Result<&Credentials> {
        self.credentials.as_ref().ok_or_else(|| {
            Error::Config(format!(
                "set {} and {} (environment or .env)",
                CLIENT_ID_VAR, CLIENT_SECRET_VAR
            ))
        })
    }
}

/// Both values must be present and non-blank.
pub fn credentials_from(client_id: Option<String>, client_secret: Option<String>) -> Option<Credentials> {
    let client_id = client_id.filter(|s| !s.trim().is_empty())?;
    let client_secret = client_secret.filter(|s| !s.trim().is_empty())?;
    Some(Credentials {
        client_id: client_id.trim().to_string(),
        client_secret: client_secret.trim().to_string(),
    })
}
