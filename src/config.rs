use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

/// Seed artists used when neither the CLI nor the config file names any.
pub const DEFAULT_ARTISTS: &[&str] = &[
    "Baths",
    "100 gecs",
    "The 1975",
    "My Chemical Romance",
    "Grimes",
    "Aphex Twin",
    "Mitski",
    "Phoebe Bridgers",
    "LCD Soundsystem",
    "Soccer Mommy",
    "Men I Trust",
    "i9bonsai",
    "Turnover",
    "beabadobee",
    "Black Marble",
    "Slow Pulp",
    "Snail Mail",
    "Death Grips",
    "Varsity",
    "Alvvays",
];

/// Spotify caps paging endpoints at 50 items per request.
pub const MAX_PAGE_SIZE: usize = 50;

/// Spotify caps `/audio-features` at 100 ids per request.
pub const MAX_FEATURE_BATCH: usize = 100;

/// Application configuration loaded from TOML config file.
/// All fields have defaults; the config file is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Artist names that seed the pipeline (used when `run` has no CLI args).
    pub artists: Vec<String>,
    /// Custom database path (overrides XDG default).
    pub db_path: Option<PathBuf>,
    /// Fetch workers per stage. 1 = sequential.
    pub workers: usize,
    /// Spotify API settings.
    pub spotify: SpotifyConfig,
    /// Transform/load behaviour.
    pub etl: EtlConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            artists: DEFAULT_ARTISTS.iter().map(|a| a.to_string()).collect(),
            db_path: None,
            workers: 1,
            spotify: SpotifyConfig::default(),
            etl: EtlConfig::default(),
        }
    }
}

/// Spotify Web API configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Market (ISO country code) used for album and track listings.
    pub market: String,
    /// Items requested per page (1..=50).
    pub page_size: usize,
    /// Pages fetched per artist/album listing. 0 = follow until exhausted.
    pub max_pages: usize,
    /// Track ids per audio-features call (1..=100).
    pub feature_batch_size: usize,
    /// Minimum gap between API requests in milliseconds, across all workers.
    pub rate_limit_ms: u64,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            market: "US".to_string(),
            page_size: MAX_PAGE_SIZE,
            max_pages: 1,
            feature_batch_size: 1,
            rate_limit_ms: 0,
        }
    }
}

impl SpotifyConfig {
    /// Client id and secret from the config file, falling back to
    /// `SPOTIFY_CLIENT_ID` / `SPOTIFY_CLIENT_SECRET`.
    pub fn credentials(&self) -> Option<(String, String)> {
        let id = self
            .client_id
            .clone()
            .or_else(|| std::env::var("SPOTIFY_CLIENT_ID").ok())
            .filter(|s| !s.is_empty())?;
        let secret = self
            .client_secret
            .clone()
            .or_else(|| std::env::var("SPOTIFY_CLIENT_SECRET").ok())
            .filter(|s| !s.is_empty())?;
        Some((id, secret))
    }
}

/// Transform/load options.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct EtlConfig {
    /// Drop albums repeating (name, release date, track count, artist).
    pub dedupe_albums: bool,
    /// Coerce `explicit` the legacy way: only the string "FALSE" is false.
    pub legacy_explicit: bool,
}

impl AppConfig {
    /// Load config from `~/.config/spotify-etl/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match Self::parse(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve the default database path using XDG data directory.
pub fn default_db_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).ok();
        data_dir.join("spotify.db")
    } else {
        PathBuf::from("spotify.db")
    }
}
