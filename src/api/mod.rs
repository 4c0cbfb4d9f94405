//! Streaming-service gateway: the calls the extractors need, returning raw JSON records.

pub mod spotify;

use serde_json::Value;
use thiserror::Error;

pub use spotify::SpotifyClient;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Spotify credentials missing (set client_id/client_secret or SPOTIFY_CLIENT_ID/SPOTIFY_CLIENT_SECRET)")]
    MissingCredentials,
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("HTTP request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("Unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

/// One page of a paginated listing.
#[derive(Debug, Default)]
pub struct Page {
    pub items: Vec<Value>,
    /// Upstream reports more items past this page.
    pub has_more: bool,
}

/// Lookup calls used by the pipeline. Each returns raw, unvalidated records.
pub trait Gateway: Send + Sync {
    /// Search artists by name, best match first.
    fn search_artist(&self, name: &str, limit: usize) -> Result<Vec<Value>, ApiError>;

    /// Albums (album group only) released by an artist.
    fn artist_albums(&self, artist_id: &str, limit: usize, offset: usize) -> Result<Page, ApiError>;

    /// Tracks on an album.
    fn album_tracks(&self, album_id: &str, limit: usize, offset: usize) -> Result<Page, ApiError>;

    /// Audio features for a batch of tracks, positionally aligned with `track_ids`.
    /// Tracks without analysis come back as `Value::Null`.
    fn audio_features(&self, track_ids: &[String]) -> Result<Vec<Value>, ApiError>;
}
