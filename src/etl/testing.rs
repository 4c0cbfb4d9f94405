//! In-memory gateway and record builders for pipeline tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{json, Value};

use crate::api::{ApiError, Gateway, Page};

#[derive(Default)]
pub struct FakeGateway {
    artists: HashMap<String, Vec<Value>>,
    albums: HashMap<String, Vec<Value>>,
    tracks: HashMap<String, Vec<Value>>,
    features: HashMap<String, Value>,
    fail_on: Option<String>,
    calls: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artist(mut self, name: &str, record: Value) -> Self {
        self.artists.entry(name.to_string()).or_default().push(record);
        self
    }

    pub fn with_album(mut self, artist_id: &str, record: Value) -> Self {
        self.albums.entry(artist_id.to_string()).or_default().push(record);
        self
    }

    /// Add `n` tracks with ids `{album_id}-t{i}`.
    pub fn with_tracks(mut self, album_id: &str, n: usize) -> Self {
        let list = self.tracks.entry(album_id.to_string()).or_default();
        for i in 0..n {
            list.push(track_json(&format!("{album_id}-t{i}"), 180_000 + i as i64 * 1000));
        }
        self
    }

    pub fn with_feature(mut self, track_id: &str, record: Value) -> Self {
        self.features.insert(track_id.to_string(), record);
        self
    }

    /// Fail any call naming this id with an HTTP 503.
    pub fn failing_on(mut self, id: &str) -> Self {
        self.fail_on = Some(id.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record_call(&self, id: &str) -> Result<(), ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.as_deref() == Some(id) {
            return Err(ApiError::Status {
                status: 503,
                url: format!("fake://{id}"),
            });
        }
        Ok(())
    }
}

fn page(all: Option<&Vec<Value>>, limit: usize, offset: usize) -> Page {
    let all = all.map(Vec::as_slice).unwrap_or_default();
    let end = (offset + limit).min(all.len());
    let items = all.get(offset..end).map(<[Value]>::to_vec).unwrap_or_default();
    Page {
        items,
        has_more: end < all.len(),
    }
}

impl Gateway for FakeGateway {
    fn search_artist(&self, name: &str, _limit: usize) -> Result<Vec<Value>, ApiError> {
        self.record_call(name)?;
        Ok(self.artists.get(name).cloned().unwrap_or_default())
    }

    fn artist_albums(&self, artist_id: &str, limit: usize, offset: usize) -> Result<Page, ApiError> {
        self.record_call(artist_id)?;
        Ok(page(self.albums.get(artist_id), limit, offset))
    }

    fn album_tracks(&self, album_id: &str, limit: usize, offset: usize) -> Result<Page, ApiError> {
        self.record_call(album_id)?;
        Ok(page(self.tracks.get(album_id), limit, offset))
    }

    fn audio_features(&self, track_ids: &[String]) -> Result<Vec<Value>, ApiError> {
        for id in track_ids {
            if self.fail_on.as_deref() == Some(id.as_str()) {
                return self.record_call(id).map(|_| Vec::new());
            }
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(track_ids
            .iter()
            .map(|id| self.features.get(id).cloned().unwrap_or(Value::Null))
            .collect())
    }
}

pub fn artist_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "external_urls": {"spotify": format!("https://open.spotify.com/artist/{id}")},
        "genres": ["indietronica"],
        "images": [{"url": format!("https://i.scdn.co/image/{id}")}],
        "followers": {"href": null, "total": 1000},
        "popularity": 50,
        "type": "artist",
        "uri": format!("spotify:artist:{id}")
    })
}

pub fn album_json(id: &str, name: &str, artist_id: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "external_urls": {"spotify": format!("https://open.spotify.com/album/{id}")},
        "images": [],
        "release_date": "2010",
        "release_date_precision": "year",
        "total_tracks": 3,
        "type": "album",
        "uri": format!("spotify:album:{id}"),
        "artists": [{"id": artist_id}]
    })
}

pub fn track_json(id: &str, duration_ms: i64) -> Value {
    json!({
        "id": id,
        "name": format!("Song {id}"),
        "external_urls": {"spotify": format!("https://open.spotify.com/track/{id}")},
        "duration_ms": duration_ms,
        "explicit": false,
        "disc_number": 1,
        "type": "track",
        "uri": format!("spotify:track:{id}")
    })
}

pub fn feature_json(track_id: &str, tempo: f64) -> Value {
    json!({
        "id": track_id,
        "danceability": 0.5,
        "energy": 0.6,
        "instrumentalness": 0.1,
        "liveness": 0.2,
        "loudness": -7.5,
        "speechiness": 0.05,
        "tempo": tempo,
        "type": "audio_features",
        "valence": 0.4,
        "uri": format!("spotify:track:{track_id}")
    })
}
