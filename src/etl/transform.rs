//! Raw API records → fixed-column rows.
//!
//! Every transformer is total over its input: a record that cannot be
//! projected is logged and counted, never allowed to abort the stage.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::db::models::{Album, Artist, Track, TrackFeature};

/// Stored in `artist.genre` when Spotify reports no genres.
pub const NO_GENRE: &str = "no_genre_found";

/// Why a raw record was skipped.
#[derive(Error, Debug, PartialEq)]
pub enum TransformError {
    #[error("missing or invalid field `{0}`")]
    MissingField(&'static str),
    #[error("unparseable release date {0:?}")]
    BadReleaseDate(String),
    #[error("album lists no artists")]
    NoArtists,
}

/// How the `explicit` flag is coerced to a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExplicitPolicy {
    /// Falsy encodings (false, null, 0, "false", "0", "no", "") → false, all else → true.
    #[default]
    Standard,
    /// Only the exact string "FALSE" is false; everything else, JSON `false` included, is true.
    Legacy,
}

/// Rows produced by one transform pass plus the number of records skipped.
#[derive(Debug)]
pub struct Transformed<R> {
    pub rows: Vec<R>,
    pub skipped: usize,
}

pub fn transform_artists(raw: &[Value]) -> Transformed<Artist> {
    transform_all(raw, "artist", artist_row)
}

pub fn transform_albums(raw: &[Value]) -> Transformed<Album> {
    transform_all(raw, "album", album_row)
}

pub fn transform_tracks(raw: &[Value], policy: ExplicitPolicy) -> Transformed<Track> {
    transform_all(raw, "track", |rec| track_row(rec, policy))
}

pub fn transform_features(raw: &[Value]) -> Transformed<TrackFeature> {
    transform_all(raw, "track feature", feature_row)
}

fn transform_all<R, F>(raw: &[Value], entity: &str, f: F) -> Transformed<R>
where
    F: Fn(&Value) -> Result<R, TransformError>,
{
    let mut rows = Vec::with_capacity(raw.len());
    let mut skipped = 0;

    for rec in raw {
        match f(rec) {
            Ok(row) => rows.push(row),
            Err(e) => {
                skipped += 1;
                let id = rec.get("id").and_then(Value::as_str).unwrap_or("<no id>");
                log::warn!("Skipping malformed {entity} record {id}: {e}");
            }
        }
    }

    Transformed { rows, skipped }
}

fn artist_row(rec: &Value) -> Result<Artist, TransformError> {
    Ok(Artist {
        artist_id: req_str(rec, "id")?,
        artist_name: req_str(rec, "name")?,
        external_url: spotify_url(rec),
        genre: pick_genre(rec.get("genres")),
        image_url: first_image_url(rec.get("images")),
        followers: rec
            .pointer("/followers/total")
            .and_then(as_int)
            .ok_or(TransformError::MissingField("followers.total"))?
            .max(0),
        popularity: req_int(rec, "popularity")?.clamp(0, 100),
        kind: req_str(rec, "type")?,
        artist_uri: req_str(rec, "uri")?,
    })
}

fn album_row(rec: &Value) -> Result<Album, TransformError> {
    let raw_date = req_str(rec, "release_date")?;
    let release_date = normalize_release_date(&raw_date)
        .ok_or(TransformError::BadReleaseDate(raw_date))?;

    Ok(Album {
        album_id: req_str(rec, "id")?,
        album_name: req_str(rec, "name")?,
        external_url: spotify_url(rec),
        image_url: first_image_url(rec.get("images")),
        release_date,
        total_tracks: req_int(rec, "total_tracks")?.max(0),
        kind: req_str(rec, "type")?,
        album_uri: req_str(rec, "uri")?,
        artist_id: first_artist_id(rec.get("artists")).ok_or(TransformError::NoArtists)?,
    })
}

fn track_row(rec: &Value, policy: ExplicitPolicy) -> Result<Track, TransformError> {
    Ok(Track {
        track_id: req_str(rec, "id")?,
        song_name: req_str(rec, "name")?,
        external_url: spotify_url(rec),
        duration_ms: req_int(rec, "duration_ms")?.max(0),
        explicit: coerce_explicit(rec.get("explicit"), policy),
        disc_number: req_int(rec, "disc_number")?.max(1),
        kind: req_str(rec, "type")?,
        song_uri: req_str(rec, "uri")?,
        album_id: req_str(rec, "album_id")?,
    })
}

fn feature_row(rec: &Value) -> Result<TrackFeature, TransformError> {
    Ok(TrackFeature {
        track_id: req_str(rec, "id")?,
        danceability: req_float(rec, "danceability")?,
        energy: req_float(rec, "energy")?,
        instrumentalness: req_float(rec, "instrumentalness")?,
        liveness: req_float(rec, "liveness")?,
        loudness: req_float(rec, "loudness")?,
        speechiness: req_float(rec, "speechiness")?,
        tempo: req_float(rec, "tempo")?,
        kind: req_str(rec, "type")?,
        valence: req_float(rec, "valence")?,
        song_uri: req_str(rec, "uri")?,
    })
}

// --- Field policies ---

/// First reported genre, or [`NO_GENRE`] when the list is empty or absent.
pub fn pick_genre(genres: Option<&Value>) -> String {
    genres
        .and_then(Value::as_array)
        .and_then(|g| g.first())
        .and_then(Value::as_str)
        .unwrap_or(NO_GENRE)
        .to_string()
}

/// URL of the first image entry (Spotify lists the largest first).
pub fn first_image_url(images: Option<&Value>) -> Option<String> {
    images?
        .as_array()?
        .first()?
        .get("url")?
        .as_str()
        .map(str::to_string)
}

/// Album attribution: the first listed artist only. Co-credited artists are dropped.
pub fn first_artist_id(artists: Option<&Value>) -> Option<String> {
    artists?
        .as_array()?
        .first()?
        .get("id")?
        .as_str()
        .map(str::to_string)
}

/// Coerce a raw `explicit` value to a boolean under the given policy.
pub fn coerce_explicit(raw: Option<&Value>, policy: ExplicitPolicy) -> bool {
    match policy {
        ExplicitPolicy::Legacy => !matches!(raw, Some(Value::String(s)) if s == "FALSE"),
        ExplicitPolicy::Standard => match raw {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => {
                let s = s.trim().to_ascii_lowercase();
                !matches!(s.as_str(), "" | "false" | "0" | "no")
            }
            Some(_) => true,
        },
    }
}

static RELEASE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})(?:-(\d{2})(?:-(\d{2}))?)?$").unwrap()
});

/// Normalize a Spotify release date to day precision.
///
/// `"2020"` → `"2020-01-01"`, `"2020-05"` → `"2020-05-01"`, full dates pass
/// through. Returns `None` for anything that is not a real calendar date.
pub fn normalize_release_date(raw: &str) -> Option<String> {
    let caps = RELEASE_DATE_RE.captures(raw.trim())?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps.get(2).map_or(Some(1), |m| m.as_str().parse().ok())?;
    let day: u32 = caps.get(3).map_or(Some(1), |d| d.as_str().parse().ok())?;

    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Drop albums repeating an earlier (name, release date, track count, artist).
/// Returns the kept rows and the number removed.
pub fn dedupe_albums(albums: Vec<Album>) -> (Vec<Album>, usize) {
    let before = albums.len();
    let mut seen = HashSet::new();
    let kept: Vec<Album> = albums
        .into_iter()
        .filter(|a| {
            seen.insert((
                a.album_name.clone(),
                a.release_date.clone(),
                a.total_tracks,
                a.artist_id.clone(),
            ))
        })
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}

// --- Raw field access ---

fn spotify_url(rec: &Value) -> Option<String> {
    rec.pointer("/external_urls/spotify")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn req_str(rec: &Value, field: &'static str) -> Result<String, TransformError> {
    rec.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(TransformError::MissingField(field))
}

fn req_int(rec: &Value, field: &'static str) -> Result<i64, TransformError> {
    rec.get(field)
        .and_then(as_int)
        .ok_or(TransformError::MissingField(field))
}

fn req_float(rec: &Value, field: &'static str) -> Result<f64, TransformError> {
    rec.get(field)
        .and_then(Value::as_f64)
        .ok_or(TransformError::MissingField(field))
}

/// Integer value, accepting whole floats (`3.0`) as some payloads carry them.
fn as_int(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| {
        v.as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_artist() -> Value {
        json!({
            "id": "0Z5FMozvx15nfbFu8Jq7bj",
            "name": "Baths",
            "external_urls": {"spotify": "https://open.spotify.com/artist/0Z5FMozvx15nfbFu8Jq7bj"},
            "genres": ["chillwave", "indietronica"],
            "images": [
                {"url": "https://i.scdn.co/image/large", "height": 640, "width": 640},
                {"url": "https://i.scdn.co/image/small", "height": 160, "width": 160}
            ],
            "followers": {"href": null, "total": 151234},
            "popularity": 47,
            "type": "artist",
            "uri": "spotify:artist:0Z5FMozvx15nfbFu8Jq7bj"
        })
    }

    fn raw_album() -> Value {
        json!({
            "id": "alb1",
            "name": "Cerulean",
            "external_urls": {"spotify": "https://open.spotify.com/album/alb1"},
            "images": [{"url": "https://i.scdn.co/image/cover"}],
            "release_date": "2010-06",
            "release_date_precision": "month",
            "total_tracks": 12,
            "type": "album",
            "uri": "spotify:album:alb1",
            "artists": [{"id": "main"}, {"id": "guest"}]
        })
    }

    fn raw_track() -> Value {
        json!({
            "id": "trk1",
            "name": "Lovely Bloodflow",
            "external_urls": {"spotify": "https://open.spotify.com/track/trk1"},
            "duration_ms": 250000,
            "explicit": false,
            "disc_number": 1,
            "type": "track",
            "uri": "spotify:track:trk1",
            "album_id": "alb1"
        })
    }

    fn raw_feature() -> Value {
        json!({
            "id": "trk1",
            "danceability": 0.61,
            "energy": 0.45,
            "instrumentalness": 0.02,
            "liveness": 0.11,
            "loudness": -8.3,
            "speechiness": 0.05,
            "tempo": 126.0,
            "type": "audio_features",
            "valence": 0.33,
            "uri": "spotify:track:trk1",
            "key": 5,
            "analysis_url": "https://api.spotify.com/v1/audio-analysis/trk1"
        })
    }

    // === Release dates ===

    #[test]
    fn test_normalize_year_only() {
        assert_eq!(normalize_release_date("2020").as_deref(), Some("2020-01-01"));
    }

    #[test]
    fn test_normalize_year_month() {
        assert_eq!(normalize_release_date("2020-05").as_deref(), Some("2020-05-01"));
    }

    #[test]
    fn test_normalize_full_date_is_idempotent() {
        assert_eq!(normalize_release_date("2020-05-15").as_deref(), Some("2020-05-15"));
        let once = normalize_release_date("1999").unwrap();
        assert_eq!(normalize_release_date(&once), Some(once.clone()));
    }

    #[test]
    fn test_normalized_dates_are_ten_char_calendar_dates() {
        for raw in ["1969", "1977-05", "2000-02-29", "2024-12-31", " 2011-03 "] {
            let d = normalize_release_date(raw).unwrap();
            assert_eq!(d.len(), 10, "{raw}");
            assert!(NaiveDate::parse_from_str(&d, "%Y-%m-%d").is_ok(), "{raw}");
        }
    }

    #[test]
    fn test_normalize_rejects_invalid() {
        assert_eq!(normalize_release_date("2021-02-29"), None);
        assert_eq!(normalize_release_date("2020-13"), None);
        assert_eq!(normalize_release_date("20"), None);
        assert_eq!(normalize_release_date("May 2020"), None);
        assert_eq!(normalize_release_date(""), None);
    }

    // === Genre ===

    #[test]
    fn test_genre_sentinel_when_empty() {
        assert_eq!(pick_genre(Some(&json!([]))), NO_GENRE);
        assert_eq!(pick_genre(None), NO_GENRE);
    }

    #[test]
    fn test_genre_takes_first() {
        assert_eq!(pick_genre(Some(&json!(["shoegaze", "dream pop"]))), "shoegaze");
        assert_eq!(pick_genre(Some(&json!(["art pop"]))), "art pop");
    }

    // === Explicit ===

    #[test]
    fn test_explicit_standard_policy() {
        let p = ExplicitPolicy::Standard;
        for falsy in [json!(false), json!(null), json!(0), json!("false"), json!("FALSE"), json!("0"), json!("no"), json!("")] {
            assert!(!coerce_explicit(Some(&falsy), p), "{falsy}");
        }
        for truthy in [json!(true), json!(1), json!("true"), json!("TRUE"), json!("yes")] {
            assert!(coerce_explicit(Some(&truthy), p), "{truthy}");
        }
        assert!(!coerce_explicit(None, p));
    }

    #[test]
    fn test_explicit_legacy_policy() {
        let p = ExplicitPolicy::Legacy;
        assert!(!coerce_explicit(Some(&json!("FALSE")), p));
        for v in [json!(false), json!("false"), json!(0), json!(null), json!(true), json!("TRUE")] {
            assert!(coerce_explicit(Some(&v), p), "{v}");
        }
        assert!(coerce_explicit(None, p));
    }

    // === Selection heuristics ===

    #[test]
    fn test_first_image_url() {
        let images = json!([{"url": "a"}, {"url": "b"}]);
        assert_eq!(first_image_url(Some(&images)).as_deref(), Some("a"));
        assert_eq!(first_image_url(Some(&json!([]))), None);
        assert_eq!(first_image_url(None), None);
    }

    #[test]
    fn test_first_artist_id() {
        let artists = json!([{"id": "main"}, {"id": "guest"}]);
        assert_eq!(first_artist_id(Some(&artists)).as_deref(), Some("main"));
        assert_eq!(first_artist_id(Some(&json!([]))), None);
    }

    // === Row projection ===

    #[test]
    fn test_transform_artist() {
        let out = transform_artists(&[raw_artist()]);
        assert_eq!(out.skipped, 0);
        let a = &out.rows[0];
        assert_eq!(a.artist_id, "0Z5FMozvx15nfbFu8Jq7bj");
        assert_eq!(a.artist_name, "Baths");
        assert_eq!(a.genre, "chillwave");
        assert_eq!(a.image_url.as_deref(), Some("https://i.scdn.co/image/large"));
        assert_eq!(a.followers, 151234);
        assert_eq!(a.popularity, 47);
        assert_eq!(a.kind, "artist");
        assert_eq!(
            a.external_url.as_deref(),
            Some("https://open.spotify.com/artist/0Z5FMozvx15nfbFu8Jq7bj")
        );
    }

    #[test]
    fn test_transform_artist_without_images_or_genres() {
        let mut rec = raw_artist();
        rec["images"] = json!([]);
        rec["genres"] = json!([]);
        let out = transform_artists(&[rec]);
        assert_eq!(out.skipped, 0);
        assert_eq!(out.rows[0].image_url, None);
        assert_eq!(out.rows[0].genre, NO_GENRE);
    }

    #[test]
    fn test_transform_artist_missing_id_is_skipped() {
        let mut rec = raw_artist();
        rec.as_object_mut().unwrap().remove("id");
        let out = transform_artists(&[rec, raw_artist()]);
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.skipped, 1);
    }

    #[test]
    fn test_transform_artist_missing_counts_are_skipped() {
        let mut no_followers = raw_artist();
        no_followers.as_object_mut().unwrap().remove("followers");
        let mut bad_popularity = raw_artist();
        bad_popularity["popularity"] = json!("high");

        let out = transform_artists(&[no_followers.clone(), bad_popularity.clone(), raw_artist()]);
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.skipped, 2);
        assert_eq!(artist_row(&no_followers), Err(TransformError::MissingField("followers.total")));
        assert_eq!(artist_row(&bad_popularity), Err(TransformError::MissingField("popularity")));
    }

    #[test]
    fn test_transform_album() {
        let out = transform_albums(&[raw_album()]);
        let a = &out.rows[0];
        assert_eq!(a.release_date, "2010-06-01");
        assert_eq!(a.artist_id, "main");
        assert_eq!(a.total_tracks, 12);
        assert_eq!(a.image_url.as_deref(), Some("https://i.scdn.co/image/cover"));
    }

    #[test]
    fn test_transform_album_bad_date_and_no_artists_skipped() {
        let mut bad_date = raw_album();
        bad_date["release_date"] = json!("unknown");
        let mut no_artists = raw_album();
        no_artists["artists"] = json!([]);

        let out = transform_albums(&[bad_date.clone(), no_artists.clone(), raw_album()]);
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.skipped, 2);
        assert_eq!(album_row(&bad_date), Err(TransformError::BadReleaseDate("unknown".into())));
        assert_eq!(album_row(&no_artists), Err(TransformError::NoArtists));
    }

    #[test]
    fn test_transform_track() {
        let out = transform_tracks(&[raw_track()], ExplicitPolicy::Standard);
        let t = &out.rows[0];
        assert_eq!(t.track_id, "trk1");
        assert_eq!(t.album_id, "alb1");
        assert_eq!(t.duration_ms, 250000);
        assert!(!t.explicit);
        assert_eq!(t.disc_number, 1);
    }

    #[test]
    fn test_transform_track_legacy_explicit() {
        let out = transform_tracks(&[raw_track()], ExplicitPolicy::Legacy);
        assert!(out.rows[0].explicit);
    }

    #[test]
    fn test_transform_track_without_album_stamp_is_skipped() {
        let mut rec = raw_track();
        rec.as_object_mut().unwrap().remove("album_id");
        let out = transform_tracks(&[rec], ExplicitPolicy::Standard);
        assert!(out.rows.is_empty());
        assert_eq!(out.skipped, 1);
    }

    #[test]
    fn test_transform_track_without_disc_number_is_skipped() {
        let mut rec = raw_track();
        rec.as_object_mut().unwrap().remove("disc_number");
        let out = transform_tracks(&[rec.clone(), raw_track()], ExplicitPolicy::Standard);
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.skipped, 1);
        assert_eq!(track_row(&rec, ExplicitPolicy::Standard), Err(TransformError::MissingField("disc_number")));
    }

    #[test]
    fn test_transform_feature_renames_columns() {
        let out = transform_features(&[raw_feature()]);
        let f = &out.rows[0];
        assert_eq!(f.track_id, "trk1");
        assert_eq!(f.song_uri, "spotify:track:trk1");
        assert_eq!(f.tempo, 126.0);
        assert_eq!(f.loudness, -8.3);
    }

    #[test]
    fn test_transform_feature_missing_value_skipped() {
        let mut rec = raw_feature();
        rec["tempo"] = Value::Null;
        let out = transform_features(&[rec]);
        assert_eq!(out.skipped, 1);
        assert_eq!(feature_row(&raw_feature()).map(|f| f.kind), Ok("audio_features".to_string()));
    }

    #[test]
    fn test_integer_fields_accept_whole_floats() {
        let mut rec = raw_track();
        rec["duration_ms"] = json!(1000.0);
        let out = transform_tracks(&[rec], ExplicitPolicy::Standard);
        assert_eq!(out.rows[0].duration_ms, 1000);
    }

    // === Dedup ===

    #[test]
    fn test_dedupe_albums_keeps_first() {
        let first = transform_albums(&[raw_album()]).rows.remove(0);
        let mut reissue = first.clone();
        reissue.album_id = "alb2".into();
        let mut other = first.clone();
        other.album_id = "alb3".into();
        other.album_name = "Obsidian".into();

        let (kept, removed) = dedupe_albums(vec![first, reissue, other]);
        assert_eq!(removed, 1);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].album_id, "alb1");
        assert_eq!(kept[1].album_id, "alb3");
    }
}
