use rusqlite::ToSql;

/// A fixed-column row that can be appended to its table.
pub trait TableRow {
    /// Target table name.
    const TABLE: &'static str;
    /// Column names, in the same order as [`TableRow::values`].
    const COLUMNS: &'static [&'static str];

    fn values(&self) -> Vec<&dyn ToSql>;

    /// The entity id this row is keyed by (seeds the next stage).
    fn key(&self) -> &str;
}

/// A row of the `artist` table.
#[derive(Debug, Clone, PartialEq)]
pub struct Artist {
    pub artist_id: String,
    pub artist_name: String,
    pub external_url: Option<String>,
    pub genre: String,
    pub image_url: Option<String>,
    pub followers: i64,
    pub popularity: i64,
    pub kind: String,
    pub artist_uri: String,
}

impl TableRow for Artist {
    const TABLE: &'static str = "artist";
    const COLUMNS: &'static [&'static str] = &[
        "artist_id", "artist_name", "external_url", "genre", "image_url",
        "followers", "popularity", "type", "artist_uri",
    ];

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.artist_id, &self.artist_name, &self.external_url, &self.genre, &self.image_url,
            &self.followers, &self.popularity, &self.kind, &self.artist_uri,
        ]
    }

    fn key(&self) -> &str {
        &self.artist_id
    }
}

/// A row of the `album` table.
#[derive(Debug, Clone, PartialEq)]
pub struct Album {
    pub album_id: String,
    pub album_name: String,
    pub external_url: Option<String>,
    pub image_url: Option<String>,
    /// Always day precision (YYYY-MM-DD).
    pub release_date: String,
    pub total_tracks: i64,
    pub kind: String,
    pub album_uri: String,
    pub artist_id: String,
}

impl TableRow for Album {
    const TABLE: &'static str = "album";
    const COLUMNS: &'static [&'static str] = &[
        "album_id", "album_name", "external_url", "image_url", "release_date",
        "total_tracks", "type", "album_uri", "artist_id",
    ];

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.album_id, &self.album_name, &self.external_url, &self.image_url, &self.release_date,
            &self.total_tracks, &self.kind, &self.album_uri, &self.artist_id,
        ]
    }

    fn key(&self) -> &str {
        &self.album_id
    }
}

/// A row of the `track` table.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub track_id: String,
    pub song_name: String,
    pub external_url: Option<String>,
    pub duration_ms: i64,
    pub explicit: bool,
    pub disc_number: i64,
    pub kind: String,
    pub song_uri: String,
    pub album_id: String,
}

impl TableRow for Track {
    const TABLE: &'static str = "track";
    const COLUMNS: &'static [&'static str] = &[
        "track_id", "song_name", "external_url", "duration_ms", "explicit",
        "disc_number", "type", "song_uri", "album_id",
    ];

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.track_id, &self.song_name, &self.external_url, &self.duration_ms, &self.explicit,
            &self.disc_number, &self.kind, &self.song_uri, &self.album_id,
        ]
    }

    fn key(&self) -> &str {
        &self.track_id
    }
}

/// A row of the `track_feature` table.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackFeature {
    pub track_id: String,
    pub danceability: f64,
    pub energy: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub loudness: f64,
    pub speechiness: f64,
    pub tempo: f64,
    pub kind: String,
    pub valence: f64,
    pub song_uri: String,
}

impl TableRow for TrackFeature {
    const TABLE: &'static str = "track_feature";
    const COLUMNS: &'static [&'static str] = &[
        "track_id", "danceability", "energy", "instrumentalness", "liveness",
        "loudness", "speechiness", "tempo", "type", "valence", "song_uri",
    ];

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.track_id, &self.danceability, &self.energy, &self.instrumentalness, &self.liveness,
            &self.loudness, &self.speechiness, &self.tempo, &self.kind, &self.valence, &self.song_uri,
        ]
    }

    fn key(&self) -> &str {
        &self.track_id
    }
}

/// One row of `vw_artist_summary`.
#[derive(Debug, Clone)]
pub struct ArtistSummary {
    pub artist_id: String,
    pub artist_name: String,
    pub album_count: i64,
    pub song_count: i64,
    pub avg_song_duration_ms: Option<f64>,
    pub avg_tempo: Option<f64>,
    pub avg_danceability: Option<f64>,
    pub avg_energy: Option<f64>,
}

/// Rows of an analytical view, rendered as text for display.
#[derive(Debug, Default)]
pub struct ViewTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Row counts per entity table.
#[derive(Debug, Default)]
pub struct TableStats {
    pub artists: i64,
    pub albums: i64,
    pub tracks: i64,
    pub track_features: i64,
}
