//! Table and view DDL for the four entity tables and the analytical views.
//!
//! Tables carry no constraints: loads are append-only and the views join on
//! ids, so duplicate rows from repeated runs without a reset are kept as-is.

/// Entity tables in load order.
pub const TABLES: &[&str] = &["artist", "album", "track", "track_feature"];

/// Analytical views in creation order.
pub const VIEWS: &[&str] = &[
    "vw_top_songs_duration",
    "vw_top_artists",
    "vw_top_songs_tempo",
    "vw_artist_summary",
    "vw_album_summary",
];

pub const CREATE_TABLES: &str = "
    CREATE TABLE IF NOT EXISTS artist (
        artist_id       TEXT,
        artist_name     TEXT,
        external_url    TEXT,
        genre           TEXT NOT NULL,
        image_url       TEXT,
        followers       INTEGER,
        popularity      INTEGER,
        type            TEXT,
        artist_uri      TEXT
    );

    CREATE TABLE IF NOT EXISTS album (
        album_id        TEXT,
        album_name      TEXT,
        external_url    TEXT,
        image_url       TEXT,
        release_date    TEXT,
        total_tracks    INTEGER,
        type            TEXT,
        album_uri       TEXT,
        artist_id       TEXT
    );

    CREATE TABLE IF NOT EXISTS track (
        track_id        TEXT,
        song_name       TEXT,
        external_url    TEXT,
        duration_ms     INTEGER,
        explicit        INTEGER NOT NULL,
        disc_number     INTEGER,
        type            TEXT,
        song_uri        TEXT,
        album_id        TEXT
    );

    CREATE TABLE IF NOT EXISTS track_feature (
        track_id         TEXT,
        danceability     REAL,
        energy           REAL,
        instrumentalness REAL,
        liveness         REAL,
        loudness         REAL,
        speechiness      REAL,
        tempo            REAL,
        type             TEXT,
        valence          REAL,
        song_uri         TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_album_artist ON album(artist_id);
    CREATE INDEX IF NOT EXISTS idx_track_album ON track(album_id);
    CREATE INDEX IF NOT EXISTS idx_feature_track ON track_feature(track_id);
";

pub const CREATE_VIEWS: &str = "
    CREATE VIEW IF NOT EXISTS vw_top_songs_duration AS
    SELECT artist_name, song_name, duration_ms, rank
    FROM (
        SELECT
            a.artist_name,
            c.song_name,
            MAX(c.duration_ms) AS duration_ms,
            RANK() OVER (PARTITION BY a.artist_name ORDER BY MAX(c.duration_ms) DESC) AS rank
        FROM artist a
        JOIN album b ON a.artist_id = b.artist_id
        JOIN track c ON b.album_id = c.album_id
        GROUP BY a.artist_name, c.song_name
    )
    WHERE rank <= 10
    ORDER BY artist_name, duration_ms DESC;

    CREATE VIEW IF NOT EXISTS vw_top_artists AS
    SELECT
        artist_id,
        artist_name,
        followers,
        RANK() OVER (ORDER BY followers DESC) AS rank
    FROM artist
    ORDER BY followers DESC
    LIMIT 20;

    CREATE VIEW IF NOT EXISTS vw_top_songs_tempo AS
    SELECT artist_name, song_name, tempo, rank
    FROM (
        SELECT
            a.artist_name,
            c.song_name,
            MAX(d.tempo) AS tempo,
            RANK() OVER (PARTITION BY a.artist_name ORDER BY MAX(d.tempo) DESC) AS rank
        FROM artist a
        JOIN album b ON a.artist_id = b.artist_id
        JOIN track c ON b.album_id = c.album_id
        JOIN track_feature d ON c.track_id = d.track_id
        GROUP BY a.artist_name, c.song_name
    )
    WHERE rank <= 10
    ORDER BY artist_name, tempo DESC;

    CREATE VIEW IF NOT EXISTS vw_artist_summary AS
    SELECT
        a.artist_id,
        a.artist_name,
        COUNT(DISTINCT b.album_id) AS album_count,
        COUNT(DISTINCT c.track_id) AS song_count,
        ROUND(AVG(c.duration_ms), 2) AS avg_song_duration_ms,
        ROUND(AVG(d.tempo), 2) AS avg_tempo,
        ROUND(AVG(d.danceability), 2) AS avg_danceability,
        ROUND(AVG(d.energy), 2) AS avg_energy
    FROM artist a
    JOIN album b ON a.artist_id = b.artist_id
    JOIN track c ON b.album_id = c.album_id
    JOIN track_feature d ON c.track_id = d.track_id
    GROUP BY a.artist_id, a.artist_name
    ORDER BY a.artist_id;

    CREATE VIEW IF NOT EXISTS vw_album_summary AS
    SELECT
        a.artist_id,
        b.album_id,
        a.artist_name,
        b.album_name,
        COUNT(DISTINCT c.track_id) AS song_count,
        ROUND(AVG(c.duration_ms), 2) AS avg_song_duration_ms,
        ROUND(AVG(d.tempo), 2) AS avg_tempo,
        ROUND(AVG(d.danceability), 2) AS avg_danceability,
        ROUND(AVG(d.energy), 2) AS avg_energy
    FROM artist a
    JOIN album b ON a.artist_id = b.artist_id
    JOIN track c ON b.album_id = c.album_id
    JOIN track_feature d ON c.track_id = d.track_id
    GROUP BY a.artist_id, b.album_id, a.artist_name, b.album_name
    ORDER BY a.artist_id;
";
