use super::models::{ArtistSummary, TableRow, TableStats, ViewTable};
use super::{schema, Database, DbError, Result};
use rusqlite::params;
use rusqlite::types::ValueRef;

impl Database {
    /// Append a batch of rows to their table. Returns the number of rows written.
    ///
    /// The whole batch runs in one transaction: it is committed when every row
    /// is in, and rolled back when the guard drops on any error path.
    pub fn append_rows<R: TableRow>(&self, rows: &[R]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let placeholders = (1..=R::COLUMNS.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            R::TABLE,
            R::COLUMNS.join(", ")
        );

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for row in rows {
                stmt.execute(row.values().as_slice())?;
            }
        }
        tx.commit()?;

        log::debug!("Appended {} rows to {}", rows.len(), R::TABLE);
        Ok(rows.len())
    }

    /// Number of rows in one of the entity tables.
    pub fn count_rows(&self, table: &str) -> Result<i64> {
        let table = known_table(table)?;
        let n = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
        Ok(n)
    }

    /// Column names of an entity table, in declaration order.
    pub fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let table = known_table(table)?;
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({table})"))?;
        let cols = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cols)
    }

    pub fn stats(&self) -> Result<TableStats> {
        Ok(TableStats {
            artists: self.count_rows("artist")?,
            albums: self.count_rows("album")?,
            tracks: self.count_rows("track")?,
            track_features: self.count_rows("track_feature")?,
        })
    }

    /// Read `vw_artist_summary`.
    pub fn artist_summary(&self) -> Result<Vec<ArtistSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT artist_id, artist_name, album_count, song_count,
                    avg_song_duration_ms, avg_tempo, avg_danceability, avg_energy
             FROM vw_artist_summary",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(ArtistSummary {
                    artist_id: row.get(0)?,
                    artist_name: row.get(1)?,
                    album_count: row.get(2)?,
                    song_count: row.get(3)?,
                    avg_song_duration_ms: row.get(4)?,
                    avg_tempo: row.get(5)?,
                    avg_danceability: row.get(6)?,
                    avg_energy: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Read up to `limit` rows of an analytical view as display strings.
    pub fn query_view(&self, view: &str, limit: usize) -> Result<ViewTable> {
        let view = schema::VIEWS
            .iter()
            .find(|v| **v == view)
            .ok_or_else(|| DbError::UnknownView(view.to_string()))?;

        let mut stmt = self.conn.prepare(&format!("SELECT * FROM {view} LIMIT ?1"))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(render_value))
                    .collect::<std::result::Result<Vec<_>, _>>()
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(ViewTable { columns, rows })
    }
}

fn known_table(table: &str) -> Result<&'static str> {
    schema::TABLES
        .iter()
        .copied()
        .find(|t| *t == table)
        .ok_or_else(|| DbError::UnknownTable(table.to_string()))
}

fn render_value(v: ValueRef<'_>) -> String {
    match v {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => format!("{f:.2}"),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}
