//! The four-stage pipeline: artist → album → track → track feature.
//!
//! Each stage extracts raw records for its seed list, transforms them into
//! rows, appends the rows to its table, and hands the loaded keys to the
//! next stage as its seed list. Seeding from loaded rows keeps every
//! album/track/feature pointing at a parent stored in the same run.

pub mod extract;
pub mod transform;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::api::Gateway;
use crate::config::{AppConfig, MAX_FEATURE_BATCH, MAX_PAGE_SIZE};
use crate::db::models::TableRow;
use crate::db::Database;
use extract::Extracted;
use transform::{ExplicitPolicy, Transformed};

/// Knobs for one pipeline run.
#[derive(Debug, Clone)]
pub struct EtlOptions {
    pub page_size: usize,
    /// 0 = follow pagination until exhausted.
    pub max_pages: usize,
    pub feature_batch_size: usize,
    pub workers: usize,
    pub dedupe_albums: bool,
    pub explicit: ExplicitPolicy,
    pub show_progress: bool,
}

impl Default for EtlOptions {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            max_pages: 1,
            feature_batch_size: 1,
            workers: 1,
            dedupe_albums: false,
            explicit: ExplicitPolicy::Standard,
            show_progress: true,
        }
    }
}

impl EtlOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            page_size: config.spotify.page_size.clamp(1, MAX_PAGE_SIZE),
            max_pages: config.spotify.max_pages,
            feature_batch_size: config.spotify.feature_batch_size.clamp(1, MAX_FEATURE_BATCH),
            workers: config.workers.max(1),
            dedupe_albums: config.etl.dedupe_albums,
            explicit: if config.etl.legacy_explicit {
                ExplicitPolicy::Legacy
            } else {
                ExplicitPolicy::Standard
            },
            show_progress: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Artist,
    Album,
    Track,
    TrackFeature,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Artist => "artist",
            Self::Album => "album",
            Self::Track => "track",
            Self::TrackFeature => "track_feature",
        })
    }
}

/// What happened in one stage.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    pub seeds: usize,
    pub extracted: usize,
    pub loaded: usize,
    /// Seeds the upstream had nothing for.
    pub skipped_empty: usize,
    /// Records dropped by the transformer.
    pub skipped_malformed: usize,
    /// Rows removed by the optional album dedup.
    pub deduplicated: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub stages: Vec<StageReport>,
}

impl RunReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}

/// Run all four stages in order. Gateway and store failures abort the run;
/// empty lookups and malformed records are skipped and counted.
pub fn run_pipeline<G: Gateway + ?Sized>(
    gateway: &G,
    db: &Database,
    artist_names: &[String],
    opts: &EtlOptions,
) -> Result<RunReport> {
    let mut report = RunReport::default();

    // Artists
    let started = Instant::now();
    let raw = extract::extract_artists(gateway, artist_names, opts)?;
    let artists = transform::transform_artists(&raw.records);
    let (artist_ids, stage) = load_stage(db, Stage::Artist, artist_names.len(), &raw, artists, 0, started)?;
    report.stages.push(stage);

    // Albums
    let started = Instant::now();
    let raw = extract::extract_albums(gateway, &artist_ids, opts)?;
    let mut albums = transform::transform_albums(&raw.records);
    let mut removed = 0;
    if opts.dedupe_albums {
        let (kept, n) = transform::dedupe_albums(albums.rows);
        albums.rows = kept;
        removed = n;
    }
    let (album_ids, stage) = load_stage(db, Stage::Album, artist_ids.len(), &raw, albums, removed, started)?;
    report.stages.push(stage);

    // Tracks
    let started = Instant::now();
    let raw = extract::extract_tracks(gateway, &album_ids, opts)?;
    let tracks = transform::transform_tracks(&raw.records, opts.explicit);
    let (track_ids, stage) = load_stage(db, Stage::Track, album_ids.len(), &raw, tracks, 0, started)?;
    report.stages.push(stage);

    // Track features
    let started = Instant::now();
    let raw = extract::extract_features(gateway, &track_ids, opts)?;
    let features = transform::transform_features(&raw.records);
    let (_, stage) = load_stage(db, Stage::TrackFeature, track_ids.len(), &raw, features, 0, started)?;
    report.stages.push(stage);

    Ok(report)
}

/// Append a stage's rows and return the loaded keys with the stage report.
fn load_stage<R: TableRow>(
    db: &Database,
    stage: Stage,
    seeds: usize,
    raw: &Extracted,
    transformed: Transformed<R>,
    deduplicated: usize,
    started: Instant,
) -> Result<(Vec<String>, StageReport)> {
    let loaded = db
        .append_rows(&transformed.rows)
        .with_context(|| format!("Failed to load {stage} rows"))?;
    let keys = transformed.rows.iter().map(|r| r.key().to_string()).collect();

    let report = StageReport {
        stage,
        seeds,
        extracted: raw.records.len(),
        loaded,
        skipped_empty: raw.empty_seeds.len(),
        skipped_malformed: transformed.skipped,
        deduplicated,
        elapsed: started.elapsed(),
    };

    log::info!(
        "{stage}: {} seeds, {} extracted, {} loaded, {} empty, {} malformed, {} deduplicated",
        report.seeds,
        report.extracted,
        report.loaded,
        report.skipped_empty,
        report.skipped_malformed,
        report.deduplicated
    );

    Ok((keys, report))
}

/// Progress bar for one extraction pass. Hidden when progress is off.
pub(crate) fn stage_progress(len: usize, unit: &str, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template(&format!(
        "{{spinner:.green}} [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {unit} ({{eta}} remaining)"
    )) {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb
}
