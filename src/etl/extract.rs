//! Extractors: one gateway call (or page run) per seed id, results concatenated in seed order.

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde_json::Value;

use super::{stage_progress, EtlOptions};
use crate::api::{ApiError, Gateway, Page};

/// Raw records from one extraction pass.
#[derive(Debug, Default)]
pub struct Extracted {
    pub records: Vec<Value>,
    /// Seeds for which the upstream returned nothing.
    pub empty_seeds: Vec<String>,
}

impl Extracted {
    fn from_batches(seeds: &[String], batches: Vec<Vec<Value>>, entity: &str) -> Self {
        let mut out = Extracted::default();
        for (seed, batch) in seeds.iter().zip(batches) {
            if batch.is_empty() {
                log::warn!("No {entity} found for {seed:?}");
                out.empty_seeds.push(seed.clone());
            }
            out.records.extend(batch);
        }
        out
    }
}

/// Top-1 artist search per name.
pub fn extract_artists<G: Gateway + ?Sized>(
    gateway: &G,
    names: &[String],
    opts: &EtlOptions,
) -> Result<Extracted> {
    let pb = stage_progress(names.len(), "artists", opts.show_progress);
    let batches = fetch_each(names, opts.workers, &pb, |name| {
        let mut hits = gateway.search_artist(name, 1)?;
        hits.truncate(1);
        Ok(hits)
    })
    .context("Artist search failed")?;
    pb.finish_and_clear();

    Ok(Extracted::from_batches(names, batches, "artist"))
}

/// Albums per artist id, up to `max_pages` pages each.
pub fn extract_albums<G: Gateway + ?Sized>(
    gateway: &G,
    artist_ids: &[String],
    opts: &EtlOptions,
) -> Result<Extracted> {
    let pb = stage_progress(artist_ids.len(), "artists", opts.show_progress);
    let batches = fetch_each(artist_ids, opts.workers, &pb, |id| {
        fetch_pages(opts, |limit, offset| gateway.artist_albums(id, limit, offset))
    })
    .context("Album listing failed")?;
    pb.finish_and_clear();

    Ok(Extracted::from_batches(artist_ids, batches, "albums"))
}

/// Tracks per album id, each stamped with its parent `album_id`.
pub fn extract_tracks<G: Gateway + ?Sized>(
    gateway: &G,
    album_ids: &[String],
    opts: &EtlOptions,
) -> Result<Extracted> {
    let pb = stage_progress(album_ids.len(), "albums", opts.show_progress);
    let batches = fetch_each(album_ids, opts.workers, &pb, |id| {
        let mut tracks = fetch_pages(opts, |limit, offset| gateway.album_tracks(id, limit, offset))?;
        for track in &mut tracks {
            stamp_album_id(track, id);
        }
        Ok(tracks)
    })
    .context("Track listing failed")?;
    pb.finish_and_clear();

    Ok(Extracted::from_batches(album_ids, batches, "tracks"))
}

/// Audio features, `feature_batch_size` track ids per call.
/// `null` entries (tracks Spotify has no analysis for) count as empty seeds.
pub fn extract_features<G: Gateway + ?Sized>(
    gateway: &G,
    track_ids: &[String],
    opts: &EtlOptions,
) -> Result<Extracted> {
    let chunks: Vec<Vec<String>> = track_ids
        .chunks(opts.feature_batch_size.max(1))
        .map(<[String]>::to_vec)
        .collect();

    let pb = stage_progress(chunks.len(), "batches", opts.show_progress);
    let batches = fetch_each(&chunks, opts.workers, &pb, |ids| gateway.audio_features(ids))
        .context("Audio feature lookup failed")?;
    pb.finish_and_clear();

    let mut out = Extracted::default();
    for (ids, features) in chunks.iter().zip(batches) {
        let mut features = features.into_iter();
        for id in ids {
            match features.next() {
                Some(f) if !f.is_null() => out.records.push(f),
                _ => {
                    log::warn!("No audio features for track {id}");
                    out.empty_seeds.push(id.clone());
                }
            }
        }
    }
    Ok(out)
}

/// Run `fetch` for every seed, in order. With more than one worker the
/// calls run on a bounded rayon pool; output order still follows `seeds`.
fn fetch_each<S, T, F>(seeds: &[S], workers: usize, pb: &ProgressBar, fetch: F) -> Result<Vec<T>>
where
    S: Sync,
    T: Send,
    F: Fn(&S) -> std::result::Result<T, ApiError> + Sync,
{
    let run = |seed: &S| {
        let result = fetch(seed);
        pb.inc(1);
        result
    };

    if workers <= 1 {
        return Ok(seeds.iter().map(run).collect::<std::result::Result<Vec<_>, _>>()?);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .context("Failed to build fetch worker pool")?;

    let results = pool.install(|| {
        seeds
            .par_iter()
            .map(run)
            .collect::<std::result::Result<Vec<_>, _>>()
    })?;
    Ok(results)
}

/// Follow a paginated listing from offset 0.
///
/// Stops when the upstream has no more items or after `max_pages` pages
/// (0 = no cap).
fn fetch_pages<F>(opts: &EtlOptions, mut fetch: F) -> std::result::Result<Vec<Value>, ApiError>
where
    F: FnMut(usize, usize) -> std::result::Result<Page, ApiError>,
{
    let mut items = Vec::new();
    let mut offset = 0;
    let mut pages = 0;

    loop {
        let page = fetch(opts.page_size, offset)?;
        pages += 1;
        let n = page.items.len();
        items.extend(page.items);

        if !page.has_more || n == 0 {
            break;
        }
        if opts.max_pages != 0 && pages >= opts.max_pages {
            log::debug!("Page cap ({}) reached at {} items, more available", opts.max_pages, items.len());
            break;
        }
        offset += n;
    }

    Ok(items)
}

/// Album track listings don't carry the album id, so record it on each track.
fn stamp_album_id(track: &mut Value, album_id: &str) {
    if let Value::Object(map) = track {
        map.insert("album_id".to_string(), Value::String(album_id.to_string()));
    }
}
