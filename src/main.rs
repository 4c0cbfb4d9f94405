use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use spotify_etl::api::SpotifyClient;
use spotify_etl::db::models::ViewTable;
use spotify_etl::etl::transform::ExplicitPolicy;
use spotify_etl::etl::{EtlOptions, RunReport};

#[derive(Parser)]
#[command(name = "spotify-etl", version, about = "Load Spotify artists, albums, tracks and audio features into SQLite")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ViewName {
    TopSongsDuration,
    TopArtists,
    TopSongsTempo,
    ArtistSummary,
    AlbumSummary,
}

impl ViewName {
    fn view(&self) -> &'static str {
        match self {
            Self::TopSongsDuration => "vw_top_songs_duration",
            Self::TopArtists => "vw_top_artists",
            Self::TopSongsTempo => "vw_top_songs_tempo",
            Self::ArtistSummary => "vw_artist_summary",
            Self::AlbumSummary => "vw_album_summary",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Drop and recreate all tables and views
    Init,

    /// Reset the database and load artists, albums, tracks and audio features
    Run {
        /// Artist names to seed the run (defaults to config file artists)
        artists: Vec<String>,

        /// Keep existing rows instead of resetting the schema first (rows are appended)
        #[arg(long)]
        no_reset: bool,

        /// Drop albums repeating name, release date, track count and artist
        #[arg(long)]
        dedupe_albums: bool,

        /// Treat every explicit value except the string "FALSE" as explicit
        #[arg(long)]
        legacy_explicit: bool,

        /// Pages per album/track listing (0 = all pages)
        #[arg(long)]
        max_pages: Option<usize>,

        /// Parallel fetch workers per stage (0 = from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,
    },

    /// Print rows of an analytical view
    View {
        #[arg(value_enum)]
        name: ViewName,

        /// Number of rows
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },

    /// Show row counts per table
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let config = spotify_etl::config::AppConfig::load();

    // Resolve database path: CLI > config > XDG default
    let db_path = cli.db_path
        .or(config.db_path.clone())
        .unwrap_or_else(spotify_etl::config::default_db_path);
    log::info!("Database: {}", db_path.display());

    let db = spotify_etl::db::Database::open(&db_path)
        .context("Failed to open database")?;

    match cli.command {
        Commands::Init => {
            let start = Instant::now();
            db.reset().context("Schema reset failed")?;
            println!("Database created ({} ms).", start.elapsed().as_millis());
        }

        Commands::Run { artists, no_reset, dedupe_albums, legacy_explicit, max_pages, jobs } => {
            let names = if !artists.is_empty() {
                artists
            } else if !config.artists.is_empty() {
                config.artists.clone()
            } else {
                anyhow::bail!("No artists to load. Pass names as arguments or set artists in config.");
            };

            let mut opts = EtlOptions::from_config(&config);
            if dedupe_albums {
                opts.dedupe_albums = true;
            }
            if legacy_explicit {
                opts.explicit = ExplicitPolicy::Legacy;
            }
            if let Some(pages) = max_pages {
                opts.max_pages = pages;
            }
            if jobs > 0 {
                opts.workers = jobs;
            }

            // Build the client before touching the schema so missing credentials don't wipe data
            let client = SpotifyClient::from_config(&config.spotify)
                .context("Cannot create Spotify client")?;

            if !no_reset {
                println!("Creating database...");
                let start = Instant::now();
                db.reset().context("Schema reset failed")?;
                println!("Database created ({} ms).", start.elapsed().as_millis());
                println!();
            }

            println!("Running ETL process for {} artists...", names.len());
            let start = Instant::now();
            let report = spotify_etl::etl::run_pipeline(&client, &db, &names, &opts)
                .context("ETL run failed")?;
            print_run_report(&report);
            println!();
            println!("ETL process complete ({} sec).", start.elapsed().as_secs());
        }

        Commands::View { name, limit } => {
            let table = db.query_view(name.view(), limit).context("Query failed")?;
            if table.rows.is_empty() {
                println!("No rows in {}. Run `spotify-etl run` first.", name.view());
                return Ok(());
            }
            println!("{}:", name.view());
            println!();
            print_view_table(&table);
        }

        Commands::Stats => {
            let stats = db.stats().context("Failed to get stats")?;
            println!("Database Statistics");
            println!("===================");
            println!("Artists:        {}", stats.artists);
            println!("Albums:         {}", stats.albums);
            println!("Tracks:         {}", stats.tracks);
            println!("Track features: {}", stats.track_features);
        }
    }

    Ok(())
}

/// Print the per-stage summary of a run.
fn print_run_report(report: &RunReport) {
    println!(
        "{:<14} {:>6} {:>9} {:>7} {:>6} {:>9} {:>6} {:>8}",
        "Stage", "Seeds", "Extracted", "Loaded", "Empty", "Malformed", "Dedup", "Secs"
    );
    println!("{}", "-".repeat(72));

    for s in &report.stages {
        println!(
            "{:<14} {:>6} {:>9} {:>7} {:>6} {:>9} {:>6} {:>8.1}",
            s.stage.to_string(),
            s.seeds,
            s.extracted,
            s.loaded,
            s.skipped_empty,
            s.skipped_malformed,
            s.deduplicated,
            s.elapsed.as_secs_f64(),
        );
    }

    println!();
    println!("Empty = seeds with no upstream results  Malformed = records skipped by transform");
}

/// Print view rows in aligned columns, truncating long cells.
fn print_view_table(table: &ViewTable) {
    const MAX_WIDTH: usize = 30;

    let widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            table
                .rows
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(col.chars().count()))
                .max()
                .unwrap_or(0)
                .min(MAX_WIDTH)
        })
        .collect();

    let render = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| {
                let text: String = if cell.chars().count() > w {
                    let cut: String = cell.chars().take(w.saturating_sub(3)).collect();
                    format!("{cut}...")
                } else {
                    cell.clone()
                };
                format!("{text:<w$}")
            })
            .collect::<Vec<_>>()
            .join("  ")
    };

    println!("{}", render(&table.columns));
    println!("{}", "-".repeat(widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1)));
    for row in &table.rows {
        println!("{}", render(row));
    }
}
