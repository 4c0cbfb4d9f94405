pub mod api;
pub mod config;
pub mod db;
pub mod etl;

/// Application name for XDG paths
pub const APP_NAME: &str = "spotify-etl";
