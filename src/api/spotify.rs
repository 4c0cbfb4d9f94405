use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;
use ureq::Agent;

use super::{ApiError, Gateway, Page};
use crate::config::SpotifyConfig;

const API_BASE: &str = "https://api.spotify.com/v1";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Refresh the token this long before Spotify says it expires.
/// Short-lived tokens use half their lifetime instead.
const TOKEN_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct AccessToken {
    value: String,
    refresh_at: Instant,
}

/// Spotify Web API client using the client-credentials flow.
pub struct SpotifyClient {
    agent: Agent,
    client_id: String,
    client_secret: String,
    market: String,
    /// Minimum gap between requests, shared by every worker using this client.
    rate_limit: Duration,
    last_request: Mutex<Option<Instant>>,
    token: Mutex<Option<AccessToken>>,
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String, market: String, rate_limit_ms: u64) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(30)))
            .build()
            .into();

        Self {
            agent,
            client_id,
            client_secret,
            market,
            rate_limit: Duration::from_millis(rate_limit_ms),
            last_request: Mutex::new(None),
            token: Mutex::new(None),
        }
    }

    pub fn from_config(config: &SpotifyConfig) -> Result<Self, ApiError> {
        let (id, secret) = config.credentials().ok_or(ApiError::MissingCredentials)?;
        Ok(Self::new(id, secret, config.market.clone(), config.rate_limit_ms))
    }

    /// Current bearer token, fetching a new one when missing or about to expire.
    fn bearer(&self) -> Result<String, ApiError> {
        let mut guard = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = guard.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.request_token()?;
        let value = fresh.value.clone();
        *guard = Some(fresh);
        Ok(value)
    }

    fn request_token(&self) -> Result<AccessToken, ApiError> {
        log::debug!("Requesting Spotify access token");

        let resp: TokenResponse = self
            .agent
            .post(TOKEN_URL)
            .send_form([
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .map_err(|e| http_error(TOKEN_URL, e))?
            .body_mut()
            .read_json()
            .map_err(|e| decode_error(TOKEN_URL, e))?;

        let lifetime = Duration::from_secs(resp.expires_in);
        Ok(AccessToken {
            value: resp.access_token,
            refresh_at: Instant::now() + lifetime - refresh_margin(lifetime),
        })
    }

    /// Block until `rate_limit` has passed since the previous request.
    /// The lock is held while sleeping so parallel workers queue up.
    fn pace(&self) {
        if self.rate_limit.is_zero() {
            return;
        }
        let mut last = self.last_request.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(prev) = *last {
            let wait = (prev + self.rate_limit).saturating_duration_since(Instant::now());
            if !wait.is_zero() {
                thread::sleep(wait);
            }
        }
        *last = Some(Instant::now());
    }

    fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        self.pace();

        let url = format!("{API_BASE}{path}");
        let token = self.bearer()?;
        log::debug!("GET {url} {query:?}");

        let mut req = self
            .agent
            .get(&url)
            .header("Authorization", format!("Bearer {token}"));
        for (key, value) in query {
            req = req.query(*key, value.as_str());
        }

        req.call()
            .map_err(|e| http_error(&url, e))?
            .body_mut()
            .read_json::<Value>()
            .map_err(|e| decode_error(&url, e))
    }
}

impl Gateway for SpotifyClient {
    fn search_artist(&self, name: &str, limit: usize) -> Result<Vec<Value>, ApiError> {
        let body = self.get_json(
            "/search",
            &[
                ("q", name.to_string()),
                ("type", "artist".to_string()),
                ("limit", limit.to_string()),
                ("offset", "0".to_string()),
            ],
        )?;
        items_at(&body, "/artists/items", "/search")
    }

    fn artist_albums(&self, artist_id: &str, limit: usize, offset: usize) -> Result<Page, ApiError> {
        let path = format!("/artists/{artist_id}/albums");
        let body = self.get_json(
            &path,
            &[
                ("include_groups", "album".to_string()),
                ("market", self.market.clone()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ],
        )?;
        page_from(&body, &path)
    }

    fn album_tracks(&self, album_id: &str, limit: usize, offset: usize) -> Result<Page, ApiError> {
        let path = format!("/albums/{album_id}/tracks");
        let body = self.get_json(
            &path,
            &[
                ("market", self.market.clone()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ],
        )?;
        page_from(&body, &path)
    }

    fn audio_features(&self, track_ids: &[String]) -> Result<Vec<Value>, ApiError> {
        if track_ids.is_empty() {
            return Ok(Vec::new());
        }
        let body = self.get_json("/audio-features", &[("ids", track_ids.join(","))])?;
        items_at(&body, "/audio_features", "/audio-features")
    }
}

fn refresh_margin(lifetime: Duration) -> Duration {
    TOKEN_MARGIN.min(lifetime / 2)
}

fn http_error(url: &str, err: ureq::Error) -> ApiError {
    match err {
        ureq::Error::StatusCode(status) => ApiError::Status {
            status,
            url: url.to_string(),
        },
        other => ApiError::Transport {
            url: url.to_string(),
            message: other.to_string(),
        },
    }
}

fn decode_error(url: &str, err: ureq::Error) -> ApiError {
    ApiError::Decode {
        url: url.to_string(),
        message: err.to_string(),
    }
}

/// Pull the record array at `pointer` out of a response body.
fn items_at(body: &Value, pointer: &str, path: &str) -> Result<Vec<Value>, ApiError> {
    body.pointer(pointer)
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| ApiError::Decode {
            url: path.to_string(),
            message: format!("no array at {pointer}"),
        })
}

/// Parse a Spotify paging object (`items` + `next`).
fn page_from(body: &Value, path: &str) -> Result<Page, ApiError> {
    let items = items_at(body, "/items", path)?;
    let has_more = body.get("next").is_some_and(Value::is_string);
    Ok(Page { items, has_more })
}
