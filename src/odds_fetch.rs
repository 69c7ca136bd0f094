use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::{env_bool, env_string};
use crate::error::OracleError;
use crate::game::{GameContext, Side};
use crate::http_client::get_text;
use crate::persist::{file_age, write_atomic};
use crate::retry::{RetryPolicy, with_retry};

const ODDS_URL: &str = "https://api.the-odds-api.com/v4/sports/baseball_mlb/odds";
const DEFAULT_TIME_TOLERANCE_MIN: i64 = 90;
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone)]
pub struct OddsFetchConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub regions: String,
    pub cache_path: PathBuf,
    pub cache_ttl: Duration,
    pub time_tolerance_secs: i64,
}

impl OddsFetchConfig {
    pub fn from_env() -> Self {
        let enabled = env_bool("ODDS_ENABLED", true);
        let api_key = env_string("ODDS_API_KEY");
        let regions = env::var("ODDS_REGIONS")
            .unwrap_or_else(|_| "us".to_string())
            .trim()
            .to_ascii_lowercase();
        let cache_path = env_string("ODDS_CACHE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/todays_odds.json"));
        let cache_ttl_secs = env::var("ODDS_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_CACHE_TTL_SECS)
            .clamp(60, 24 * 3600);
        let time_tolerance_min = env::var("ODDS_MATCH_TIME_TOLERANCE_MIN")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_TIME_TOLERANCE_MIN)
            .clamp(5, 360);

        Self {
            enabled,
            api_key,
            regions,
            cache_path,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            time_tolerance_secs: time_tolerance_min * 60,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OddsEvent {
    commence_time: Option<String>,
    home_team: String,
    away_team: String,
    #[serde(default)]
    bookmakers: Vec<OddsBookmaker>,
}

#[derive(Debug, Deserialize)]
struct OddsBookmaker {
    #[serde(default)]
    title: String,
    #[serde(default)]
    markets: Vec<OddsMarket>,
}

#[derive(Debug, Deserialize)]
struct OddsMarket {
    key: String,
    #[serde(default)]
    outcomes: Vec<OddsOutcome>,
}

#[derive(Debug, Deserialize)]
struct OddsOutcome {
    name: String,
    price: f64,
}

/// An American moneyline price and the book offering it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamOdds {
    pub price: i32,
    pub bookmaker: String,
}

/// `+150` for underdogs, `-120` for favourites.
pub fn format_american(price: i32) -> String {
    if price > 0 {
        format!("+{price}")
    } else {
        price.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameOdds {
    pub home_team: String,
    pub away_team: String,
    pub commence_time: Option<DateTime<Utc>>,
    pub home: Option<TeamOdds>,
    pub away: Option<TeamOdds>,
    pub favorite: Option<String>,
}

impl GameOdds {
    pub fn side(&self, side: Side) -> Option<&TeamOdds> {
        match side {
            Side::Home => self.home.as_ref(),
            Side::Away => self.away.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OddsSnapshot {
    pub retrieved_at: DateTime<Utc>,
    pub games: Vec<GameOdds>,
}

impl OddsSnapshot {
    /// The event for `game`: both team names must agree, and among those the
    /// nearest commence time within `tolerance_secs` wins (doubleheaders).
    pub fn for_game(&self, game: &GameContext, tolerance_secs: i64) -> Option<&GameOdds> {
        let game_ts = game.datetime.map(|dt| dt.timestamp());
        let mut best: Option<(&GameOdds, i64)> = None;
        for odds in &self.games {
            if !same_team(&odds.home_team, &game.home.name)
                || !same_team(&odds.away_team, &game.away.name)
            {
                continue;
            }
            let score = match (game_ts, odds.commence_time.map(|dt| dt.timestamp())) {
                (Some(g), Some(o)) => {
                    let diff = (g - o).abs();
                    if diff > tolerance_secs {
                        continue;
                    }
                    diff
                }
                _ => tolerance_secs / 2,
            };
            if let Some((_, best_score)) = best
                && score >= best_score
            {
                continue;
            }
            best = Some((odds, score));
        }
        best.map(|(odds, _)| odds)
    }
}

pub trait OddsSource: Send + Sync {
    /// Today's moneylines. Any failure is `StaleCache`: callers carry on
    /// without odds.
    fn todays_odds(&self) -> std::result::Result<OddsSnapshot, OracleError>;
}

/// Used when odds are disabled or no API key is configured.
#[derive(Debug, Default)]
pub struct NoOdds;

impl OddsSource for NoOdds {
    fn todays_odds(&self) -> std::result::Result<OddsSnapshot, OracleError> {
        Err(OracleError::StaleCache("odds disabled".to_string()))
    }
}

pub struct TheOddsApi {
    cfg: OddsFetchConfig,
    retry: RetryPolicy,
}

impl TheOddsApi {
    pub fn new(cfg: OddsFetchConfig, retry: RetryPolicy) -> Self {
        Self { cfg, retry }
    }

    fn cached(&self) -> Option<(String, DateTime<Utc>)> {
        let age = file_age(&self.cfg.cache_path)?;
        if age >= self.cfg.cache_ttl {
            debug!(path = %self.cfg.cache_path.display(), ?age, "odds cache expired");
            return None;
        }
        let raw = fs::read_to_string(&self.cfg.cache_path).ok()?;
        let age = chrono::Duration::from_std(age).ok()?;
        debug!(path = %self.cfg.cache_path.display(), "odds cache hit");
        Some((raw, Utc::now() - age))
    }

    fn fetch(&self, api_key: &str) -> std::result::Result<String, OracleError> {
        with_retry(&self.retry, "odds", || {
            get_text(
                ODDS_URL,
                &[
                    ("apiKey", api_key),
                    ("regions", self.cfg.regions.as_str()),
                    ("markets", "h2h"),
                    ("oddsFormat", "american"),
                    ("dateFormat", "iso"),
                ],
            )
        })
    }
}

impl OddsSource for TheOddsApi {
    fn todays_odds(&self) -> std::result::Result<OddsSnapshot, OracleError> {
        if !self.cfg.enabled {
            return NoOdds.todays_odds();
        }
        let (raw, retrieved_at) = match self.cached() {
            Some(hit) => hit,
            None => {
                let Some(api_key) = self.cfg.api_key.as_deref() else {
                    return Err(OracleError::StaleCache("ODDS_API_KEY missing".to_string()));
                };
                let raw = self
                    .fetch(api_key)
                    .map_err(|err| OracleError::StaleCache(err.to_string()))?;
                if let Err(err) = write_atomic(&self.cfg.cache_path, raw.as_bytes()) {
                    warn!("failed caching odds: {err:#}");
                }
                info!("fetched fresh odds");
                (raw, Utc::now())
            }
        };
        parse_odds_json(&raw, retrieved_at)
            .map_err(|err| OracleError::StaleCache(format!("{err:#}")))
    }
}

pub fn parse_odds_json(raw: &str, retrieved_at: DateTime<Utc>) -> Result<OddsSnapshot> {
    let events: Vec<OddsEvent> = serde_json::from_str(raw).context("invalid odds json")?;
    let games = events.iter().map(event_to_odds).collect();
    Ok(OddsSnapshot {
        retrieved_at,
        games,
    })
}

fn event_to_odds(event: &OddsEvent) -> GameOdds {
    let mut best: HashMap<String, TeamOdds> = HashMap::new();
    for bookmaker in &event.bookmakers {
        for market in bookmaker
            .markets
            .iter()
            .filter(|m| m.key.eq_ignore_ascii_case("h2h"))
        {
            for outcome in &market.outcomes {
                if !outcome.price.is_finite() {
                    continue;
                }
                let price = outcome.price.round() as i32;
                let entry = best.entry(outcome.name.clone()).or_insert_with(|| TeamOdds {
                    price,
                    bookmaker: bookmaker.title.clone(),
                });
                if price > entry.price {
                    entry.price = price;
                    entry.bookmaker = bookmaker.title.clone();
                }
            }
        }
    }

    let take = |team: &str| {
        best.iter()
            .find(|(name, _)| same_team(name, team))
            .map(|(_, odds)| odds.clone())
    };

    GameOdds {
        home_team: event.home_team.clone(),
        away_team: event.away_team.clone(),
        commence_time: event.commence_time.as_deref().and_then(parse_timestamp),
        home: take(&event.home_team),
        away: take(&event.away_team),
        favorite: favorite(event),
    }
}

/// Lowest price at the first listed bookmaker.
fn favorite(event: &OddsEvent) -> Option<String> {
    let market = event.bookmakers.first()?.markets.first()?;
    market
        .outcomes
        .iter()
        .filter(|o| o.price.is_finite())
        .min_by(|a, b| a.price.total_cmp(&b.price))
        .map(|o| o.name.clone())
}

/// Names agree when one collapsed form ends with the other, so
/// "Athletics" matches "Oakland Athletics" but "Red Sox" never matches
/// "White Sox".
pub fn same_team(a: &str, b: &str) -> bool {
    let a = canonical_words(a).join("");
    let b = canonical_words(b).join("");
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.ends_with(&b) || b.ends_with(&a)
}

fn canonical_words(name: &str) -> Vec<String> {
    let mut cleaned = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
        } else {
            cleaned.push(' ');
        }
    }
    cleaned.split_whitespace().map(str::to_string).collect()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    None
}
