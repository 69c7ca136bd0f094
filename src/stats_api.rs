use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{OracleError, Result};
use crate::game::{GameContext, GameStatus, TeamRef};
use crate::http_client::get_text;
use crate::ids::TeamIdentity;
use crate::retry::{RetryPolicy, with_retry};
use crate::standings::{DivisionStandingsSnapshot, TeamRecord};

pub const STATS_API_BASE: &str = "https://statsapi.mlb.com/api/v1";
const SCHEDULE_HYDRATE: &str = "probablePitcher,decisions,broadcasts(all),seriesStatus,venue";

/// Team batting and pitching totals for one game, from that team's side of
/// the boxscore.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TeamBoxStats {
    pub runs: Option<f64>,
    pub hits: Option<f64>,
    pub rbi: Option<f64>,
    pub ops: Option<f64>,
    pub avg: Option<f64>,
    pub runs_allowed: Option<f64>,
    pub hits_allowed: Option<f64>,
    pub strikeouts: Option<f64>,
    pub obp_allowed: Option<f64>,
}

/// The pitching stat line the starter fragment reads, whether it came from a
/// single season or the career aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PitchingLine {
    pub era: Option<f64>,
    pub avg: Option<f64>,
    pub runs_per9: Option<f64>,
    pub whip: Option<f64>,
    pub strike_percentage: Option<f64>,
    pub win_percentage: Option<f64>,
}

impl PitchingLine {
    pub fn is_empty(&self) -> bool {
        self.era.is_none()
            && self.avg.is_none()
            && self.runs_per9.is_none()
            && self.whip.is_none()
            && self.strike_percentage.is_none()
            && self.win_percentage.is_none()
    }

    fn from_stat_map(stat: &Map<String, Value>) -> Self {
        let get = |key: &str| stat.get(key).and_then(lenient_f64);
        Self {
            era: get("era"),
            avg: get("avg"),
            runs_per9: get("runsScoredPer9"),
            whip: get("whip"),
            strike_percentage: get("strikePercentage"),
            win_percentage: get("winPercentage"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonPitching {
    pub season: i32,
    pub line: PitchingLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeaderCategory {
    HomeRuns,
    RunsBattedIn,
    BattingAverage,
    StolenBases,
    TotalBases,
}

impl LeaderCategory {
    pub const ALL: [LeaderCategory; 5] = [
        LeaderCategory::HomeRuns,
        LeaderCategory::RunsBattedIn,
        LeaderCategory::BattingAverage,
        LeaderCategory::StolenBases,
        LeaderCategory::TotalBases,
    ];

    pub fn api_name(self) -> &'static str {
        match self {
            LeaderCategory::HomeRuns => "homeRuns",
            LeaderCategory::RunsBattedIn => "runsBattedIn",
            LeaderCategory::BattingAverage => "battingAverage",
            LeaderCategory::StolenBases => "stolenBases",
            LeaderCategory::TotalBases => "totalBases",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerEntry {
    pub id: u64,
    pub full_name: String,
}

/// Everything the pipeline needs from a stats source. Implementations must be
/// shareable across the worker threads that predict games in parallel.
pub trait StatsProvider: Send + Sync {
    fn game(&self, game_id: u64) -> Result<GameContext>;

    fn schedule_on(&self, date: NaiveDate) -> Result<Vec<GameContext>>;

    fn team_schedule(&self, team_id: u32, start: NaiveDate, end: NaiveDate)
    -> Result<Vec<GameContext>>;

    fn team_box_stats(&self, game_id: u64, team_id: u32) -> Result<TeamBoxStats>;

    fn standings(&self, date: NaiveDate) -> Result<Vec<DivisionStandingsSnapshot>>;

    fn lookup_player(&self, name: &str, season: i32) -> Result<Option<u64>>;

    fn pitching_year_by_year(&self, player_id: u64) -> Result<Vec<SeasonPitching>>;

    fn pitching_career(&self, player_id: u64) -> Result<Option<PitchingLine>>;

    fn team_leaders(&self, team_id: u32, category: LeaderCategory, season: i32)
    -> Result<Vec<f64>>;

    fn teams(&self) -> Result<Vec<TeamIdentity>>;

    /// The team's most recent final game of the same season strictly before
    /// `before`, if any.
    fn last_game(&self, team_id: u32, before: NaiveDate) -> Result<Option<GameContext>> {
        let Some(season_start) = NaiveDate::from_ymd_opt(before.year(), 1, 1) else {
            return Ok(None);
        };
        let Some(end) = before.pred_opt() else {
            return Ok(None);
        };
        if end < season_start {
            return Ok(None);
        }
        let mut games = self.team_schedule(team_id, season_start, end)?;
        games.retain(|g| g.is_final() && g.counts_for_form());
        games.sort_by_key(|g| (g.date, g.datetime));
        Ok(games.pop())
    }

    /// The team's next game that has not started yet, on or after `from`.
    fn next_game(&self, team_id: u32, from: NaiveDate) -> Result<Option<GameContext>> {
        let end = from + chrono::Duration::days(14);
        let mut games = self.team_schedule(team_id, from, end)?;
        games.retain(|g| g.status == GameStatus::Scheduled);
        games.sort_by_key(|g| (g.date, g.datetime));
        Ok(games.into_iter().next())
    }

    /// All of a team's games on one date (doubleheaders yield two).
    fn team_games_on(&self, team_id: u32, date: NaiveDate) -> Result<Vec<GameContext>> {
        self.team_schedule(team_id, date, date)
    }
}

/// The public MLB Stats API.
pub struct MlbStatsApi {
    base: String,
    retry: RetryPolicy,
    players: Mutex<HashMap<i32, Arc<Vec<PlayerEntry>>>>,
}

impl MlbStatsApi {
    pub fn new(retry: RetryPolicy) -> Self {
        Self::with_base(STATS_API_BASE, retry)
    }

    pub fn with_base(base: &str, retry: RetryPolicy) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            retry,
            players: Mutex::new(HashMap::new()),
        }
    }

    fn fetch(&self, what: &str, path: &str, query: &[(&str, &str)]) -> Result<String> {
        let url = format!("{}/{}", self.base, path.trim_start_matches('/'));
        with_retry(&self.retry, what, || get_text(&url, query))
    }

    fn season_players(&self, season: i32) -> Result<Arc<Vec<PlayerEntry>>> {
        {
            let cache = self.players.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(list) = cache.get(&season) {
                return Ok(Arc::clone(list));
            }
        }
        let season_str = season.to_string();
        let raw = self.fetch(
            "players",
            "sports/1/players",
            &[("season", season_str.as_str())],
        )?;
        let list = Arc::new(parse_players_json(&raw)?);
        debug!(season, count = list.len(), "cached season player list");
        let mut cache = self.players.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(season, Arc::clone(&list));
        Ok(list)
    }
}

impl StatsProvider for MlbStatsApi {
    fn game(&self, game_id: u64) -> Result<GameContext> {
        let id = game_id.to_string();
        let raw = self.fetch(
            "schedule",
            "schedule",
            &[
                ("sportId", "1"),
                ("gamePk", id.as_str()),
                ("hydrate", SCHEDULE_HYDRATE),
            ],
        )?;
        parse_schedule_json(&raw)?
            .into_iter()
            .find(|g| g.game_id == game_id)
            .ok_or_else(|| OracleError::NotFound(format!("game {game_id}")))
    }

    fn schedule_on(&self, date: NaiveDate) -> Result<Vec<GameContext>> {
        let day = date.format("%Y-%m-%d").to_string();
        let raw = self.fetch(
            "schedule",
            "schedule",
            &[
                ("sportId", "1"),
                ("startDate", day.as_str()),
                ("endDate", day.as_str()),
                ("hydrate", SCHEDULE_HYDRATE),
            ],
        )?;
        parse_schedule_json(&raw)
    }

    fn team_schedule(
        &self,
        team_id: u32,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<GameContext>> {
        let team = team_id.to_string();
        let start = start.format("%Y-%m-%d").to_string();
        let end = end.format("%Y-%m-%d").to_string();
        let raw = self.fetch(
            "team schedule",
            "schedule",
            &[
                ("sportId", "1"),
                ("teamId", team.as_str()),
                ("startDate", start.as_str()),
                ("endDate", end.as_str()),
                ("hydrate", SCHEDULE_HYDRATE),
            ],
        )?;
        parse_schedule_json(&raw)
    }

    fn team_box_stats(&self, game_id: u64, team_id: u32) -> Result<TeamBoxStats> {
        let raw = self.fetch("boxscore", &format!("game/{game_id}/boxscore"), &[])?;
        parse_boxscore_json(&raw, team_id)
    }

    fn standings(&self, date: NaiveDate) -> Result<Vec<DivisionStandingsSnapshot>> {
        let day = date.format("%m/%d/%Y").to_string();
        let raw = self.fetch(
            "standings",
            "standings",
            &[("leagueId", "103,104"), ("date", day.as_str())],
        )?;
        parse_standings_json(&raw, date)
    }

    fn lookup_player(&self, name: &str, season: i32) -> Result<Option<u64>> {
        let players = self.season_players(season)?;
        Ok(find_player(&players, name))
    }

    fn pitching_year_by_year(&self, player_id: u64) -> Result<Vec<SeasonPitching>> {
        let raw = self.fetch(
            "pitching stats",
            &format!("people/{player_id}/stats"),
            &[("stats", "yearByYear"), ("group", "pitching")],
        )?;
        parse_pitching_json(&raw)
    }

    fn pitching_career(&self, player_id: u64) -> Result<Option<PitchingLine>> {
        let raw = self.fetch(
            "career pitching",
            &format!("people/{player_id}/stats"),
            &[("stats", "career"), ("group", "pitching")],
        )?;
        parse_career_pitching_json(&raw)
    }

    fn team_leaders(
        &self,
        team_id: u32,
        category: LeaderCategory,
        season: i32,
    ) -> Result<Vec<f64>> {
        let season = season.to_string();
        let raw = self.fetch(
            "team leaders",
            &format!("teams/{team_id}/leaders"),
            &[
                ("leaderCategories", category.api_name()),
                ("season", season.as_str()),
                ("limit", "5"),
            ],
        )?;
        parse_leaders_json(&raw, category)
    }

    fn teams(&self) -> Result<Vec<TeamIdentity>> {
        let raw = self.fetch(
            "teams",
            "teams",
            &[("sportId", "1"), ("hydrate", "division,league")],
        )?;
        parse_teams_json(&raw)
    }
}

fn decode<T: for<'de> Deserialize<'de>>(raw: &str, what: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|err| OracleError::permanent(format!("invalid {what} json: {err}")))
}

/// Stat values arrive as numbers or as strings like ".245" and "-.--".
pub fn lenient_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn lenient_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct ScheduleResponse {
    #[serde(default)]
    dates: Vec<ScheduleDate>,
}

#[derive(Debug, Deserialize)]
struct ScheduleDate {
    #[serde(default)]
    games: Vec<ApiGame>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiGame {
    game_pk: u64,
    #[serde(default)]
    game_type: String,
    game_date: Option<String>,
    official_date: Option<String>,
    #[serde(default)]
    status: ApiStatus,
    teams: ApiGameTeams,
    venue: Option<ApiNamed>,
    #[serde(default)]
    broadcasts: Vec<ApiBroadcast>,
    series_status: Option<ApiSeriesStatus>,
    decisions: Option<ApiDecisions>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiStatus {
    #[serde(default)]
    abstract_game_state: String,
    #[serde(default)]
    detailed_state: String,
}

#[derive(Debug, Deserialize)]
struct ApiGameTeams {
    home: ApiGameTeam,
    away: ApiGameTeam,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiGameTeam {
    team: ApiTeamRef,
    score: Option<u32>,
    probable_pitcher: Option<ApiPerson>,
}

#[derive(Debug, Deserialize)]
struct ApiTeamRef {
    id: u32,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPerson {
    #[serde(default)]
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct ApiNamed {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiBroadcast {
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_national: bool,
}

#[derive(Debug, Deserialize)]
struct ApiSeriesStatus {
    result: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiDecisions {
    winner: Option<ApiPerson>,
    loser: Option<ApiPerson>,
}

fn person_name(person: Option<ApiPerson>) -> Option<String> {
    person
        .map(|p| p.full_name.trim().to_string())
        .filter(|n| !n.is_empty())
}

fn game_from_api(game: ApiGame) -> Option<GameContext> {
    let datetime = game
        .game_date
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc));
    let date = game
        .official_date
        .as_deref()
        .or_else(|| game.game_date.as_deref().and_then(|raw| raw.get(..10)))
        .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())?;

    let mut national_broadcasts: Vec<String> = Vec::new();
    for b in game.broadcasts.into_iter().filter(|b| b.is_national) {
        if !b.name.is_empty() && !national_broadcasts.contains(&b.name) {
            national_broadcasts.push(b.name);
        }
    }
    let (winning_pitcher, losing_pitcher) = match game.decisions {
        Some(d) => (person_name(d.winner), person_name(d.loser)),
        None => (None, None),
    };

    Some(GameContext {
        game_id: game.game_pk,
        date,
        datetime,
        game_type: game.game_type,
        home: TeamRef {
            id: game.teams.home.team.id,
            name: game.teams.home.team.name,
        },
        away: TeamRef {
            id: game.teams.away.team.id,
            name: game.teams.away.team.name,
        },
        home_probable: person_name(game.teams.home.probable_pitcher),
        away_probable: person_name(game.teams.away.probable_pitcher),
        venue: game.venue.map(|v| v.name).filter(|n| !n.is_empty()),
        national_broadcasts,
        series_status: game.series_status.and_then(|s| s.result),
        status: GameStatus::from_states(
            &game.status.abstract_game_state,
            &game.status.detailed_state,
        ),
        home_score: game.teams.home.score,
        away_score: game.teams.away.score,
        winning_pitcher,
        losing_pitcher,
    })
}

pub fn parse_schedule_json(raw: &str) -> Result<Vec<GameContext>> {
    let parsed: ScheduleResponse = decode(raw, "schedule")?;
    Ok(parsed
        .dates
        .into_iter()
        .flat_map(|d| d.games)
        .filter_map(game_from_api)
        .collect())
}

#[derive(Debug, Deserialize)]
struct BoxscoreResponse {
    teams: BoxTeams,
}

#[derive(Debug, Deserialize)]
struct BoxTeams {
    home: BoxTeam,
    away: BoxTeam,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoxTeam {
    team: ApiTeamRef,
    #[serde(default)]
    team_stats: BoxTeamStats,
}

#[derive(Debug, Default, Deserialize)]
struct BoxTeamStats {
    #[serde(default)]
    batting: Map<String, Value>,
    #[serde(default)]
    pitching: Map<String, Value>,
}

pub fn parse_boxscore_json(raw: &str, team_id: u32) -> Result<TeamBoxStats> {
    let parsed: BoxscoreResponse = decode(raw, "boxscore")?;
    let side = if parsed.teams.home.team.id == team_id {
        parsed.teams.home
    } else if parsed.teams.away.team.id == team_id {
        parsed.teams.away
    } else {
        return Err(OracleError::permanent(format!(
            "team {team_id} not present in boxscore"
        )));
    };
    let bat = |key: &str| side.team_stats.batting.get(key).and_then(lenient_f64);
    let pitch = |key: &str| side.team_stats.pitching.get(key).and_then(lenient_f64);
    Ok(TeamBoxStats {
        runs: bat("runs"),
        hits: bat("hits"),
        rbi: bat("rbi"),
        ops: bat("ops"),
        avg: bat("avg"),
        runs_allowed: pitch("runs"),
        hits_allowed: pitch("hits"),
        strikeouts: pitch("strikeOuts"),
        obp_allowed: pitch("obp"),
    })
}

#[derive(Debug, Deserialize)]
struct StandingsResponse {
    #[serde(default)]
    records: Vec<StandingsRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StandingsRecord {
    division: Option<ApiIdOnly>,
    #[serde(default)]
    team_records: Vec<ApiTeamRecord>,
}

#[derive(Debug, Deserialize)]
struct ApiIdOnly {
    id: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTeamRecord {
    team: ApiTeamRef,
    wins: u32,
    losses: u32,
    division_rank: Option<Value>,
    games_back: Option<Value>,
    league_rank: Option<Value>,
}

pub fn parse_standings_json(raw: &str, as_of: NaiveDate) -> Result<Vec<DivisionStandingsSnapshot>> {
    let parsed: StandingsResponse = decode(raw, "standings")?;
    let mut out = Vec::new();
    for record in parsed.records {
        let Some(division) = record.division else {
            continue;
        };
        let mut teams: Vec<TeamRecord> = Vec::with_capacity(record.team_records.len());
        for r in record.team_records {
            if teams.iter().any(|t| t.name == r.team.name) {
                debug!(team = %r.team.name, division = division.id, "duplicate standings row ignored");
                continue;
            }
            let games_back = match r.games_back {
                Some(Value::String(s)) => s,
                Some(Value::Number(n)) => n.to_string(),
                _ => "-".to_string(),
            };
            teams.push(TeamRecord {
                team_id: r.team.id,
                name: r.team.name,
                wins: r.wins,
                losses: r.losses,
                division_rank: r.division_rank.as_ref().and_then(lenient_u32),
                games_back,
                league_rank: r.league_rank.as_ref().and_then(lenient_u32),
            });
        }
        out.push(DivisionStandingsSnapshot {
            division_id: division.id,
            as_of,
            teams,
        });
    }
    Ok(out)
}

#[derive(Debug, Deserialize)]
struct PeopleResponse {
    #[serde(default)]
    people: Vec<ApiPlayer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPlayer {
    id: u64,
    #[serde(default)]
    full_name: String,
}

pub fn parse_players_json(raw: &str) -> Result<Vec<PlayerEntry>> {
    let parsed: PeopleResponse = decode(raw, "players")?;
    Ok(parsed
        .people
        .into_iter()
        .map(|p| PlayerEntry {
            id: p.id,
            full_name: p.full_name,
        })
        .collect())
}

/// Exact (case-insensitive) full-name match first, then the first player whose
/// name contains every word of the query.
pub fn find_player(players: &[PlayerEntry], name: &str) -> Option<u64> {
    let wanted = name.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    if let Some(p) = players
        .iter()
        .find(|p| p.full_name.to_lowercase() == wanted)
    {
        return Some(p.id);
    }
    let words: Vec<&str> = wanted.split_whitespace().collect();
    players
        .iter()
        .find(|p| {
            let full = p.full_name.to_lowercase();
            words.iter().all(|w| full.contains(w))
        })
        .map(|p| p.id)
}

#[derive(Debug, Deserialize)]
struct PeopleStatsResponse {
    #[serde(default)]
    stats: Vec<StatGroup>,
}

#[derive(Debug, Deserialize)]
struct StatGroup {
    #[serde(default)]
    splits: Vec<StatSplit>,
}

#[derive(Debug, Deserialize)]
struct StatSplit {
    season: Option<String>,
    #[serde(default)]
    stat: Map<String, Value>,
}

pub fn parse_pitching_json(raw: &str) -> Result<Vec<SeasonPitching>> {
    let parsed: PeopleStatsResponse = decode(raw, "pitching stats")?;
    Ok(parsed
        .stats
        .into_iter()
        .flat_map(|g| g.splits)
        .filter_map(|split| {
            let season = split.season.as_deref()?.trim().parse::<i32>().ok()?;
            Some(SeasonPitching {
                season,
                line: PitchingLine::from_stat_map(&split.stat),
            })
        })
        .collect())
}

pub fn parse_career_pitching_json(raw: &str) -> Result<Option<PitchingLine>> {
    let parsed: PeopleStatsResponse = decode(raw, "career pitching")?;
    Ok(parsed
        .stats
        .into_iter()
        .flat_map(|g| g.splits)
        .next()
        .map(|split| PitchingLine::from_stat_map(&split.stat))
        .filter(|line| !line.is_empty()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeadersResponse {
    #[serde(default)]
    team_leaders: Vec<LeaderGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaderGroup {
    #[serde(default)]
    leader_category: String,
    #[serde(default)]
    leaders: Vec<LeaderEntry>,
}

#[derive(Debug, Deserialize)]
struct LeaderEntry {
    rank: Option<u32>,
    value: Option<Value>,
}

/// Leader values for one category in rank order.
pub fn parse_leaders_json(raw: &str, category: LeaderCategory) -> Result<Vec<f64>> {
    let parsed: LeadersResponse = decode(raw, "team leaders")?;
    let Some(group) = parsed
        .team_leaders
        .into_iter()
        .find(|g| g.leader_category == category.api_name())
    else {
        return Ok(Vec::new());
    };
    let mut ranked: Vec<(u32, f64)> = group
        .leaders
        .iter()
        .enumerate()
        .filter_map(|(idx, l)| {
            let value = l.value.as_ref().and_then(lenient_f64)?;
            Some((l.rank.unwrap_or(idx as u32 + 1), value))
        })
        .collect();
    ranked.sort_by_key(|(rank, _)| *rank);
    Ok(ranked.into_iter().map(|(_, v)| v).collect())
}

#[derive(Debug, Deserialize)]
struct TeamsResponse {
    #[serde(default)]
    teams: Vec<ApiTeam>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTeam {
    id: u32,
    name: String,
    #[serde(default)]
    short_name: String,
    #[serde(default)]
    abbreviation: String,
    active: Option<bool>,
    division: Option<ApiNamedId>,
    league: Option<ApiNamedId>,
}

#[derive(Debug, Deserialize)]
struct ApiNamedId {
    id: u32,
    #[serde(default)]
    name: String,
}

pub fn parse_teams_json(raw: &str) -> Result<Vec<TeamIdentity>> {
    let parsed: TeamsResponse = decode(raw, "teams")?;
    Ok(parsed
        .teams
        .into_iter()
        .filter(|t| t.active != Some(false))
        .map(|t| TeamIdentity {
            id: t.id,
            short_name: if t.short_name.is_empty() {
                t.name.clone()
            } else {
                t.short_name
            },
            name: t.name,
            abbreviation: t.abbreviation,
            division_id: t.division.as_ref().map(|d| d.id),
            division: t.division.map(|d| d.name).filter(|n| !n.is_empty()),
            league_id: t.league.as_ref().map(|l| l.id),
            league: t.league.map(|l| l.name).filter(|n| !n.is_empty()),
        })
        .collect())
}
