//! In-memory [`StatsProvider`] for tests, benchmarks and offline runs.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{OracleError, Result};
use crate::game::{GameContext, GameStatus, TeamRef};
use crate::ids::TeamIdentity;
use crate::standings::{DivisionStandingsSnapshot, TeamRecord};
use crate::stats_api::{LeaderCategory, PitchingLine, SeasonPitching, StatsProvider, TeamBoxStats};

#[derive(Debug, Default, Clone)]
pub struct FakeStatsProvider {
    games: Vec<GameContext>,
    box_stats: HashMap<(u64, u32), TeamBoxStats>,
    standings: Vec<DivisionStandingsSnapshot>,
    players: HashMap<String, u64>,
    year_by_year: HashMap<u64, Vec<SeasonPitching>>,
    career: HashMap<u64, PitchingLine>,
    leaders: HashMap<(u32, LeaderCategory, i32), Vec<f64>>,
    teams: Vec<TeamIdentity>,
    unreachable_teams: HashSet<u32>,
}

impl FakeStatsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_teams(mut self, teams: Vec<TeamIdentity>) -> Self {
        self.teams = teams;
        self
    }

    pub fn with_game(mut self, game: GameContext) -> Self {
        self.games.retain(|g| g.game_id != game.game_id);
        self.games.push(game);
        self
    }

    pub fn with_box_stats(mut self, game_id: u64, team_id: u32, stats: TeamBoxStats) -> Self {
        self.box_stats.insert((game_id, team_id), stats);
        self
    }

    pub fn with_standings(mut self, snapshot: DivisionStandingsSnapshot) -> Self {
        self.standings.push(snapshot);
        self
    }

    pub fn with_pitcher(
        mut self,
        name: &str,
        id: u64,
        seasons: Vec<SeasonPitching>,
        career: Option<PitchingLine>,
    ) -> Self {
        self.players.insert(name.to_string(), id);
        self.year_by_year.insert(id, seasons);
        if let Some(career) = career {
            self.career.insert(id, career);
        }
        self
    }

    pub fn with_leaders(mut self, team_id: u32, category: LeaderCategory, season: i32, values: Vec<f64>) -> Self {
        self.leaders.insert((team_id, category, season), values);
        self
    }

    /// Every schedule query touching `team_id` fails transiently.
    pub fn with_unreachable_team(mut self, team_id: u32) -> Self {
        self.unreachable_teams.insert(team_id);
        self
    }

    pub fn set_game(&mut self, game: GameContext) {
        self.games.retain(|g| g.game_id != game.game_id);
        self.games.push(game);
    }

    /// A six-team league with ten days of completed history before `date`
    /// and three scheduled games on it.
    pub fn demo(date: NaiveDate, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let league = [
            (147, "New York Yankees", "Yankees", "NYY", 201, "American League East"),
            (111, "Boston Red Sox", "Red Sox", "BOS", 201, "American League East"),
            (110, "Baltimore Orioles", "Orioles", "BAL", 201, "American League East"),
            (141, "Toronto Blue Jays", "Blue Jays", "TOR", 201, "American League East"),
            (139, "Tampa Bay Rays", "Rays", "TB", 201, "American League East"),
            (121, "New York Mets", "Mets", "NYM", 204, "National League East"),
        ];
        let teams: Vec<TeamIdentity> = league
            .iter()
            .map(|(id, name, short, abbr, div_id, div)| TeamIdentity {
                id: *id,
                name: name.to_string(),
                short_name: short.to_string(),
                abbreviation: abbr.to_string(),
                division_id: Some(*div_id),
                division: Some(div.to_string()),
                league_id: Some(if *div_id == 201 { 103 } else { 104 }),
                league: Some(
                    if *div_id == 201 {
                        "American League"
                    } else {
                        "National League"
                    }
                    .to_string(),
                ),
            })
            .collect();

        let mut provider = Self::new().with_teams(teams.clone());
        let season = date.year();
        let mut game_id = 700_000u64;

        for back in 1..=10 {
            let day = date - Duration::days(back);
            for pair in teams.chunks(2) {
                let (home, away) = (&pair[0], &pair[1]);
                game_id += 1;
                let mut game = demo_game(game_id, day, home, away);
                game.status = GameStatus::Final;
                game.home_score = Some(rng.gen_range(0..10));
                game.away_score = Some(rng.gen_range(0..10));
                if game.home_score == game.away_score {
                    game.home_score = game.home_score.map(|s| s + 1);
                }
                provider = provider
                    .with_box_stats(game_id, home.id, random_box(&mut rng))
                    .with_box_stats(game_id, away.id, random_box(&mut rng))
                    .with_game(game);
            }
        }

        for (i, pair) in teams.chunks(2).enumerate() {
            let (home, away) = (&pair[0], &pair[1]);
            game_id += 1;
            let mut game = demo_game(game_id, date, home, away);
            game.datetime = Utc
                .with_ymd_and_hms(date.year(), date.month(), date.day(), 23, 5 + i as u32 * 5, 0)
                .single();
            game.home_probable = Some(format!("{} Starter", home.short_name));
            game.away_probable = Some(format!("{} Starter", away.short_name));
            provider = provider.with_game(game);
        }

        for (div_id, members) in [(201u32, &teams[..5]), (204u32, &teams[5..])] {
            let mut rows: Vec<TeamRecord> = members
                .iter()
                .map(|t| {
                    let wins = rng.gen_range(20..45);
                    TeamRecord {
                        team_id: t.id,
                        name: t.name.clone(),
                        wins,
                        losses: 60 - wins,
                        division_rank: None,
                        games_back: "-".to_string(),
                        league_rank: None,
                    }
                })
                .collect();
            rows.sort_by(|a, b| b.wins.cmp(&a.wins));
            for (rank, row) in rows.iter_mut().enumerate() {
                row.division_rank = Some(rank as u32 + 1);
            }
            provider = provider.with_standings(DivisionStandingsSnapshot {
                division_id: div_id,
                as_of: date,
                teams: rows,
            });
        }

        for (i, team) in teams.iter().enumerate() {
            let id = 600_000 + i as u64;
            let line = random_pitching(&mut rng);
            let career = random_pitching(&mut rng);
            provider = provider.with_pitcher(
                &format!("{} Starter", team.short_name),
                id,
                vec![SeasonPitching { season, line }],
                Some(career),
            );
            for category in LeaderCategory::ALL {
                for s in [season - 1, season] {
                    let mut values: Vec<f64> = (0..6).map(|_| leader_value(&mut rng, category)).collect();
                    values.sort_by(|a, b| b.total_cmp(a));
                    provider = provider.with_leaders(team.id, category, s, values);
                }
            }
        }
        provider
    }
}

fn demo_game(game_id: u64, date: NaiveDate, home: &TeamIdentity, away: &TeamIdentity) -> GameContext {
    GameContext {
        game_id,
        date,
        datetime: None,
        game_type: "R".to_string(),
        home: TeamRef {
            id: home.id,
            name: home.name.clone(),
        },
        away: TeamRef {
            id: away.id,
            name: away.name.clone(),
        },
        home_probable: None,
        away_probable: None,
        venue: None,
        national_broadcasts: Vec::new(),
        series_status: None,
        status: GameStatus::Scheduled,
        home_score: None,
        away_score: None,
        winning_pitcher: None,
        losing_pitcher: None,
    }
}

fn random_box(rng: &mut StdRng) -> TeamBoxStats {
    TeamBoxStats {
        runs: Some(rng.gen_range(0..10) as f64),
        hits: Some(rng.gen_range(3..14) as f64),
        rbi: Some(rng.gen_range(0..9) as f64),
        ops: Some(rng.gen_range(0.5..0.95)),
        avg: Some(rng.gen_range(0.2..0.3)),
        runs_allowed: Some(rng.gen_range(0..10) as f64),
        hits_allowed: Some(rng.gen_range(3..14) as f64),
        strikeouts: Some(rng.gen_range(3..14) as f64),
        obp_allowed: Some(rng.gen_range(0.25..0.38)),
    }
}

fn random_pitching(rng: &mut StdRng) -> PitchingLine {
    PitchingLine {
        era: Some(rng.gen_range(2.0..6.0)),
        avg: Some(rng.gen_range(0.2..0.3)),
        runs_per9: Some(rng.gen_range(2.5..6.5)),
        whip: Some(rng.gen_range(0.9..1.6)),
        strike_percentage: Some(rng.gen_range(0.58..0.69)),
        win_percentage: Some(rng.gen_range(0.3..0.7)),
    }
}

fn leader_value(rng: &mut StdRng, category: LeaderCategory) -> f64 {
    match category {
        LeaderCategory::HomeRuns => rng.gen_range(2.0..30.0_f64).round(),
        LeaderCategory::RunsBattedIn => rng.gen_range(10.0..80.0_f64).round(),
        LeaderCategory::BattingAverage => rng.gen_range(0.22..0.33),
        LeaderCategory::StolenBases => rng.gen_range(0.0..25.0_f64).round(),
        LeaderCategory::TotalBases => rng.gen_range(40.0..200.0_f64).round(),
    }
}

impl StatsProvider for FakeStatsProvider {
    fn game(&self, game_id: u64) -> Result<GameContext> {
        self.games
            .iter()
            .find(|g| g.game_id == game_id)
            .cloned()
            .ok_or_else(|| OracleError::permanent(format!("no game {game_id}")))
    }

    fn schedule_on(&self, date: NaiveDate) -> Result<Vec<GameContext>> {
        Ok(self.games.iter().filter(|g| g.date == date).cloned().collect())
    }

    fn team_schedule(&self, team_id: u32, start: NaiveDate, end: NaiveDate) -> Result<Vec<GameContext>> {
        if self.unreachable_teams.contains(&team_id) {
            return Err(OracleError::transient(format!("schedule for team {team_id} timed out")));
        }
        Ok(self
            .games
            .iter()
            .filter(|g| g.home.id == team_id || g.away.id == team_id)
            .filter(|g| g.date >= start && g.date <= end)
            .cloned()
            .collect())
    }

    fn team_box_stats(&self, game_id: u64, team_id: u32) -> Result<TeamBoxStats> {
        self.box_stats
            .get(&(game_id, team_id))
            .copied()
            .ok_or_else(|| OracleError::permanent(format!("no boxscore for game {game_id}")))
    }

    fn standings(&self, _date: NaiveDate) -> Result<Vec<DivisionStandingsSnapshot>> {
        Ok(self.standings.clone())
    }

    fn lookup_player(&self, name: &str, _season: i32) -> Result<Option<u64>> {
        Ok(self.players.get(name).copied())
    }

    fn pitching_year_by_year(&self, player_id: u64) -> Result<Vec<SeasonPitching>> {
        Ok(self.year_by_year.get(&player_id).cloned().unwrap_or_default())
    }

    fn pitching_career(&self, player_id: u64) -> Result<Option<PitchingLine>> {
        Ok(self.career.get(&player_id).copied())
    }

    fn team_leaders(&self, team_id: u32, category: LeaderCategory, season: i32) -> Result<Vec<f64>> {
        Ok(self
            .leaders
            .get(&(team_id, category, season))
            .cloned()
            .unwrap_or_default())
    }

    fn teams(&self) -> Result<Vec<TeamIdentity>> {
        Ok(self.teams.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_league_is_consistent() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let provider = FakeStatsProvider::demo(date, 7);
        let today = provider.schedule_on(date).unwrap();
        assert_eq!(today.len(), 3);
        assert!(today.iter().all(|g| g.home_probable.is_some()));
        let last = provider.last_game(147, date).unwrap().unwrap();
        assert_eq!(last.date, date - Duration::days(1));
        assert_eq!(provider.teams().unwrap().len(), 6);
    }
}
