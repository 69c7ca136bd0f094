use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::fragment::{FeatureFragment, FragmentKind};
use crate::game::{GameContext, Side};
use crate::ids::Resolver;
use crate::schema::{Feature, Stat};
use crate::stats_api::StatsProvider;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub team_id: u32,
    pub name: String,
    pub wins: u32,
    pub losses: u32,
    pub division_rank: Option<u32>,
    /// `-` for the division leader.
    pub games_back: String,
    pub league_rank: Option<u32>,
}

impl TeamRecord {
    /// Wins over decisions, rounded to three places. `None` before a team has
    /// played.
    pub fn win_percentage(&self) -> Option<f64> {
        let decisions = self.wins + self.losses;
        if decisions == 0 {
            return None;
        }
        Some(round3(f64::from(self.wins) / f64::from(decisions)))
    }
}

/// One division's table on one date. Holds at most one row per team name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivisionStandingsSnapshot {
    pub division_id: u32,
    pub as_of: NaiveDate,
    pub teams: Vec<TeamRecord>,
}

impl DivisionStandingsSnapshot {
    pub fn record(&self, team_name: &str) -> Option<&TeamRecord> {
        self.teams.iter().find(|t| t.name == team_name)
    }
}

/// Looks up a team's row in its division table.
pub fn team_standings<'a>(
    snapshots: &'a [DivisionStandingsSnapshot],
    division_id: u32,
    team_name: &str,
) -> Option<&'a TeamRecord> {
    snapshots
        .iter()
        .find(|s| s.division_id == division_id)
        .and_then(|s| s.record(team_name))
}

/// Both teams' win percentage from the standings on the game date. The
/// fragment is empty unless both teams have a standings row.
pub fn win_pct_fragment(
    game: &GameContext,
    resolver: &Resolver,
    provider: &dyn StatsProvider,
) -> Result<FeatureFragment> {
    let (_, home_div) = resolver.division_of(&game.home.name)?;
    let (_, away_div) = resolver.division_of(&game.away.name)?;
    let snapshots = provider.standings(game.date)?;

    let home = team_standings(&snapshots, home_div, &game.home.name);
    let away = team_standings(&snapshots, away_div, &game.away.name);
    let (Some(home), Some(away)) = (home, away) else {
        debug!(game_id = game.game_id, date = %game.date, "standings missing for one side");
        return Ok(FeatureFragment::empty(FragmentKind::WinPct));
    };

    Ok(FeatureFragment::new(
        FragmentKind::WinPct,
        [
            (Feature::new(Side::Home, Stat::WinPercentage), home.win_percentage()),
            (Feature::new(Side::Away, Stat::WinPercentage), away.win_percentage()),
        ],
    ))
}

pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, wins: u32, losses: u32) -> TeamRecord {
        TeamRecord {
            team_id: 1,
            name: name.to_string(),
            wins,
            losses,
            division_rank: Some(1),
            games_back: "-".to_string(),
            league_rank: Some(1),
        }
    }

    #[test]
    fn win_percentage_rounds_to_three_places() {
        assert_eq!(record("A", 50, 40).win_percentage(), Some(0.556));
        assert_eq!(record("B", 45, 45).win_percentage(), Some(0.5));
        assert_eq!(record("C", 2, 1).win_percentage(), Some(0.667));
    }

    #[test]
    fn no_decisions_is_null_not_zero() {
        assert_eq!(record("A", 0, 0).win_percentage(), None);
    }

    #[test]
    fn lookup_is_scoped_to_division() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let snapshots = vec![
            DivisionStandingsSnapshot {
                division_id: 201,
                as_of: date,
                teams: vec![record("A", 1, 0)],
            },
            DivisionStandingsSnapshot {
                division_id: 204,
                as_of: date,
                teams: vec![record("B", 0, 1)],
            },
        ];
        assert!(team_standings(&snapshots, 201, "A").is_some());
        assert!(team_standings(&snapshots, 204, "A").is_none());
        assert!(team_standings(&snapshots, 999, "B").is_none());
    }
}
