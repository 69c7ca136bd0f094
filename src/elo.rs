use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{OracleError, Result};
use crate::fragment::{FeatureFragment, FragmentKind};
use crate::game::GameContext;
use crate::ids::Resolver;
use crate::schema::{Feature, Stat};

/// Home-field bump used when a ratings row carries no probability column.
const HOME_ADV_PTS: f64 = 24.0;

/// One row of a public pre-game ratings table; `team1` is the home side.
#[derive(Debug, Deserialize)]
struct RawEloRow {
    date: String,
    team1: String,
    team2: String,
    elo1_pre: f64,
    elo2_pre: f64,
    #[serde(default)]
    elo_prob1: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EloRow {
    pub home_elo: f64,
    pub away_elo: f64,
    pub home_prob: f64,
}

/// Ratings keyed by exact `(date, home code, away code)`.
#[derive(Debug, Clone, Default)]
pub struct EloTable {
    rows: HashMap<(NaiveDate, String, String), EloRow>,
}

impl EloTable {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|err| {
            OracleError::Configuration(format!("failed opening {}: {err}", path.display()))
        })?;
        let table = Self::from_reader(file)?;
        debug!(path = %path.display(), rows = table.len(), "loaded ratings table");
        Ok(table)
    }

    pub fn from_reader<R: Read>(rdr: R) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(rdr);
        let mut rows = HashMap::new();
        for result in reader.deserialize::<RawEloRow>() {
            let raw = match result {
                Ok(raw) => raw,
                Err(err) => {
                    warn!("skipping malformed ratings row: {err}");
                    continue;
                }
            };
            let Ok(date) = NaiveDate::parse_from_str(raw.date.trim(), "%Y-%m-%d") else {
                warn!("skipping ratings row with bad date `{}`", raw.date);
                continue;
            };
            if !raw.elo1_pre.is_finite() || !raw.elo2_pre.is_finite() {
                continue;
            }
            let home_prob = raw
                .elo_prob1
                .filter(|p| p.is_finite())
                .unwrap_or_else(|| expected_score(raw.elo1_pre + HOME_ADV_PTS, raw.elo2_pre));
            let key = (
                date,
                raw.team1.trim().to_ascii_uppercase(),
                raw.team2.trim().to_ascii_uppercase(),
            );
            // Doubleheaders share a key; the first game's pre-game rating is kept.
            rows.entry(key).or_insert(EloRow {
                home_elo: raw.elo1_pre,
                away_elo: raw.elo2_pre,
                home_prob,
            });
        }
        Ok(Self { rows })
    }

    pub fn lookup(&self, date: NaiveDate, home: &str, away: &str) -> Option<&EloRow> {
        self.rows.get(&(
            date,
            home.trim().to_ascii_uppercase(),
            away.trim().to_ascii_uppercase(),
        ))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Exact-match rating lookup; no row means an empty fragment, never an
/// interpolated one.
pub fn elo_fragment(game: &GameContext, resolver: &Resolver, table: &EloTable) -> Result<FeatureFragment> {
    let home = resolver.elo_abbreviation(&game.home.name)?;
    let away = resolver.elo_abbreviation(&game.away.name)?;
    let Some(row) = table.lookup(game.date, home, away) else {
        debug!(game_id = game.game_id, home, away, "no ratings row");
        return Ok(FeatureFragment::empty(FragmentKind::Elo));
    };
    Ok(FeatureFragment::new(
        FragmentKind::Elo,
        [
            (Feature::home(Stat::Elo), Some(row.home_elo)),
            (Feature::away(Stat::Elo), Some(row.away_elo)),
            (Feature::home(Stat::EloProb), Some(row.home_prob)),
        ],
    ))
}

fn expected_score(r_a: f64, r_b: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf(-(r_a - r_b) / 400.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
date,season,team1,team2,elo1_pre,elo2_pre,elo_prob1,elo_prob2
2019-06-01,2019,NYM,FLA,1510.2,1480.0,0.581,0.419
2019-06-01,2019,SFG,LAD,1470.0,1560.0,,
bad-date,2019,SEA,OAK,1500,1500,0.5,0.5
";

    #[test]
    fn exact_match_only() {
        let table = EloTable::from_reader(TABLE.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        let date = NaiveDate::from_ymd_opt(2019, 6, 1).unwrap();
        let row = table.lookup(date, "nym", "FLA").unwrap();
        assert_eq!(row.home_prob, 0.581);
        assert!(table.lookup(date, "FLA", "NYM").is_none());
        assert!(table.lookup(date.succ_opt().unwrap(), "NYM", "FLA").is_none());
    }

    #[test]
    fn missing_probability_derived_from_ratings() {
        let table = EloTable::from_reader(TABLE.as_bytes()).unwrap();
        let date = NaiveDate::from_ymd_opt(2019, 6, 1).unwrap();
        let row = table.lookup(date, "SFG", "LAD").unwrap();
        assert!(row.home_prob < 0.5);
        assert!(row.home_prob > 0.0);
    }

    #[test]
    fn equal_ratings_are_even() {
        assert!((expected_score(1500.0, 1500.0) - 0.5).abs() < 1e-12);
    }
}
