use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::OracleError;
use crate::game::Side;

/// One per-side statistic the models know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stat {
    WinPercentage,
    Last10Runs,
    Last10RunsAllowed,
    Last10Hits,
    Last10HitsAllowed,
    Last10Ops,
    Last10Strikeouts,
    Last10Obp,
    Last10Avg,
    Last10Rbi,
    StarterCareerEra,
    StarterSeasonEra,
    StarterSeasonAvg,
    StarterSeasonRunsPer9,
    StarterSeasonWinPercentage,
    StarterSeasonWhip,
    StarterSeasonStrikePercentage,
    Top5HrAvg,
    Top5RbiAvg,
    Top5BattingAvg,
    Top5StolenBasesAvg,
    Top5TotalBasesAvg,
    Elo,
    EloProb,
}

impl Stat {
    const ALL: [Stat; 24] = [
        Stat::WinPercentage,
        Stat::Last10Runs,
        Stat::Last10RunsAllowed,
        Stat::Last10Hits,
        Stat::Last10HitsAllowed,
        Stat::Last10Ops,
        Stat::Last10Strikeouts,
        Stat::Last10Obp,
        Stat::Last10Avg,
        Stat::Last10Rbi,
        Stat::StarterCareerEra,
        Stat::StarterSeasonEra,
        Stat::StarterSeasonAvg,
        Stat::StarterSeasonRunsPer9,
        Stat::StarterSeasonWinPercentage,
        Stat::StarterSeasonWhip,
        Stat::StarterSeasonStrikePercentage,
        Stat::Top5HrAvg,
        Stat::Top5RbiAvg,
        Stat::Top5BattingAvg,
        Stat::Top5StolenBasesAvg,
        Stat::Top5TotalBasesAvg,
        Stat::Elo,
        Stat::EloProb,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            Stat::WinPercentage => "win-percentage",
            Stat::Last10Runs => "last10-avg-runs",
            Stat::Last10RunsAllowed => "last10-avg-runs-allowed",
            Stat::Last10Hits => "last10-avg-hits",
            Stat::Last10HitsAllowed => "last10-avg-hits-allowed",
            Stat::Last10Ops => "last10-avg-ops",
            Stat::Last10Strikeouts => "last10-avg-strikeouts",
            Stat::Last10Obp => "last10-avg-obp",
            Stat::Last10Avg => "last10-avg-avg",
            Stat::Last10Rbi => "last10-avg-rbi",
            Stat::StarterCareerEra => "starter-career-era",
            Stat::StarterSeasonEra => "starter-season-era",
            Stat::StarterSeasonAvg => "starter-season-avg",
            Stat::StarterSeasonRunsPer9 => "starter-season-runs-per9",
            Stat::StarterSeasonWinPercentage => "starter-season-win-percentage",
            Stat::StarterSeasonWhip => "starter-season-whip",
            Stat::StarterSeasonStrikePercentage => "starter-season-strike-percentage",
            Stat::Top5HrAvg => "top5-hr-avg",
            Stat::Top5RbiAvg => "top5-rbi-avg",
            Stat::Top5BattingAvg => "top5-batting-avg",
            Stat::Top5StolenBasesAvg => "top5-stolenBases-avg",
            Stat::Top5TotalBasesAvg => "top5-totalBases-avg",
            Stat::Elo => "elo",
            Stat::EloProb => "elo-prob",
        }
    }
}

/// A named model input such as `home-last10-avg-runs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Feature {
    pub side: Side,
    pub stat: Stat,
}

impl Feature {
    pub const fn new(side: Side, stat: Stat) -> Self {
        Self { side, stat }
    }

    pub const fn home(stat: Stat) -> Self {
        Self::new(Side::Home, stat)
    }

    pub const fn away(stat: Stat) -> Self {
        Self::new(Side::Away, stat)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.side.label(), self.stat.suffix())
    }
}

impl FromStr for Feature {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (side, rest) = if let Some(rest) = trimmed.strip_prefix("home-") {
            (Side::Home, rest)
        } else if let Some(rest) = trimmed.strip_prefix("away-") {
            (Side::Away, rest)
        } else {
            return Err(OracleError::Configuration(format!("unknown feature `{trimmed}`")));
        };
        Stat::ALL
            .iter()
            .find(|stat| stat.suffix() == rest)
            .map(|stat| Feature::new(side, *stat))
            .ok_or_else(|| OracleError::Configuration(format!("unknown feature `{trimmed}`")))
    }
}

impl TryFrom<String> for Feature {
    type Error = OracleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Feature> for String {
    fn from(value: Feature) -> Self {
        value.to_string()
    }
}

/// Per-side stats in the order every trained model lists them.
const MODEL_STATS: [Stat; 22] = [
    Stat::WinPercentage,
    Stat::StarterSeasonEra,
    Stat::StarterSeasonWinPercentage,
    Stat::Top5HrAvg,
    Stat::Last10Runs,
    Stat::Last10Ops,
    Stat::StarterSeasonWhip,
    Stat::Top5RbiAvg,
    Stat::Last10RunsAllowed,
    Stat::StarterSeasonAvg,
    Stat::Top5BattingAvg,
    Stat::StarterSeasonStrikePercentage,
    Stat::Last10Hits,
    Stat::Last10HitsAllowed,
    Stat::Last10Obp,
    Stat::Last10Avg,
    Stat::Last10Rbi,
    Stat::StarterSeasonRunsPer9,
    Stat::Top5StolenBasesAvg,
    Stat::Top5TotalBasesAvg,
    Stat::Last10Strikeouts,
    Stat::StarterCareerEra,
];

/// Column order of the training sheet, after its identifying columns.
const RECORD_LAYOUT: [(Side, Stat); 44] = [
    (Side::Home, Stat::WinPercentage),
    (Side::Away, Stat::WinPercentage),
    (Side::Home, Stat::Last10Runs),
    (Side::Home, Stat::Last10RunsAllowed),
    (Side::Away, Stat::Last10Runs),
    (Side::Away, Stat::Last10RunsAllowed),
    (Side::Home, Stat::Last10Hits),
    (Side::Home, Stat::Last10HitsAllowed),
    (Side::Away, Stat::Last10Hits),
    (Side::Away, Stat::Last10HitsAllowed),
    (Side::Home, Stat::Last10Ops),
    (Side::Away, Stat::Last10Ops),
    (Side::Home, Stat::Last10Strikeouts),
    (Side::Away, Stat::Last10Strikeouts),
    (Side::Home, Stat::Last10Obp),
    (Side::Away, Stat::Last10Obp),
    (Side::Home, Stat::Last10Avg),
    (Side::Away, Stat::Last10Avg),
    (Side::Home, Stat::Last10Rbi),
    (Side::Away, Stat::Last10Rbi),
    (Side::Home, Stat::StarterCareerEra),
    (Side::Away, Stat::StarterCareerEra),
    (Side::Home, Stat::StarterSeasonEra),
    (Side::Away, Stat::StarterSeasonEra),
    (Side::Home, Stat::StarterSeasonAvg),
    (Side::Away, Stat::StarterSeasonAvg),
    (Side::Home, Stat::StarterSeasonRunsPer9),
    (Side::Away, Stat::StarterSeasonRunsPer9),
    (Side::Home, Stat::StarterSeasonWinPercentage),
    (Side::Away, Stat::StarterSeasonWinPercentage),
    (Side::Home, Stat::StarterSeasonWhip),
    (Side::Away, Stat::StarterSeasonWhip),
    (Side::Home, Stat::StarterSeasonStrikePercentage),
    (Side::Away, Stat::StarterSeasonStrikePercentage),
    (Side::Home, Stat::Top5HrAvg),
    (Side::Away, Stat::Top5HrAvg),
    (Side::Home, Stat::Top5RbiAvg),
    (Side::Away, Stat::Top5RbiAvg),
    (Side::Home, Stat::Top5BattingAvg),
    (Side::Away, Stat::Top5BattingAvg),
    (Side::Home, Stat::Top5StolenBasesAvg),
    (Side::Away, Stat::Top5StolenBasesAvg),
    (Side::Home, Stat::Top5TotalBasesAvg),
    (Side::Away, Stat::Top5TotalBasesAvg),
];

pub const ELO_FEATURES: [Feature; 3] = [
    Feature::home(Stat::Elo),
    Feature::away(Stat::Elo),
    Feature::home(Stat::EloProb),
];

/// The fixed, ordered set of features every assembled record carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    features: Vec<Feature>,
}

impl RecordSchema {
    pub fn base() -> Self {
        Self {
            features: RECORD_LAYOUT
                .iter()
                .map(|(side, stat)| Feature::new(*side, *stat))
                .collect(),
        }
    }

    /// Base schema plus the rating-table features.
    pub fn with_elo() -> Self {
        let mut schema = Self::base();
        schema.features.extend(ELO_FEATURES);
        schema
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// `order1` interleaves home and away per stat; `order2` lists every home
/// feature before every away feature.
pub fn named_order(name: &str) -> Option<Vec<Feature>> {
    match name.trim() {
        "order1" => Some(
            MODEL_STATS
                .iter()
                .flat_map(|stat| [Feature::home(*stat), Feature::away(*stat)])
                .collect(),
        ),
        "order2" => Some(
            Side::BOTH
                .iter()
                .flat_map(|side| MODEL_STATS.iter().map(|stat| Feature::new(*side, *stat)))
                .collect(),
        ),
        _ => None,
    }
}

/// A game's complete feature set in schema order. Features whose fragment had
/// no data are present with `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FeatureRecord {
    pub game_id: u64,
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub did_home_win: Option<bool>,
    pub values: Vec<(Feature, Option<f64>)>,
}

impl FeatureRecord {
    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.values
            .iter()
            .find(|(f, _)| *f == feature)
            .and_then(|(_, v)| *v)
    }

    pub fn has(&self, feature: Feature) -> bool {
        self.values.iter().any(|(f, _)| *f == feature)
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|(_, v)| v.is_none()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn feature_names_round_trip() {
        let f: Feature = "away-top5-stolenBases-avg".parse().unwrap();
        assert_eq!(f, Feature::away(Stat::Top5StolenBasesAvg));
        assert_eq!(f.to_string(), "away-top5-stolenBases-avg");
        assert!("home-bogus".parse::<Feature>().is_err());
        assert!("neutral-elo".parse::<Feature>().is_err());
    }

    #[test]
    fn orders_cover_the_base_schema() {
        let base: HashSet<Feature> = RecordSchema::base().features().iter().copied().collect();
        assert_eq!(base.len(), 44);
        for name in ["order1", "order2"] {
            let order = named_order(name).unwrap();
            assert_eq!(order.len(), 44, "{name}");
            let set: HashSet<Feature> = order.iter().copied().collect();
            assert_eq!(set, base, "{name}");
        }
        assert!(named_order("order3").is_none());
    }

    #[test]
    fn order_layouts() {
        let order1 = named_order("order1").unwrap();
        assert_eq!(order1[0].to_string(), "home-win-percentage");
        assert_eq!(order1[1].to_string(), "away-win-percentage");
        assert_eq!(order1[43].to_string(), "away-starter-career-era");

        let order2 = named_order("order2").unwrap();
        assert_eq!(order2[21].to_string(), "home-starter-career-era");
        assert_eq!(order2[22].to_string(), "away-win-percentage");
    }

    #[test]
    fn elo_schema_extends_base() {
        let schema = RecordSchema::with_elo();
        assert_eq!(schema.len(), 47);
        assert!(schema.contains(Feature::home(Stat::EloProb)));
        assert!(!RecordSchema::base().contains(Feature::away(Stat::Elo)));
    }
}
