use tracing::debug;

use crate::error::Result;
use crate::fragment::{FeatureFragment, FragmentKind};
use crate::game::{GameContext, Side};
use crate::schema::{Feature, Stat};
use crate::stats_api::{PitchingLine, SeasonPitching, StatsProvider};

/// Starting-pitcher features for whichever sides list a probable starter.
pub fn pitcher_fragment(game: &GameContext, provider: &dyn StatsProvider) -> Result<FeatureFragment> {
    let season = game.season();
    let mut values = Vec::with_capacity(14);
    for side in Side::BOTH {
        let Some(name) = game.probable(side) else {
            debug!(game_id = game.game_id, side = side.label(), "no probable pitcher");
            continue;
        };
        let Some(player_id) = provider.lookup_player(name, season)? else {
            debug!(game_id = game.game_id, pitcher = name, season, "pitcher not found");
            continue;
        };
        let seasons = provider.pitching_year_by_year(player_id)?;
        let Some(career) = provider.pitching_career(player_id)? else {
            debug!(game_id = game.game_id, pitcher = name, "no career pitching line");
            continue;
        };
        let season_line = season_line(&seasons, season);
        values.extend(
            starter_values(season_line, &career)
                .into_iter()
                .map(|(stat, value)| (Feature::new(side, stat), value)),
        );
    }
    Ok(FeatureFragment::new(FragmentKind::Pitcher, values))
}

/// The pitcher's line for `season`. With several splits for one season (a
/// mid-season trade) the latest wins.
pub fn season_line(seasons: &[SeasonPitching], season: i32) -> Option<PitchingLine> {
    seasons
        .iter()
        .rev()
        .find(|s| s.season == season && !s.line.is_empty())
        .map(|s| s.line)
}

/// Career ERA plus the season-labelled metrics. Without a season line every
/// season metric comes from the career line together, never field by field.
pub fn starter_values(season: Option<PitchingLine>, career: &PitchingLine) -> [(Stat, Option<f64>); 7] {
    let source = season.unwrap_or(*career);
    [
        (Stat::StarterCareerEra, career.era),
        (Stat::StarterSeasonEra, source.era),
        (Stat::StarterSeasonAvg, source.avg),
        (Stat::StarterSeasonRunsPer9, source.runs_per9),
        (Stat::StarterSeasonWhip, source.whip),
        (Stat::StarterSeasonStrikePercentage, source.strike_percentage),
        (Stat::StarterSeasonWinPercentage, source.win_percentage),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_provider::FakeStatsProvider;
    use crate::game::tests::sample_game;

    const STARTER_STATS: [Stat; 7] = [
        Stat::StarterCareerEra,
        Stat::StarterSeasonEra,
        Stat::StarterSeasonAvg,
        Stat::StarterSeasonRunsPer9,
        Stat::StarterSeasonWhip,
        Stat::StarterSeasonStrikePercentage,
        Stat::StarterSeasonWinPercentage,
    ];

    fn game(home: Option<&str>, away: Option<&str>) -> GameContext {
        let mut game = sample_game(7, "2024-06-01", (147, "New York Yankees"), (111, "Boston Red Sox"));
        game.home_probable = home.map(str::to_string);
        game.away_probable = away.map(str::to_string);
        game
    }

    fn career() -> PitchingLine {
        PitchingLine {
            era: Some(3.85),
            avg: Some(0.241),
            runs_per9: Some(4.2),
            whip: Some(1.22),
            strike_percentage: Some(0.64),
            win_percentage: Some(0.55),
        }
    }

    #[test]
    fn missing_season_uses_career_for_every_field() {
        let career = career();
        let values = starter_values(None, &career);
        let get = |stat: Stat| values.iter().find(|(s, _)| *s == stat).unwrap().1;
        assert_eq!(get(Stat::StarterSeasonEra), career.era);
        assert_eq!(get(Stat::StarterSeasonAvg), career.avg);
        assert_eq!(get(Stat::StarterSeasonRunsPer9), career.runs_per9);
        assert_eq!(get(Stat::StarterSeasonWhip), career.whip);
        assert_eq!(get(Stat::StarterSeasonStrikePercentage), career.strike_percentage);
        assert_eq!(get(Stat::StarterSeasonWinPercentage), career.win_percentage);
    }

    #[test]
    fn partial_season_line_is_not_patched_from_career() {
        let season = PitchingLine {
            era: Some(2.10),
            ..PitchingLine::default()
        };
        let values = starter_values(Some(season), &career());
        let get = |stat: Stat| values.iter().find(|(s, _)| *s == stat).unwrap().1;
        assert_eq!(get(Stat::StarterSeasonEra), Some(2.10));
        assert_eq!(get(Stat::StarterSeasonWhip), None);
        assert_eq!(get(Stat::StarterCareerEra), Some(3.85));
    }

    #[test]
    fn season_line_picks_latest_split() {
        let first = PitchingLine {
            era: Some(5.0),
            ..PitchingLine::default()
        };
        let second = PitchingLine {
            era: Some(2.0),
            ..PitchingLine::default()
        };
        let seasons = vec![
            SeasonPitching { season: 2023, line: career() },
            SeasonPitching { season: 2024, line: first },
            SeasonPitching { season: 2024, line: second },
            SeasonPitching { season: 2024, line: PitchingLine::default() },
        ];
        assert_eq!(season_line(&seasons, 2024).unwrap().era, Some(2.0));
        assert!(season_line(&seasons, 2025).is_none());
    }

    #[test]
    fn fragment_fills_only_the_side_with_a_starter() {
        let provider = FakeStatsProvider::new().with_pitcher(
            "Gerrit Cole",
            543_037,
            vec![SeasonPitching {
                season: 2024,
                line: PitchingLine {
                    era: Some(2.10),
                    ..career()
                },
            }],
            Some(career()),
        );
        let fragment = pitcher_fragment(&game(Some("Gerrit Cole"), None), &provider).unwrap();
        assert_eq!(fragment.len(), STARTER_STATS.len());
        for stat in STARTER_STATS {
            assert!(matches!(fragment.get(Feature::home(stat)), Some(Some(_))), "{stat:?}");
            assert_eq!(fragment.get(Feature::away(stat)), None);
        }
        assert_eq!(fragment.get(Feature::home(Stat::StarterSeasonEra)), Some(Some(2.10)));
        assert_eq!(fragment.get(Feature::home(Stat::StarterCareerEra)), Some(Some(3.85)));
    }

    #[test]
    fn unknown_pitcher_and_missing_career_skip_their_side() {
        // Rookie has no season line for 2024 and no career line either.
        let provider = FakeStatsProvider::new().with_pitcher("Rookie Arm", 1, Vec::new(), None);
        let fragment = pitcher_fragment(&game(Some("Nobody Known"), Some("Rookie Arm")), &provider).unwrap();
        assert!(fragment.is_empty());
    }
}
