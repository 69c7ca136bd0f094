use std::collections::HashMap;

use tracing::debug;

use crate::elo::{EloTable, elo_fragment};
use crate::error::{OracleError, Result};
use crate::form::form_fragment;
use crate::fragment::{FeatureFragment, FragmentKind};
use crate::game::{GameContext, Side};
use crate::ids::Resolver;
use crate::leaders::leaders_fragment;
use crate::pitching::pitcher_fragment;
use crate::schema::{Feature, FeatureRecord, RecordSchema};
use crate::standings::win_pct_fragment;
use crate::stats_api::StatsProvider;

/// Merges fragments into one schema-complete record. A feature produced by two
/// fragments, or one the schema does not know, is a configuration defect.
pub fn assemble(
    game: &GameContext,
    schema: &RecordSchema,
    fragments: &[FeatureFragment],
) -> Result<FeatureRecord> {
    let mut merged: HashMap<Feature, (FragmentKind, Option<f64>)> = HashMap::new();
    for fragment in fragments {
        for (feature, value) in fragment.values() {
            if !schema.contains(*feature) {
                return Err(OracleError::Configuration(format!(
                    "{} fragment produced `{feature}` which is not in the record schema",
                    fragment.kind()
                )));
            }
            if let Some((first, _)) = merged.insert(*feature, (fragment.kind(), *value)) {
                return Err(OracleError::Configuration(format!(
                    "`{feature}` produced by both {first} and {} fragments",
                    fragment.kind()
                )));
            }
        }
    }

    let values = schema
        .features()
        .iter()
        .map(|f| (*f, merged.get(f).and_then(|(_, v)| *v)))
        .collect();

    Ok(FeatureRecord {
        game_id: game.game_id,
        date: game.date,
        home_team: game.home.name.clone(),
        away_team: game.away.name.clone(),
        did_home_win: game.winner_side().map(|side| side == Side::Home),
        values,
    })
}

/// Runs every aggregator for a game and assembles the result.
pub struct FeatureBuilder<'a> {
    provider: &'a dyn StatsProvider,
    resolver: &'a Resolver,
    elo: Option<&'a EloTable>,
    schema: RecordSchema,
}

impl<'a> FeatureBuilder<'a> {
    pub fn new(provider: &'a dyn StatsProvider, resolver: &'a Resolver, elo: Option<&'a EloTable>) -> Self {
        let schema = if elo.is_some() {
            RecordSchema::with_elo()
        } else {
            RecordSchema::base()
        };
        Self {
            provider,
            resolver,
            elo,
            schema,
        }
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    pub fn fragments(&self, game: &GameContext) -> Result<Vec<FeatureFragment>> {
        let mut fragments = vec![
            win_pct_fragment(game, self.resolver, self.provider)?,
            form_fragment(game, self.provider)?,
            pitcher_fragment(game, self.provider)?,
            leaders_fragment(game, self.provider)?,
        ];
        if let Some(table) = self.elo {
            fragments.push(elo_fragment(game, self.resolver, table)?);
        }
        Ok(fragments)
    }

    /// Any aggregator failure abandons the whole record; configuration-class
    /// errors pass through unchanged.
    pub fn build(&self, game: &GameContext) -> Result<FeatureRecord> {
        let fragments = self
            .fragments(game)
            .map_err(|err| err.into_unavailable(game.game_id))?;
        let record = assemble(game, &self.schema, &fragments)?;
        debug!(
            game_id = game.game_id,
            nulls = record.null_count(),
            "assembled feature record"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tests::sample_game;
    use crate::schema::Stat;

    fn game() -> GameContext {
        sample_game(9, "2024-06-01", (1, "A"), (2, "B"))
    }

    #[test]
    fn missing_fragments_stay_null() {
        let schema = RecordSchema::base();
        let fragments = vec![FeatureFragment::new(
            FragmentKind::WinPct,
            [
                (Feature::home(Stat::WinPercentage), Some(0.556)),
                (Feature::away(Stat::WinPercentage), Some(0.5)),
            ],
        )];
        let record = assemble(&game(), &schema, &fragments).unwrap();
        assert_eq!(record.values.len(), 44);
        assert_eq!(record.get(Feature::home(Stat::WinPercentage)), Some(0.556));
        assert!(record.has(Feature::home(Stat::Top5HrAvg)));
        assert_eq!(record.get(Feature::home(Stat::Top5HrAvg)), None);
        assert_eq!(record.null_count(), 42);
        assert_eq!(record.did_home_win, None);
    }

    #[test]
    fn duplicate_feature_is_configuration_error() {
        let schema = RecordSchema::base();
        let f = Feature::home(Stat::Last10Runs);
        let fragments = vec![
            FeatureFragment::new(FragmentKind::Last10, [(f, Some(4.0))]),
            FeatureFragment::new(FragmentKind::Leaders, [(f, Some(5.0))]),
        ];
        let err = assemble(&game(), &schema, &fragments).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn feature_outside_schema_is_configuration_error() {
        let fragments = vec![FeatureFragment::new(
            FragmentKind::Elo,
            [(Feature::home(Stat::Elo), Some(1500.0))],
        )];
        let err = assemble(&game(), &RecordSchema::base(), &fragments).unwrap_err();
        assert!(matches!(err, OracleError::Configuration(_)));
        assert!(assemble(&game(), &RecordSchema::with_elo(), &fragments).is_ok());
    }
}
