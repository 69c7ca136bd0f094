use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::error::Result;
use crate::fragment::{FeatureFragment, FragmentKind};
use crate::game::{GameContext, Side};
use crate::schema::{Feature, Stat};
use crate::stats_api::{StatsProvider, TeamBoxStats};

const WINDOW_START_DAYS: i64 = 11;

/// `[date - 11, date - 1]`, so the game day itself never counts.
pub fn form_window(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    (
        date - Duration::days(WINDOW_START_DAYS),
        date - Duration::days(1),
    )
}

/// Rolling-window averages for both teams.
pub fn form_fragment(game: &GameContext, provider: &dyn StatsProvider) -> Result<FeatureFragment> {
    let (start, end) = form_window(game.date);
    let mut values = Vec::with_capacity(18);
    for side in Side::BOTH {
        let team_id = game.team(side).id;
        let games = provider.team_schedule(team_id, start, end)?;
        let mut seen = HashSet::new();
        let qualifying: Vec<&GameContext> = games
            .iter()
            .filter(|g| g.counts_for_form() && g.is_final())
            .filter(|g| g.date >= start && g.date <= end)
            .filter(|g| seen.insert(g.game_id))
            .collect();
        debug!(
            game_id = game.game_id,
            team = %game.team(side).name,
            games = qualifying.len(),
            "form window"
        );

        let mut boxes = Vec::with_capacity(qualifying.len());
        for g in qualifying {
            boxes.push(provider.team_box_stats(g.game_id, team_id)?);
        }
        values.extend(
            reduce_form(&boxes)
                .into_iter()
                .map(|(stat, value)| (Feature::new(side, stat), value)),
        );
    }
    Ok(FeatureFragment::new(FragmentKind::Last10, values))
}

/// Arithmetic mean of each metric across the window. Every metric is `None`
/// when the window is empty; a metric missing from some boxscores is averaged
/// over the games that report it.
pub fn reduce_form(boxes: &[TeamBoxStats]) -> [(Stat, Option<f64>); 9] {
    let mean = |pick: fn(&TeamBoxStats) -> Option<f64>| -> Option<f64> {
        let present: Vec<f64> = boxes.iter().filter_map(pick).collect();
        if present.is_empty() {
            None
        } else {
            Some(present.iter().sum::<f64>() / present.len() as f64)
        }
    };
    [
        (Stat::Last10Runs, mean(|b| b.runs)),
        (Stat::Last10RunsAllowed, mean(|b| b.runs_allowed)),
        (Stat::Last10Hits, mean(|b| b.hits)),
        (Stat::Last10HitsAllowed, mean(|b| b.hits_allowed)),
        (Stat::Last10Ops, mean(|b| b.ops)),
        (Stat::Last10Strikeouts, mean(|b| b.strikeouts)),
        (Stat::Last10Obp, mean(|b| b.obp_allowed)),
        (Stat::Last10Avg, mean(|b| b.avg)),
        (Stat::Last10Rbi, mean(|b| b.rbi)),
    ]
}
