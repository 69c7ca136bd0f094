use tracing::debug;

use crate::error::Result;
use crate::fragment::{FeatureFragment, FragmentKind};
use crate::game::{GameContext, Side};
use crate::schema::{Feature, Stat};
use crate::stats_api::{LeaderCategory, StatsProvider};

pub const TOP_N: usize = 5;

fn stat_for(category: LeaderCategory) -> Stat {
    match category {
        LeaderCategory::HomeRuns => Stat::Top5HrAvg,
        LeaderCategory::RunsBattedIn => Stat::Top5RbiAvg,
        LeaderCategory::BattingAverage => Stat::Top5BattingAvg,
        LeaderCategory::StolenBases => Stat::Top5StolenBasesAvg,
        LeaderCategory::TotalBases => Stat::Top5TotalBasesAvg,
    }
}

/// Mean of the top five team leaders per category. A team that has not yet
/// completed a game this season is measured on last season's leaders.
pub fn leaders_fragment(game: &GameContext, provider: &dyn StatsProvider) -> Result<FeatureFragment> {
    let mut values = Vec::with_capacity(10);
    for side in Side::BOTH {
        let team_id = game.team(side).id;
        let season = leader_season(game, team_id, provider)?;
        for category in LeaderCategory::ALL {
            let leaders = provider.team_leaders(team_id, category, season)?;
            values.push((Feature::new(side, stat_for(category)), top_n_mean(&leaders, TOP_N)));
        }
    }
    Ok(FeatureFragment::new(FragmentKind::Leaders, values))
}

fn leader_season(game: &GameContext, team_id: u32, provider: &dyn StatsProvider) -> Result<i32> {
    let season = game.season();
    if provider.last_game(team_id, game.date)?.is_some() {
        return Ok(season);
    }
    debug!(game_id = game.game_id, team_id, "first game of season, using prior season leaders");
    Ok(season - 1)
}

/// `None` unless at least `n` values exist; a short list is no signal rather
/// than a mean over fewer players.
pub fn top_n_mean(values: &[f64], n: usize) -> Option<f64> {
    if n == 0 || values.len() < n {
        return None;
    }
    Some(values[..n].iter().sum::<f64>() / n as f64)
}
