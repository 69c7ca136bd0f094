use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::error::Result;
use crate::game::{GameContext, Side};
use crate::ledger::{Ledger, PredictionRecord};
use crate::stats_api::StatsProvider;

/// A correctly called underdog win.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsetCall {
    pub winner: String,
    pub winner_odds: i32,
    pub loser: String,
    pub loser_odds: i32,
    pub magnitude: i32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    /// Rows that were pending before this pass.
    pub pending: usize,
    /// Rows finalized by this pass.
    pub updated: usize,
    pub correct: usize,
    /// Finalized rows with an actual winner.
    pub decided: usize,
    pub biggest_upset: Option<UpsetCall>,
}

impl ReconcileReport {
    /// Whole-number accuracy over `decided` games, rounded to two decimals
    /// first. Ties and finals reported without a score are left out of the
    /// denominator rather than counted as misses.
    pub fn percentage(&self) -> Option<u32> {
        if self.decided == 0 {
            return None;
        }
        let ratio = self.correct as f64 / self.decided as f64;
        Some(((ratio * 100.0).round()) as u32)
    }

    fn record(&mut self, outcome: &Outcome) {
        self.updated += 1;
        let Some(correct) = outcome.correct else {
            return;
        };
        self.decided += 1;
        if !correct {
            return;
        }
        self.correct += 1;
        if let Some(upset) = &outcome.upset {
            let bigger = self
                .biggest_upset
                .as_ref()
                .is_none_or(|best| upset.magnitude > best.magnitude);
            if bigger {
                self.biggest_upset = Some(upset.clone());
            }
        }
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.percentage() {
            Some(pct) => write!(f, "{pct}% ({}/{}) correct", self.correct, self.decided)?,
            None => write!(f, "no decided games")?,
        }
        if let Some(upset) = &self.biggest_upset {
            write!(
                f,
                "; best pick {} (+{}) over {} ({})",
                upset.winner, upset.winner_odds, upset.loser, upset.loser_odds
            )?;
        }
        Ok(())
    }
}

/// How far both prices sit from even money, counted only for an underdog
/// winner.
pub fn upset_magnitude(winner_odds: i32, loser_odds: i32) -> Option<i32> {
    if winner_odds <= 100 {
        return None;
    }
    Some((winner_odds.abs() - 100) + (loser_odds.abs() - 100))
}

#[derive(Debug, Clone, PartialEq)]
struct Outcome {
    correct: Option<bool>,
    upset: Option<UpsetCall>,
}

/// Writes a final game's result into its row. Returns `None` and leaves the
/// row untouched while the game is not final.
fn apply_outcome(record: &mut PredictionRecord, game: &GameContext) -> Option<Outcome> {
    if !game.is_final() || record.is_reconciled() {
        return None;
    }
    let winner = game.winner_side();
    let correct = winner.map(|side| record.team(side) == record.predicted_winner);

    record.prediction_accuracy = correct.map(|c| if c { 1.0 } else { 0.0 });
    record.home_score = game.home_score;
    record.away_score = game.away_score;
    record.winning_pitcher = game.winning_pitcher.clone();
    record.losing_pitcher = game.losing_pitcher.clone();
    if game.datetime.is_some() {
        record.datetime = game.datetime;
    }
    record.summary = game.summary();

    let upset = match (winner, correct) {
        (Some(side), Some(true)) => upset_for(record, side),
        _ => None,
    };
    Some(Outcome { correct, upset })
}

fn upset_for(record: &PredictionRecord, winner: Side) -> Option<UpsetCall> {
    let winner_odds = record.odds(winner)?;
    let loser_odds = record.odds(winner.other())?;
    let magnitude = upset_magnitude(winner_odds, loser_odds)?;
    Some(UpsetCall {
        winner: record.team(winner).to_string(),
        winner_odds,
        loser: record.team(winner.other()).to_string(),
        loser_odds,
        magnitude,
    })
}

/// Finalizes every pending row dated on or before `through`. Games are
/// fetched outside the ledger lock; rows that changed in between are matched
/// again by key, and rows already finalized are never touched twice.
pub fn reconcile(ledger: &Ledger, provider: &dyn StatsProvider, through: NaiveDate) -> Result<ReconcileReport> {
    let pending: Vec<(u64, NaiveDate)> = ledger
        .read_all()?
        .iter()
        .filter(|r| r.date <= through && !r.is_reconciled())
        .map(PredictionRecord::key)
        .collect();

    let mut games: HashMap<u64, GameContext> = HashMap::new();
    for (game_id, _) in &pending {
        if games.contains_key(game_id) {
            continue;
        }
        match provider.game(*game_id) {
            Ok(game) => {
                games.insert(*game_id, game);
            }
            Err(err) => warn!(game_id, "could not fetch game for reconciliation: {err}"),
        }
    }

    let mut report = ReconcileReport {
        pending: pending.len(),
        ..ReconcileReport::default()
    };
    ledger.update(|rows| {
        for row in rows.iter_mut() {
            if !pending.contains(&row.key()) {
                continue;
            }
            let Some(game) = games.get(&row.game_id) else {
                continue;
            };
            if let Some(outcome) = apply_outcome(row, game) {
                info!(
                    game_id = row.game_id,
                    predicted = %row.predicted_winner,
                    actual = game.winning_team().unwrap_or("none"),
                    accuracy = ?row.prediction_accuracy,
                    "reconciled prediction"
                );
                report.record(&outcome);
            }
        }
    })?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameStatus;
    use crate::game::tests::sample_game;
    use crate::ledger::tests::sample_record;

    fn final_game(home: u32, away: u32) -> GameContext {
        let mut game = sample_game(1, "2024-06-01", (147, "New York Yankees"), (111, "Boston Red Sox"));
        game.status = GameStatus::Final;
        game.home_score = Some(home);
        game.away_score = Some(away);
        game.winning_pitcher = Some("Gerrit Cole".to_string());
        game.losing_pitcher = Some("Brayan Bello".to_string());
        game
    }

    #[test]
    fn correct_upset_is_tracked() {
        let mut record = sample_record(1, "2024-06-01", Side::Away);
        record.home_odds = Some(-150);
        record.away_odds = Some(135);
        let outcome = apply_outcome(&mut record, &final_game(2, 4)).unwrap();
        assert_eq!(outcome.correct, Some(true));
        assert_eq!(record.prediction_accuracy, Some(1.0));
        assert_eq!(record.winning_pitcher.as_deref(), Some("Gerrit Cole"));
        assert_eq!(outcome.upset.map(|u| u.magnitude), Some(85));
    }

    #[test]
    fn favourite_win_is_not_an_upset() {
        let mut record = sample_record(1, "2024-06-01", Side::Home);
        record.home_odds = Some(-150);
        record.away_odds = Some(135);
        let outcome = apply_outcome(&mut record, &final_game(5, 1)).unwrap();
        assert_eq!(outcome.correct, Some(true));
        assert!(outcome.upset.is_none());
        assert_eq!(upset_magnitude(100, -100), None);
    }

    #[test]
    fn wrong_pick_scores_zero_and_second_pass_is_noop() {
        let mut record = sample_record(1, "2024-06-01", Side::Home);
        let game = final_game(1, 3);
        assert_eq!(apply_outcome(&mut record, &game).unwrap().correct, Some(false));
        assert_eq!(record.prediction_accuracy, Some(0.0));
        let snapshot = record.clone();
        assert!(apply_outcome(&mut record, &game).is_none());
        assert_eq!(record, snapshot);
    }

    #[test]
    fn scoreless_final_is_finalized_once() {
        let mut record = sample_record(1, "2024-06-01", Side::Home);
        let mut game = sample_game(1, "2024-06-01", (147, "New York Yankees"), (111, "Boston Red Sox"));
        game.status = GameStatus::Final;
        assert!(!record.is_reconciled());

        let outcome = apply_outcome(&mut record, &game).unwrap();
        assert_eq!(outcome.correct, None);
        assert_eq!(record.prediction_accuracy, None);
        assert_eq!(record.summary, "2024-06-01 - Boston Red Sox @ New York Yankees (Final)");
        assert!(record.is_reconciled());
        assert!(apply_outcome(&mut record, &game).is_none());
    }

    #[test]
    fn scheduled_game_leaves_row_untouched() {
        let mut record = sample_record(1, "2024-06-01", Side::Home);
        let before = record.clone();
        let game = sample_game(1, "2024-06-01", (147, "New York Yankees"), (111, "Boston Red Sox"));
        assert!(apply_outcome(&mut record, &game).is_none());
        assert_eq!(record, before);
    }

    #[test]
    fn report_percentage_and_display() {
        let report = ReconcileReport {
            pending: 3,
            updated: 3,
            correct: 2,
            decided: 3,
            biggest_upset: None,
        };
        assert_eq!(report.percentage(), Some(67));
        assert_eq!(report.to_string(), "67% (2/3) correct");
        assert_eq!(ReconcileReport::default().percentage(), None);
    }

    #[test]
    fn tie_is_left_out_of_the_percentage() {
        let mut report = ReconcileReport::default();
        for correct in [Some(true), Some(false), None] {
            report.record(&Outcome { correct, upset: None });
        }
        assert_eq!((report.updated, report.decided, report.correct), (3, 2, 1));
        assert_eq!(report.percentage(), Some(50));
        assert_eq!(report.to_string(), "50% (1/2) correct");
    }
}
