//! One daily run: reconcile what finished, predict what is scheduled today,
//! queue the day's publish jobs.

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::assemble::FeatureBuilder;
use crate::elo::EloTable;
use crate::error::Result;
use crate::game::GameStatus;
use crate::ids::Resolver;
use crate::ledger::{Ledger, PredictionRecord};
use crate::odds_fetch::{OddsSnapshot, OddsSource};
use crate::predict::{ModelRegistry, PredictConfig, Prediction, Predictor};
use crate::publish::{PublishJob, PublishQueue, PublishWindow, line_for};
use crate::reconcile::{ReconcileReport, reconcile};
use crate::stats_api::StatsProvider;

#[derive(Debug, Default)]
pub struct CycleReport {
    pub date: Option<NaiveDate>,
    pub reconciled: ReconcileReport,
    pub scheduled_games: usize,
    pub predicted: usize,
    /// Same-day rows already in the ledger and not yet published.
    pub requeued: usize,
    pub skipped: Vec<(u64, String)>,
    pub odds_available: bool,
}

pub struct DailyCycle<'a> {
    pub provider: &'a dyn StatsProvider,
    pub resolver: &'a Resolver,
    pub elo: Option<&'a EloTable>,
    pub models: &'a ModelRegistry,
    pub model: &'a str,
    pub odds: &'a dyn OddsSource,
    pub odds_tolerance_secs: i64,
    pub ledger: &'a Ledger,
    pub predict: PredictConfig,
    pub window: PublishWindow,
}

impl DailyCycle<'_> {
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.window.tz).date_naive()
    }

    /// A ledger failure or a configuration-class error aborts the run; any
    /// other per-game failure only drops that game.
    pub fn run(&self, now: DateTime<Utc>, queue: &mut PublishQueue) -> Result<CycleReport> {
        let today = self.today(now);
        let mut report = CycleReport {
            date: Some(today),
            ..CycleReport::default()
        };

        report.reconciled = reconcile(self.ledger, self.provider, today - Duration::days(1))?;
        if report.reconciled.updated > 0 {
            info!("yesterday: {}", report.reconciled);
        }

        queue.retain_date(today);
        let mut existing: HashSet<u64> = HashSet::new();
        for row in self.ledger.read_all()?.iter().filter(|r| r.date == today) {
            existing.insert(row.game_id);
            if let Some(job) = PublishJob::from_record(row) {
                queue.schedule(job);
                report.requeued += 1;
            }
        }

        // Fail fast on a bad model before touching the network per game.
        self.models.get(self.model)?;

        let schedule = self.provider.schedule_on(today)?;
        report.scheduled_games = schedule.len();
        let candidates: Vec<_> = schedule
            .into_iter()
            .filter(|g| g.status == GameStatus::Scheduled && !existing.contains(&g.game_id))
            .collect();

        let builder = FeatureBuilder::new(self.provider, self.resolver, self.elo);
        let predictor = Predictor::new(self.provider, builder, self.models, self.predict);
        let results: Vec<(u64, Result<Prediction>)> = candidates
            .into_par_iter()
            .map(|game| (game.game_id, predictor.predict_game(game, self.model)))
            .collect();

        let mut predictions = Vec::with_capacity(results.len());
        for (game_id, result) in results {
            match result {
                Ok(prediction) => predictions.push(prediction),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(game_id, "skipping game this cycle: {err}");
                    report.skipped.push((game_id, err.to_string()));
                }
            }
        }
        predictions.sort_by_key(|p| (p.game.datetime, p.game.game_id));

        let odds = match self.odds.todays_odds() {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!("continuing without odds: {err}");
                None
            }
        };
        report.odds_available = odds.is_some();

        let records = self.records(&predictions, odds.as_ref(), now);
        let jobs: Vec<PublishJob> = records.iter().filter_map(PublishJob::from_record).collect();
        report.predicted = self.ledger.append(records)?;
        for job in jobs {
            queue.schedule(job);
        }
        info!(
            %today,
            predicted = report.predicted,
            requeued = report.requeued,
            skipped = report.skipped.len(),
            pending_jobs = queue.len(),
            "daily cycle complete"
        );
        Ok(report)
    }

    fn records(&self, predictions: &[Prediction], odds: Option<&OddsSnapshot>, now: DateTime<Utc>) -> Vec<PredictionRecord> {
        predictions
            .iter()
            .enumerate()
            .map(|(slot, prediction)| {
                let game_odds = odds.and_then(|snapshot| {
                    snapshot
                        .for_game(&prediction.game, self.odds_tolerance_secs)
                        .map(|o| (o, snapshot.retrieved_at))
                });
                let mut record = PredictionRecord::new(prediction, game_odds, now);
                record.publish_line = line_for(&record, self.resolver);
                record.time_to_publish = Some(self.window.publish_time(prediction.game.date, now, slot));
                record
            })
            .collect()
    }
}
