use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::America::New_York;
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::ids::Resolver;
use crate::ledger::{Ledger, PredictionRecord};
use crate::odds_fetch::format_american;

/// Daily publish time in the league's home timezone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PublishWindow {
    pub hour: u32,
    pub minute: u32,
    pub tz: Tz,
    /// Gap between consecutive jobs of one batch.
    pub stagger: Duration,
}

impl Default for PublishWindow {
    fn default() -> Self {
        Self {
            hour: 9,
            minute: 45,
            tz: New_York,
            stagger: Duration::from_secs(5),
        }
    }
}

impl PublishWindow {
    /// When the `slot`-th job of `date` fires. Once the window has passed the
    /// batch goes out a minute from `now`.
    pub fn publish_time(&self, date: NaiveDate, now: DateTime<Utc>, slot: usize) -> DateTime<Utc> {
        let offset = chrono::Duration::from_std(self.stagger * slot as u32).unwrap_or_default();
        let target = date
            .and_hms_opt(self.hour, self.minute, 0)
            .and_then(|naive| self.tz.from_local_datetime(&naive).earliest())
            .map(|local| local.with_timezone(&Utc));
        match target {
            Some(target) if target > now => target + offset,
            _ => now + chrono::Duration::minutes(1) + offset,
        }
    }
}

/// `NYY (-150) to defeat BOS (+135)`; a side without odds drops its
/// parenthesis.
pub fn publish_line(winner: &str, winner_odds: Option<i32>, loser: &str, loser_odds: Option<i32>) -> String {
    let part = |abbr: &str, odds: Option<i32>| match odds {
        Some(price) => format!("{abbr} ({})", format_american(price)),
        None => abbr.to_string(),
    };
    format!("{} to defeat {}", part(winner, winner_odds), part(loser, loser_odds))
}

pub fn line_for(record: &PredictionRecord, resolver: &Resolver) -> String {
    let winner = record.predicted_side();
    let abbr = |name: &str| {
        resolver
            .abbreviation(name)
            .map(str::to_string)
            .unwrap_or_else(|_| name.to_string())
    };
    publish_line(
        &abbr(record.team(winner)),
        record.odds(winner),
        &abbr(record.team(winner.other())),
        record.odds(winner.other()),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishJob {
    pub game_id: u64,
    pub date: NaiveDate,
    pub at: DateTime<Utc>,
    pub line: String,
}

impl PublishJob {
    pub fn from_record(record: &PredictionRecord) -> Option<Self> {
        if record.published || record.publish_line.is_empty() {
            return None;
        }
        Some(Self {
            game_id: record.game_id,
            date: record.date,
            at: record.time_to_publish?,
            line: record.publish_line.clone(),
        })
    }
}

/// Pending publish jobs, at most one per game id.
#[derive(Debug, Default)]
pub struct PublishQueue {
    jobs: BTreeMap<u64, PublishJob>,
}

impl PublishQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `job`, replacing any job already pending for the same game.
    /// Returns the superseded job.
    pub fn schedule(&mut self, job: PublishJob) -> Option<PublishJob> {
        let replaced = self.jobs.insert(job.game_id, job);
        if let Some(old) = &replaced {
            debug!(game_id = old.game_id, "superseded pending publish job");
        }
        replaced
    }

    pub fn cancel(&mut self, game_id: u64) -> Option<PublishJob> {
        self.jobs.remove(&game_id)
    }

    /// Drops every job not dated `date`.
    pub fn retain_date(&mut self, date: NaiveDate) {
        self.jobs.retain(|_, job| job.date == date);
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.jobs.values().map(|j| j.at).min()
    }

    pub fn jobs(&self) -> impl Iterator<Item = &PublishJob> {
        self.jobs.values()
    }

    /// Removes and returns the jobs due at `now`, earliest first.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<PublishJob> {
        let due: Vec<u64> = self
            .jobs
            .values()
            .filter(|j| j.at <= now)
            .map(|j| j.game_id)
            .collect();
        let mut out: Vec<PublishJob> = due.iter().filter_map(|id| self.jobs.remove(id)).collect();
        out.sort_by_key(|j| j.at);
        out
    }
}

pub trait Publisher: Send + Sync {
    fn publish(&self, job: &PublishJob) -> Result<()>;
}

/// Writes each line to the log instead of a social feed.
#[derive(Debug, Default)]
pub struct LogPublisher;

impl Publisher for LogPublisher {
    fn publish(&self, job: &PublishJob) -> Result<()> {
        info!(game_id = job.game_id, "{}", job.line);
        Ok(())
    }
}

/// Publishes every due job and marks its row. A job that fails is put back
/// for the next run.
pub fn run_due(queue: &mut PublishQueue, publisher: &dyn Publisher, ledger: &Ledger, now: DateTime<Utc>) -> Result<usize> {
    let mut sent = 0usize;
    for job in queue.take_due(now) {
        match publisher.publish(&job) {
            Ok(()) => {
                ledger.mark_published(job.game_id, job.date)?;
                sent += 1;
            }
            Err(err) => {
                warn!(game_id = job.game_id, "publish failed: {err}");
                queue.schedule(job);
            }
        }
    }
    Ok(sent)
}
