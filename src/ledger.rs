//! The prediction ledger: one CSV row per game per day.
//!
//! Every mutation is a locked read-modify-write of the whole file, committed
//! by an atomic rename. A sidecar `<ledger>.lock` file serialises writers
//! across processes.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::America::New_York;
use rust_xlsxwriter::{Workbook, Worksheet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{OracleError, Result};
use crate::game::Side;
use crate::odds_fetch::{GameOdds, format_american};
use crate::persist::write_atomic;
use crate::predict::Prediction;

/// How `GameContext::summary` ends for a finished game.
const FINAL_SUFFIX: &str = "(Final)";

pub const COLUMNS: [&str; 30] = [
    "prediction_accuracy",
    "date",
    "time",
    "home",
    "home_probable",
    "away",
    "away_probable",
    "predicted_winner",
    "model",
    "favorite",
    "home_odds",
    "home_odds_bookmaker",
    "away_odds",
    "away_odds_bookmaker",
    "home_score",
    "away_score",
    "winning_pitcher",
    "losing_pitcher",
    "prediction_value",
    "venue",
    "series_status",
    "national_broadcasts",
    "odds_retrieval_time",
    "prediction_generation_time",
    "datetime",
    "game_id",
    "summary",
    "publish_line",
    "time_to_publish",
    "published",
];

/// Field order is the on-disk column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub prediction_accuracy: Option<f64>,
    pub date: NaiveDate,
    /// Eastern first pitch, e.g. `07:05 pm`.
    pub time: Option<String>,
    pub home: String,
    pub home_probable: Option<String>,
    pub away: String,
    pub away_probable: Option<String>,
    pub predicted_winner: String,
    pub model: String,
    pub favorite: Option<String>,
    #[serde(with = "american")]
    pub home_odds: Option<i32>,
    pub home_odds_bookmaker: Option<String>,
    #[serde(with = "american")]
    pub away_odds: Option<i32>,
    pub away_odds_bookmaker: Option<String>,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub winning_pitcher: Option<String>,
    pub losing_pitcher: Option<String>,
    pub prediction_value: f64,
    pub venue: Option<String>,
    pub series_status: Option<String>,
    pub national_broadcasts: Option<String>,
    pub odds_retrieval_time: Option<DateTime<Utc>>,
    pub prediction_generation_time: DateTime<Utc>,
    pub datetime: Option<DateTime<Utc>>,
    pub game_id: u64,
    pub summary: String,
    pub publish_line: String,
    pub time_to_publish: Option<DateTime<Utc>>,
    pub published: bool,
}

impl PredictionRecord {
    /// A fresh, unreconciled and unpublished row. Odds fields stay empty when
    /// no snapshot is given.
    pub fn new(
        prediction: &Prediction,
        odds: Option<(&GameOdds, DateTime<Utc>)>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let game = &prediction.game;
        let side_odds = |side: Side| odds.and_then(|(o, _)| o.side(side).cloned());
        let home_odds = side_odds(Side::Home);
        let away_odds = side_odds(Side::Away);
        let broadcasts = game.national_broadcasts.join(", ");
        Self {
            prediction_accuracy: None,
            date: game.date,
            time: game
                .datetime
                .map(|dt| dt.with_timezone(&New_York).format("%I:%M %P").to_string()),
            home: game.home.name.clone(),
            home_probable: game.home_probable.clone(),
            away: game.away.name.clone(),
            away_probable: game.away_probable.clone(),
            predicted_winner: prediction.winner_name().to_string(),
            model: prediction.model.clone(),
            favorite: odds.and_then(|(o, _)| o.favorite.clone()),
            home_odds: home_odds.as_ref().map(|o| o.price),
            home_odds_bookmaker: home_odds.map(|o| o.bookmaker),
            away_odds: away_odds.as_ref().map(|o| o.price),
            away_odds_bookmaker: away_odds.map(|o| o.bookmaker),
            home_score: None,
            away_score: None,
            winning_pitcher: None,
            losing_pitcher: None,
            prediction_value: prediction.score,
            venue: game.venue.clone(),
            series_status: game.series_status.clone(),
            national_broadcasts: (!broadcasts.is_empty()).then_some(broadcasts),
            odds_retrieval_time: odds.map(|(_, at)| at),
            prediction_generation_time: generated_at,
            datetime: game.datetime,
            game_id: game.game_id,
            summary: game.summary(),
            publish_line: String::new(),
            time_to_publish: None,
            published: false,
        }
    }

    pub fn key(&self) -> (u64, NaiveDate) {
        (self.game_id, self.date)
    }

    pub fn odds(&self, side: Side) -> Option<i32> {
        match side {
            Side::Home => self.home_odds,
            Side::Away => self.away_odds,
        }
    }

    pub fn team(&self, side: Side) -> &str {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }

    pub fn predicted_side(&self) -> Side {
        if self.predicted_winner == self.home {
            Side::Home
        } else {
            Side::Away
        }
    }

    /// A final result has been written back. Finals the provider reports
    /// without a score still count once their summary says so.
    pub fn is_reconciled(&self) -> bool {
        (self.home_score.is_some() && self.away_score.is_some())
            || self.prediction_accuracy.is_some()
            || self.summary.ends_with(FINAL_SUFFIX)
    }
}

/// American odds are stored the way bettors write them: `+135`, `-150`.
mod american {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::odds_fetch::format_american;

    pub fn serialize<S: Serializer>(value: &Option<i32>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(price) => s.serialize_str(&format_american(*price)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i32>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") | Some("None") => Ok(None),
            Some(text) => text
                .parse::<f64>()
                .map(|v| Some(v.round() as i32))
                .map_err(serde::de::Error::custom),
        }
    }
}

pub fn parse_ledger_csv<R: Read>(rdr: R) -> anyhow::Result<Vec<PredictionRecord>> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut records = Vec::new();
    for (idx, row) in reader.deserialize::<PredictionRecord>().enumerate() {
        records.push(row.with_context(|| format!("malformed ledger row {}", idx + 2))?);
    }
    Ok(records)
}

pub fn ledger_csv_bytes(records: &[PredictionRecord]) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if records.is_empty() {
        writer.write_record(COLUMNS).context("failed writing ledger header")?;
    }
    for record in records {
        writer.serialize(record).context("failed serialising ledger row")?;
    }
    writer.into_inner().context("failed flushing ledger csv")
}

#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn lock_file(&self) -> Result<File> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir).map_err(|err| ledger_err(dir, err))?;
        }
        let lock_path = self.lock_path();
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|err| ledger_err(&lock_path, err))
    }

    fn load_unlocked(&self) -> Result<Vec<PredictionRecord>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(ledger_err(&self.path, err)),
        };
        parse_ledger_csv(file).map_err(|err| ledger_err(&self.path, format!("{err:#}")))
    }

    /// A consistent snapshot of every row.
    pub fn read_all(&self) -> Result<Vec<PredictionRecord>> {
        let lock = fd_lock::RwLock::new(self.lock_file()?);
        let _guard = lock
            .read()
            .map_err(|err| ledger_err(&self.lock_path(), err))?;
        self.load_unlocked()
    }

    /// Runs `f` over the current rows inside the write lock and persists the
    /// result if anything changed. On any failure the file on disk is the
    /// previous one.
    pub fn update<T>(&self, f: impl FnOnce(&mut Vec<PredictionRecord>) -> T) -> Result<T> {
        let mut lock = fd_lock::RwLock::new(self.lock_file()?);
        let _guard = lock
            .write()
            .map_err(|err| ledger_err(&self.lock_path(), err))?;
        let before = self.load_unlocked()?;
        let mut rows = before.clone();
        let out = f(&mut rows);
        if rows != before {
            let bytes = ledger_csv_bytes(&rows)
                .map_err(|err| ledger_err(&self.path, format!("{err:#}")))?;
            write_atomic(&self.path, &bytes)
                .map_err(|err| ledger_err(&self.path, format!("{err:#}")))?;
            debug!(path = %self.path.display(), rows = rows.len(), "ledger written");
        }
        Ok(out)
    }

    /// Appends rows whose `(game_id, date)` is not already present. Returns
    /// how many were added.
    pub fn append(&self, records: Vec<PredictionRecord>) -> Result<usize> {
        let added = self.update(|rows| {
            let mut seen: HashSet<(u64, NaiveDate)> = rows.iter().map(PredictionRecord::key).collect();
            let mut added = 0usize;
            for record in records {
                if seen.insert(record.key()) {
                    rows.push(record);
                    added += 1;
                }
            }
            added
        })?;
        if added > 0 {
            info!(path = %self.path.display(), added, "appended predictions");
        }
        Ok(added)
    }

    pub fn mark_published(&self, game_id: u64, date: NaiveDate) -> Result<bool> {
        self.update(|rows| {
            let mut hit = false;
            for row in rows.iter_mut().filter(|r| r.key() == (game_id, date)) {
                row.published = true;
                hit = true;
            }
            hit
        })
    }

    /// Spreadsheet view of the ledger, same columns.
    pub fn export_xlsx(&self, out: &Path) -> anyhow::Result<usize> {
        let rows = self.read_all().map_err(anyhow::Error::new)?;
        let mut table = vec![COLUMNS.iter().map(|c| c.to_string()).collect::<Vec<_>>()];
        table.extend(rows.iter().map(record_cells));

        let mut workbook = Workbook::new();
        {
            let sheet = workbook.add_worksheet();
            sheet.set_name("Predictions")?;
            write_rows(sheet, &table)?;
        }
        workbook
            .save(out)
            .with_context(|| format!("failed writing workbook to {}", out.display()))?;
        Ok(rows.len())
    }
}

fn ledger_err(path: &Path, err: impl std::fmt::Display) -> OracleError {
    OracleError::Ledger(format!("{}: {err}", path.display()))
}

fn record_cells(r: &PredictionRecord) -> Vec<String> {
    vec![
        opt_to_string(r.prediction_accuracy),
        r.date.to_string(),
        r.time.clone().unwrap_or_default(),
        r.home.clone(),
        r.home_probable.clone().unwrap_or_default(),
        r.away.clone(),
        r.away_probable.clone().unwrap_or_default(),
        r.predicted_winner.clone(),
        r.model.clone(),
        r.favorite.clone().unwrap_or_default(),
        r.home_odds.map(format_american).unwrap_or_default(),
        r.home_odds_bookmaker.clone().unwrap_or_default(),
        r.away_odds.map(format_american).unwrap_or_default(),
        r.away_odds_bookmaker.clone().unwrap_or_default(),
        opt_to_string(r.home_score),
        opt_to_string(r.away_score),
        r.winning_pitcher.clone().unwrap_or_default(),
        r.losing_pitcher.clone().unwrap_or_default(),
        format!("{:.6}", r.prediction_value),
        r.venue.clone().unwrap_or_default(),
        r.series_status.clone().unwrap_or_default(),
        r.national_broadcasts.clone().unwrap_or_default(),
        opt_to_string(r.odds_retrieval_time.map(|t| t.to_rfc3339())),
        r.prediction_generation_time.to_rfc3339(),
        opt_to_string(r.datetime.map(|t| t.to_rfc3339())),
        r.game_id.to_string(),
        r.summary.clone(),
        r.publish_line.clone(),
        opt_to_string(r.time_to_publish.map(|t| t.to_rfc3339())),
        r.published.to_string(),
    ]
}

fn opt_to_string<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> anyhow::Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::game::tests::sample_game;
    use crate::odds_fetch::TeamOdds;

    pub(crate) fn scratch_ledger(name: &str) -> Ledger {
        let dir = std::env::temp_dir().join(format!("mlb_oracle_ledger_{}", std::process::id()));
        let path = dir.join(format!("{name}.csv"));
        let _ = fs::remove_file(&path);
        Ledger::new(path)
    }

    pub(crate) fn sample_record(game_id: u64, date: &str, winner: Side) -> PredictionRecord {
        let game = sample_game(game_id, date, (147, "New York Yankees"), (111, "Boston Red Sox"));
        let prediction = Prediction {
            game,
            model: "mlb4year".to_string(),
            winner,
            score: if winner == Side::Home { 0.61 } else { 0.42 },
            spread: 0.0,
        };
        PredictionRecord::new(&prediction, None, Utc::now())
    }

    #[test]
    fn header_matches_columns() {
        let bytes = ledger_csv_bytes(&[sample_record(1, "2024-06-01", Side::Home)]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().next().unwrap(), COLUMNS.join(","));
        let empty = String::from_utf8(ledger_csv_bytes(&[]).unwrap()).unwrap();
        assert_eq!(empty.trim_end(), COLUMNS.join(","));
    }

    #[test]
    fn odds_roundtrip_with_sign() {
        let game = sample_game(5, "2024-06-01", (147, "New York Yankees"), (111, "Boston Red Sox"));
        let prediction = Prediction {
            game,
            model: "m".to_string(),
            winner: Side::Away,
            score: 0.4,
            spread: 0.0,
        };
        let odds = GameOdds {
            home_team: "New York Yankees".to_string(),
            away_team: "Boston Red Sox".to_string(),
            commence_time: None,
            home: Some(TeamOdds {
                price: -150,
                bookmaker: "FanDuel".to_string(),
            }),
            away: Some(TeamOdds {
                price: 135,
                bookmaker: "DraftKings".to_string(),
            }),
            favorite: Some("New York Yankees".to_string()),
        };
        let record = PredictionRecord::new(&prediction, Some((&odds, Utc::now())), Utc::now());
        let bytes = ledger_csv_bytes(std::slice::from_ref(&record)).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains(",+135,DraftKings,"));
        let back = parse_ledger_csv(bytes.as_slice()).unwrap();
        assert_eq!(back, vec![record]);
    }

    #[test]
    fn append_skips_same_game_same_day() {
        let ledger = scratch_ledger("append");
        let first = sample_record(1, "2024-06-01", Side::Home);
        assert_eq!(ledger.append(vec![first.clone()]).unwrap(), 1);
        assert_eq!(ledger.append(vec![first, sample_record(2, "2024-06-01", Side::Away)]).unwrap(), 1);
        assert_eq!(ledger.read_all().unwrap().len(), 2);
        assert!(ledger.mark_published(2, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()).unwrap());
        assert!(ledger.read_all().unwrap()[1].published);
    }

    #[test]
    fn corrupt_ledger_is_left_alone() {
        let ledger = scratch_ledger("corrupt");
        write_atomic(ledger.path(), b"prediction_accuracy,date\nnot,a,ledger\n").unwrap();
        let err = ledger.append(vec![sample_record(1, "2024-06-01", Side::Home)]).unwrap_err();
        assert!(matches!(err, OracleError::Ledger(_)));
        let raw = fs::read_to_string(ledger.path()).unwrap();
        assert!(raw.contains("not,a,ledger"));
    }
}
