use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::odds_fetch::OddsFetchConfig;
use crate::predict::PredictConfig;
use crate::publish::PublishWindow;
use crate::retry::RetryPolicy;

const DEFAULT_MODEL: &str = "mlb4year";

#[derive(Debug, Clone)]
pub struct Config {
    pub model: String,
    pub feature_order: Option<String>,
    pub model_dir: PathBuf,
    pub ledger_path: PathBuf,
    pub ids_cache_path: PathBuf,
    pub elo_table_path: Option<PathBuf>,
    pub odds: OddsFetchConfig,
    pub predict: PredictConfig,
    pub retry: RetryPolicy,
    pub publish: PublishWindow,
}

impl Config {
    pub fn from_env() -> Self {
        let model = env_string("SELECTED_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let feature_order = env_string("FEATURE_ORDER");
        let model_dir = env_path("MODEL_DIR").unwrap_or_else(|| PathBuf::from("models"));
        let ledger_path =
            env_path("DATA_SHEET_PATH").unwrap_or_else(|| PathBuf::from("data/predictions.csv"));
        let ids_cache_path =
            env_path("IDS_CACHE_PATH").unwrap_or_else(|| PathBuf::from("data/ids.json"));
        let elo_table_path = env_path("ELO_TABLE_PATH");

        let simulations = env::var("PREDICT_SIMULATIONS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(10)
            .clamp(1, 1000);
        let perturbation = env::var("PREDICT_PERTURBATION")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(0.001)
            .max(0.0);
        let seed = env::var("PREDICT_SEED")
            .ok()
            .and_then(|v| v.parse::<u64>().ok());

        let max_attempts = env::var("HTTP_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(3)
            .clamp(1, 10);
        let backoff_ms = env::var("HTTP_BACKOFF_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(500)
            .min(30_000);

        let publish_hour = env::var("PUBLISH_HOUR")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(9)
            .min(23);
        let publish_minute = env::var("PUBLISH_MINUTE")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(45)
            .min(59);

        Self {
            model,
            feature_order,
            model_dir,
            ledger_path,
            ids_cache_path,
            elo_table_path,
            odds: OddsFetchConfig::from_env(),
            predict: PredictConfig {
                simulations,
                perturbation,
                seed,
            },
            retry: RetryPolicy {
                max_attempts,
                base_delay: Duration::from_millis(backoff_ms),
            },
            publish: PublishWindow {
                hour: publish_hour,
                minute: publish_minute,
                ..PublishWindow::default()
            },
        }
    }
}

pub(crate) fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| {
            let t = v.trim().to_ascii_lowercase();
            !(t.is_empty() || t == "0" || t == "false" || t == "off" || t == "no")
        })
        .unwrap_or(default)
}

pub(crate) fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_string(key).map(PathBuf::from)
}
