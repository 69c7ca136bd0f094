//! Prediction engine.
//!
//! The encoded vector is treated as a point estimate. `k` forward passes are
//! run, each on the vector plus independent Gaussian noise, and their mean is
//! the score. The spread across passes is a Monte-Carlo sensitivity estimate
//! of how close the game sits to a split boundary; it is not a calibrated
//! uncertainty.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rand::SeedableRng;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use statrs::distribution::Normal;
use tracing::{debug, info};

use crate::assemble::FeatureBuilder;
use crate::encode::{FeatureVector, ModelSchema, encode};
use crate::error::{OracleError, Result};
use crate::game::{GameContext, Side};
use crate::lgbm::Booster;
use crate::schema::FeatureRecord;
use crate::stats_api::StatsProvider;

pub const HOME_WIN_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictConfig {
    pub simulations: usize,
    pub perturbation: f64,
    /// Fixed seed for reproducible runs; mixed with the game id per game.
    pub seed: Option<u64>,
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            simulations: 10,
            perturbation: 0.001,
            seed: None,
        }
    }
}

impl PredictConfig {
    pub fn deterministic() -> Self {
        Self {
            simulations: 1,
            perturbation: 0.0,
            seed: Some(0),
        }
    }
}

/// A tree model and the input contract it was trained on.
#[derive(Debug)]
pub struct LoadedModel {
    pub name: String,
    pub schema: ModelSchema,
    pub booster: Booster,
}

impl LoadedModel {
    pub fn from_parts(name: impl Into<String>, schema: ModelSchema, booster: Booster) -> Result<Self> {
        let name = name.into();
        if booster.num_features() != schema.len() {
            return Err(OracleError::Configuration(format!(
                "model `{name}` expects {} features but its column order has {}",
                booster.num_features(),
                schema.len()
            )));
        }
        Ok(Self {
            name,
            schema,
            booster,
        })
    }

    /// `<dir>/<name>.txt` plus `<dir>/<name>_scaler.json`.
    pub fn load(dir: &Path, name: &str, feature_order: Option<&str>) -> Result<Self> {
        let model_path = dir.join(format!("{name}.txt"));
        if !model_path.is_file() {
            return Err(OracleError::ModelNotFound(format!(
                "`{name}` expected at {}",
                model_path.display()
            )));
        }
        let booster = Booster::load(&model_path)?;
        let schema = ModelSchema::load(dir, name, feature_order)?;
        Self::from_parts(name, schema, booster)
    }
}

/// Models resolved by name from one directory, loaded on first use.
#[derive(Debug)]
pub struct ModelRegistry {
    dir: PathBuf,
    feature_order: Option<String>,
    loaded: Mutex<HashMap<String, Arc<LoadedModel>>>,
}

impl ModelRegistry {
    pub fn new(dir: impl Into<PathBuf>, feature_order: Option<String>) -> Self {
        Self {
            dir: dir.into(),
            feature_order,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_model(model: LoadedModel) -> Self {
        let registry = Self::new(PathBuf::new(), None);
        registry
            .loaded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(model.name.clone(), Arc::new(model));
        registry
    }

    pub fn get(&self, name: &str) -> Result<Arc<LoadedModel>> {
        let mut loaded = self.loaded.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(model) = loaded.get(name) {
            return Ok(Arc::clone(model));
        }
        let model = Arc::new(LoadedModel::load(
            &self.dir,
            name,
            self.feature_order.as_deref(),
        )?);
        info!(
            model = name,
            features = model.schema.len(),
            trees = model.booster.num_trees(),
            "loaded model"
        );
        loaded.insert(name.to_string(), Arc::clone(&model));
        Ok(model)
    }
}

#[derive(Debug, Clone)]
pub struct Prediction {
    pub game: GameContext,
    pub model: String,
    pub winner: Side,
    pub score: f64,
    /// Standard deviation of the perturbed passes.
    pub spread: f64,
}

impl Prediction {
    pub fn winner_name(&self) -> &str {
        &self.game.team(self.winner).name
    }
}

/// `score >= 0.5` picks the home team.
pub fn winner_for(score: f64) -> Side {
    if score >= HOME_WIN_THRESHOLD {
        Side::Home
    } else {
        Side::Away
    }
}

/// Mean and standard deviation of `cfg.simulations` perturbed passes. Missing
/// inputs stay NaN under noise so the trees still route them as missing.
pub fn simulate(booster: &Booster, vector: &FeatureVector, cfg: &PredictConfig, rng: &mut StdRng) -> (f64, f64) {
    let k = cfg.simulations.max(1);
    let noise = if cfg.perturbation > 0.0 {
        Normal::new(0.0, cfg.perturbation).ok()
    } else {
        None
    };
    let base = vector.as_slice();
    let mut input = base.to_vec();
    let mut outputs = Vec::with_capacity(k);
    for _ in 0..k {
        if let Some(dist) = noise.as_ref() {
            for (slot, v) in input.iter_mut().zip(base) {
                *slot = v + dist.sample(rng);
            }
        }
        outputs.push(booster.predict(&input));
    }
    let mean = outputs.iter().sum::<f64>() / k as f64;
    let var = outputs.iter().map(|o| (o - mean).powi(2)).sum::<f64>() / k as f64;
    (mean, var.sqrt())
}

pub fn rng_for(cfg: &PredictConfig, game_id: u64) -> StdRng {
    match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ game_id.rotate_left(17)),
        None => StdRng::from_entropy(),
    }
}

/// Scores an already assembled record, without touching the network.
pub fn score_record(model: &LoadedModel, record: &FeatureRecord, cfg: &PredictConfig) -> Result<(f64, f64)> {
    let vector = encode(record, &model.schema)?;
    let mut rng = rng_for(cfg, record.game_id);
    Ok(simulate(&model.booster, &vector, cfg, &mut rng))
}

pub struct Predictor<'a> {
    provider: &'a dyn StatsProvider,
    builder: FeatureBuilder<'a>,
    models: &'a ModelRegistry,
    cfg: PredictConfig,
}

impl<'a> Predictor<'a> {
    pub fn new(
        provider: &'a dyn StatsProvider,
        builder: FeatureBuilder<'a>,
        models: &'a ModelRegistry,
        cfg: PredictConfig,
    ) -> Self {
        Self {
            provider,
            builder,
            models,
            cfg,
        }
    }

    pub fn predict(&self, game_id: u64, model_name: &str) -> Result<Prediction> {
        let model = self.models.get(model_name)?;
        let game = self
            .provider
            .game(game_id)
            .map_err(|err| err.into_unavailable(game_id))?;
        self.predict_with(game, &model)
    }

    /// Same as [`Predictor::predict`] for a game already fetched from the
    /// schedule.
    pub fn predict_game(&self, game: GameContext, model_name: &str) -> Result<Prediction> {
        let model = self.models.get(model_name)?;
        self.predict_with(game, &model)
    }

    fn predict_with(&self, game: GameContext, model: &LoadedModel) -> Result<Prediction> {
        let record = self.builder.build(&game)?;
        let (score, spread) = score_record(model, &record, &self.cfg)?;
        let winner = winner_for(score);
        debug!(
            game_id = game.game_id,
            model = %model.name,
            score,
            spread,
            winner = %game.team(winner).name,
            "predicted"
        );
        Ok(Prediction {
            game,
            model: model.name.clone(),
            winner,
            score,
            spread,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Feature, Stat};

    const STUMP: &str = "tree
version=v3
num_class=1
max_feature_idx=0
objective=binary sigmoid:1

Tree=0
num_leaves=2
split_feature=0
threshold=0
decision_type=2
left_child=-1
right_child=-2
leaf_value=-0.4 0.4

end of trees
";

    fn model() -> LoadedModel {
        let f = Feature::home(Stat::WinPercentage);
        let schema = ModelSchema::new("stump", vec![f], &[]).unwrap();
        LoadedModel::from_parts("stump", schema, Booster::parse(STUMP).unwrap()).unwrap()
    }

    #[test]
    fn threshold_is_inclusive_for_home() {
        assert_eq!(winner_for(0.5), Side::Home);
        assert_eq!(winner_for(0.499999), Side::Away);
        assert_eq!(winner_for(1.0), Side::Home);
        assert_eq!(winner_for(0.0), Side::Away);
    }

    #[test]
    fn zero_perturbation_is_deterministic() {
        let model = model();
        let schema = &model.schema;
        let record = FeatureRecord {
            game_id: 1,
            date: chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            home_team: "A".to_string(),
            away_team: "B".to_string(),
            did_home_win: None,
            values: vec![(schema.columns()[0], Some(0.6))],
        };
        let vector = encode(&record, schema).unwrap();
        let single = model.booster.predict(vector.as_slice());
        let cfg = PredictConfig {
            simulations: 25,
            perturbation: 0.0,
            seed: None,
        };
        let (mean, spread) = simulate(&model.booster, &vector, &cfg, &mut rng_for(&cfg, 1));
        assert_eq!(mean, single);
        assert_eq!(spread, 0.0);
    }

    #[test]
    fn seeded_runs_repeat() {
        let model = model();
        let vector_record = FeatureRecord {
            game_id: 7,
            date: chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            home_team: "A".to_string(),
            away_team: "B".to_string(),
            did_home_win: None,
            values: vec![(model.schema.columns()[0], Some(0.0))],
        };
        let cfg = PredictConfig {
            simulations: 10,
            perturbation: 0.001,
            seed: Some(42),
        };
        let a = score_record(&model, &vector_record, &cfg).unwrap();
        let b = score_record(&model, &vector_record, &cfg).unwrap();
        assert_eq!(a, b);
        assert!((0.0..=1.0).contains(&a.0));
    }

    #[test]
    fn column_count_mismatch_is_configuration_error() {
        let schema = ModelSchema::new(
            "two",
            vec![Feature::home(Stat::Elo), Feature::away(Stat::Elo)],
            &[],
        )
        .unwrap();
        let err = LoadedModel::from_parts("two", schema, Booster::parse(STUMP).unwrap()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn unknown_model_is_model_not_found() {
        let registry = ModelRegistry::new("/nonexistent/models", None);
        assert!(matches!(
            registry.get("mlb4year").unwrap_err(),
            OracleError::ModelNotFound(_)
        ));
    }
}
