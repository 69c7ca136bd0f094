use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{OracleError, Result};
use crate::schema::{Feature, FeatureRecord, named_order};

#[derive(Debug, Deserialize)]
struct ScalerFile {
    #[serde(default)]
    columns: Option<Vec<Feature>>,
    #[serde(default)]
    order: Option<String>,
    #[serde(default)]
    scaled: Option<Vec<Feature>>,
    center: Vec<f64>,
    scale: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnScale {
    pub index: usize,
    pub center: f64,
    pub scale: f64,
}

/// A model's frozen input contract: column order plus the fitted standard
/// scaler for the columns it was fit on.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSchema {
    name: String,
    columns: Vec<Feature>,
    scaling: Vec<ColumnScale>,
}

pub fn scaler_path(dir: &Path, model: &str) -> PathBuf {
    dir.join(format!("{model}_scaler.json"))
}

impl ModelSchema {
    pub fn new(
        name: impl Into<String>,
        columns: Vec<Feature>,
        scaled: &[(Feature, f64, f64)],
    ) -> Result<Self> {
        let name = name.into();
        if columns.is_empty() {
            return Err(OracleError::Configuration(format!("model `{name}` declares no columns")));
        }
        for (i, f) in columns.iter().enumerate() {
            if columns[..i].contains(f) {
                return Err(OracleError::Configuration(format!(
                    "model `{name}` lists `{f}` twice"
                )));
            }
        }
        let mut scaling = Vec::with_capacity(scaled.len());
        for (feature, center, scale) in scaled {
            let Some(index) = columns.iter().position(|c| c == feature) else {
                return Err(OracleError::Configuration(format!(
                    "model `{name}` scales `{feature}` which is not one of its columns"
                )));
            };
            if !center.is_finite() || !scale.is_finite() {
                return Err(OracleError::Configuration(format!(
                    "model `{name}` has a non-finite scaler parameter for `{feature}`"
                )));
            }
            // A constant training column has zero variance; leave it centred only.
            let scale = if *scale == 0.0 { 1.0 } else { *scale };
            scaling.push(ColumnScale {
                index,
                center: *center,
                scale,
            });
        }
        Ok(Self {
            name,
            columns,
            scaling,
        })
    }

    /// Reads `<dir>/<model>_scaler.json`. `feature_order`, when given, must name
    /// the same column order the artifact declares.
    pub fn load(dir: &Path, model: &str, feature_order: Option<&str>) -> Result<Self> {
        let path = scaler_path(dir, model);
        let raw = fs::read_to_string(&path).map_err(|err| {
            OracleError::Configuration(format!(
                "no scaler/column-order artifact for model `{model}` at {}: {err}",
                path.display()
            ))
        })?;
        Self::from_json(model, &raw, feature_order)
    }

    pub fn from_json(model: &str, raw: &str, feature_order: Option<&str>) -> Result<Self> {
        let file: ScalerFile = serde_json::from_str(raw).map_err(|err| {
            OracleError::Configuration(format!("invalid scaler artifact for `{model}`: {err}"))
        })?;

        let declared_order = match file.order.as_deref() {
            Some(order) => Some(resolve_order(model, order)?),
            None => None,
        };
        let columns = match (file.columns, declared_order) {
            (Some(columns), Some(order)) if columns != order => {
                return Err(OracleError::Configuration(format!(
                    "model `{model}` columns disagree with its declared order"
                )));
            }
            (Some(columns), _) => columns,
            (None, Some(order)) => order,
            (None, None) => {
                return Err(OracleError::Configuration(format!(
                    "scaler artifact for `{model}` declares neither columns nor order"
                )));
            }
        };
        if let Some(order) = feature_order {
            if resolve_order(model, order)? != columns {
                return Err(OracleError::Configuration(format!(
                    "FEATURE_ORDER `{order}` does not match the column order of model `{model}`"
                )));
            }
        }

        let scaled = file.scaled.unwrap_or_else(|| columns.clone());
        if scaled.len() != file.center.len() || scaled.len() != file.scale.len() {
            return Err(OracleError::Configuration(format!(
                "model `{model}` scaler has {} columns but {} centers and {} scales",
                scaled.len(),
                file.center.len(),
                file.scale.len()
            )));
        }
        let params: Vec<(Feature, f64, f64)> = scaled
            .into_iter()
            .zip(file.center)
            .zip(file.scale)
            .map(|((f, c), s)| (f, c, s))
            .collect();
        Self::new(model, columns, &params)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Feature] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn scaling(&self) -> &[ColumnScale] {
        &self.scaling
    }
}

fn resolve_order(model: &str, order: &str) -> Result<Vec<Feature>> {
    named_order(order).ok_or_else(|| {
        OracleError::Configuration(format!("model `{model}` names unknown feature order `{order}`"))
    })
}

/// Model-ready input. Nulls are carried as NaN and routed by the model's own
/// missing-value rules.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Reorders the record into the model's columns and applies its scaler.
/// A column the record does not carry at all is a configuration error.
pub fn encode(record: &FeatureRecord, schema: &ModelSchema) -> Result<FeatureVector> {
    let mut values = Vec::with_capacity(schema.len());
    for feature in schema.columns() {
        if !record.has(*feature) {
            return Err(OracleError::Configuration(format!(
                "model `{}` needs `{feature}` but the feature record has no such column",
                schema.name()
            )));
        }
        let value = record.get(*feature).filter(|v| v.is_finite()).unwrap_or(f64::NAN);
        values.push(value);
    }
    for col in schema.scaling() {
        let v = values[col.index];
        if !v.is_nan() {
            values[col.index] = (v - col.center) / col.scale;
        }
    }
    Ok(FeatureVector { values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tests::sample_game;
    use crate::assemble::assemble;
    use crate::fragment::{FeatureFragment, FragmentKind};
    use crate::schema::{RecordSchema, Stat};

    fn record_with(values: &[(Feature, f64)]) -> FeatureRecord {
        let game = sample_game(1, "2024-06-01", (1, "A"), (2, "B"));
        let fragment = FeatureFragment::new(
            FragmentKind::Last10,
            values.iter().map(|(f, v)| (*f, Some(*v))),
        );
        assemble(&game, &RecordSchema::base(), &[fragment]).unwrap()
    }

    #[test]
    fn scales_only_the_fitted_subset() {
        let runs = Feature::home(Stat::Last10Runs);
        let hits = Feature::home(Stat::Last10Hits);
        let schema = ModelSchema::new("toy", vec![hits, runs], &[(runs, 4.0, 2.0)]).unwrap();
        let record = record_with(&[(runs, 6.0), (hits, 9.0)]);
        let vector = encode(&record, &schema).unwrap();
        assert_eq!(vector.as_slice(), &[9.0, 1.0]);
    }

    #[test]
    fn nulls_become_nan() {
        let runs = Feature::home(Stat::Last10Runs);
        let schema = ModelSchema::new("toy", vec![runs], &[(runs, 4.0, 2.0)]).unwrap();
        let record = record_with(&[]);
        assert!(encode(&record, &schema).unwrap().as_slice()[0].is_nan());
    }

    #[test]
    fn zero_scale_is_treated_as_one() {
        let runs = Feature::home(Stat::Last10Runs);
        let schema = ModelSchema::new("toy", vec![runs], &[(runs, 4.0, 0.0)]).unwrap();
        let record = record_with(&[(runs, 6.0)]);
        assert_eq!(encode(&record, &schema).unwrap().as_slice(), &[2.0]);
    }

    #[test]
    fn missing_record_column_is_configuration_error() {
        let schema = ModelSchema::new("elo", vec![Feature::home(Stat::Elo)], &[]).unwrap();
        let err = encode(&record_with(&[]), &schema).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn artifact_by_order_name() {
        let raw = r#"{"order": "order2", "scaled": ["home-win-percentage"], "center": [0.5], "scale": [0.1]}"#;
        let schema = ModelSchema::from_json("m", raw, Some("order2")).unwrap();
        assert_eq!(schema.len(), 44);
        assert_eq!(schema.scaling().len(), 1);
        assert!(ModelSchema::from_json("m", raw, Some("order1")).is_err());
    }

    #[test]
    fn artifact_parameter_count_must_match() {
        let raw = r#"{"order": "order1", "center": [0.5], "scale": [0.1]}"#;
        assert!(ModelSchema::from_json("m", raw, None).unwrap_err().is_fatal());
    }

    #[test]
    fn missing_artifact_is_configuration_error() {
        let dir = std::env::temp_dir().join("mlb_oracle_no_models_here");
        assert!(ModelSchema::load(&dir, "ghost", None).unwrap_err().is_fatal());
    }
}
