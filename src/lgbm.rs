//! Evaluator for LightGBM text model dumps (`<model>.txt`).
//!
//! Only what binary game-outcome models use: numerical splits, the
//! default-left missing-value bit, and a sigmoid or identity output.

use std::fs;
use std::path::Path;

use crate::error::{OracleError, Result};

const CATEGORICAL_MASK: u8 = 1;
const DEFAULT_LEFT_MASK: u8 = 2;
const ZERO_THRESHOLD: f64 = 1e-35;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MissingType {
    None,
    Zero,
    NaN,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Objective {
    /// `binary` / `cross_entropy`: probability = sigmoid(k * raw).
    Sigmoid(f64),
    /// Regression objectives emit the raw sum.
    Identity,
}

#[derive(Debug, Clone, PartialEq)]
struct Tree {
    split_feature: Vec<usize>,
    threshold: Vec<f64>,
    decision_type: Vec<u8>,
    left_child: Vec<i32>,
    right_child: Vec<i32>,
    leaf_value: Vec<f64>,
}

impl Tree {
    fn predict(&self, x: &[f64]) -> f64 {
        if self.split_feature.is_empty() {
            return self.leaf_value[0];
        }
        let mut node = 0usize;
        loop {
            let next = if self.goes_left(node, x) {
                self.left_child[node]
            } else {
                self.right_child[node]
            };
            if next < 0 {
                return self.leaf_value[(!next) as usize];
            }
            node = next as usize;
        }
    }

    fn goes_left(&self, node: usize, x: &[f64]) -> bool {
        let dt = self.decision_type[node];
        let missing = match (dt >> 2) & 3 {
            1 => MissingType::Zero,
            2 => MissingType::NaN,
            _ => MissingType::None,
        };
        let mut fval = x.get(self.split_feature[node]).copied().unwrap_or(f64::NAN);
        if fval.is_nan() && missing != MissingType::NaN {
            fval = 0.0;
        }
        let is_missing = match missing {
            MissingType::Zero => fval.abs() <= ZERO_THRESHOLD,
            MissingType::NaN => fval.is_nan(),
            MissingType::None => false,
        };
        if is_missing {
            return dt & DEFAULT_LEFT_MASK != 0;
        }
        fval <= self.threshold[node]
    }

    fn validate(&self, idx: usize, num_features: usize) -> std::result::Result<(), String> {
        let internal = self.split_feature.len();
        if self.leaf_value.len() != internal + 1 {
            return Err(format!(
                "tree {idx}: {} leaves for {internal} splits",
                self.leaf_value.len()
            ));
        }
        for (name, len) in [
            ("threshold", self.threshold.len()),
            ("decision_type", self.decision_type.len()),
            ("left_child", self.left_child.len()),
            ("right_child", self.right_child.len()),
        ] {
            if len != internal {
                return Err(format!("tree {idx}: {name} has {len} entries, expected {internal}"));
            }
        }
        for node in 0..internal {
            if self.decision_type[node] & CATEGORICAL_MASK != 0 {
                return Err(format!("tree {idx}: categorical splits are not supported"));
            }
            if self.split_feature[node] >= num_features {
                return Err(format!(
                    "tree {idx}: split on feature {} beyond max_feature_idx",
                    self.split_feature[node]
                ));
            }
            for child in [self.left_child[node], self.right_child[node]] {
                let ok = if child < 0 {
                    ((!child) as usize) < self.leaf_value.len()
                } else {
                    // Children are always created after their parent.
                    (child as usize) > node && (child as usize) < internal
                };
                if !ok {
                    return Err(format!("tree {idx}: node {node} has invalid child {child}"));
                }
            }
        }
        if self.leaf_value.iter().any(|v| !v.is_finite()) {
            return Err(format!("tree {idx}: non-finite leaf value"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Booster {
    num_features: usize,
    objective: Objective,
    average_output: bool,
    trees: Vec<Tree>,
}

impl Booster {
    /// A missing file is `ModelNotFound`; a malformed one is a configuration
    /// error.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|err| {
            OracleError::ModelNotFound(format!("{}: {err}", path.display()))
        })?;
        Self::parse(&raw).map_err(|msg| {
            OracleError::Configuration(format!("invalid model {}: {msg}", path.display()))
        })
    }

    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        let mut lines = raw.lines().map(str::trim).peekable();

        let mut max_feature_idx: Option<usize> = None;
        let mut objective = Objective::Sigmoid(1.0);
        let mut average_output = false;
        let mut num_class = 1usize;
        while let Some(line) = lines.peek() {
            if line.starts_with("Tree=") || *line == "end of trees" {
                break;
            }
            let line = lines.next().unwrap_or_default();
            if line == "average_output" {
                average_output = true;
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key {
                "max_feature_idx" => {
                    max_feature_idx = Some(
                        value
                            .parse()
                            .map_err(|_| format!("bad max_feature_idx `{value}`"))?,
                    );
                }
                "num_class" => {
                    num_class = value.parse().map_err(|_| format!("bad num_class `{value}`"))?;
                }
                "objective" => objective = parse_objective(value)?,
                _ => {}
            }
        }
        if num_class != 1 {
            return Err(format!("num_class={num_class}, only single-output models are supported"));
        }
        let num_features = max_feature_idx.ok_or("missing max_feature_idx")? + 1;

        let mut trees = Vec::new();
        while let Some(line) = lines.next() {
            if line == "end of trees" {
                break;
            }
            if !line.starts_with("Tree=") {
                continue;
            }
            let mut block: Vec<(&str, &str)> = Vec::new();
            while let Some(next) = lines.peek() {
                if next.starts_with("Tree=") || *next == "end of trees" {
                    break;
                }
                let next = lines.next().unwrap_or_default();
                if let Some(kv) = next.split_once('=') {
                    block.push(kv);
                }
            }
            let tree = parse_tree(&block).map_err(|e| format!("tree {}: {e}", trees.len()))?;
            tree.validate(trees.len(), num_features)?;
            trees.push(tree);
        }
        if trees.is_empty() {
            return Err("model contains no trees".to_string());
        }

        Ok(Self {
            num_features,
            objective,
            average_output,
            trees,
        })
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn raw_score(&self, x: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict(x)).sum();
        if self.average_output {
            sum / self.trees.len() as f64
        } else {
            sum
        }
    }

    pub fn predict(&self, x: &[f64]) -> f64 {
        let raw = self.raw_score(x);
        match self.objective {
            Objective::Sigmoid(k) => 1.0 / (1.0 + (-k * raw).exp()),
            Objective::Identity => raw,
        }
    }
}

fn parse_objective(value: &str) -> std::result::Result<Objective, String> {
    let mut parts = value.split_whitespace();
    let name = parts.next().unwrap_or_default();
    match name {
        "binary" | "cross_entropy" | "xentropy" => {
            let k = parts
                .find_map(|p| p.strip_prefix("sigmoid:"))
                .map(|s| s.parse::<f64>().map_err(|_| format!("bad sigmoid `{s}`")))
                .transpose()?
                .unwrap_or(1.0);
            Ok(Objective::Sigmoid(k))
        }
        n if n.starts_with("regression") || n == "huber" || n == "fair" => Ok(Objective::Identity),
        other => Err(format!("unsupported objective `{other}`")),
    }
}

fn parse_tree(block: &[(&str, &str)]) -> std::result::Result<Tree, String> {
    let field = |key: &str| block.iter().find(|(k, _)| *k == key).map(|(_, v)| *v);
    let num_leaves: usize = field("num_leaves")
        .ok_or("missing num_leaves")?
        .parse()
        .map_err(|_| "bad num_leaves".to_string())?;
    let leaf_value: Vec<f64> = parse_list(field("leaf_value").ok_or("missing leaf_value")?)?;
    if leaf_value.len() != num_leaves {
        return Err(format!("num_leaves={num_leaves} but {} leaf values", leaf_value.len()));
    }
    if num_leaves <= 1 {
        return Ok(Tree {
            split_feature: Vec::new(),
            threshold: Vec::new(),
            decision_type: Vec::new(),
            left_child: Vec::new(),
            right_child: Vec::new(),
            leaf_value,
        });
    }
    Ok(Tree {
        split_feature: parse_list(field("split_feature").ok_or("missing split_feature")?)?,
        threshold: parse_list(field("threshold").ok_or("missing threshold")?)?,
        decision_type: match field("decision_type") {
            Some(v) => parse_list(v)?,
            None => vec![0; num_leaves - 1],
        },
        left_child: parse_list(field("left_child").ok_or("missing left_child")?)?,
        right_child: parse_list(field("right_child").ok_or("missing right_child")?)?,
        leaf_value,
    })
}

fn parse_list<T: std::str::FromStr>(raw: &str) -> std::result::Result<Vec<T>, String> {
    raw.split_whitespace()
        .map(|tok| tok.parse::<T>().map_err(|_| format!("bad value `{tok}`")))
        .collect()
}
