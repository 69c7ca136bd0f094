use std::fmt;

use crate::schema::Feature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentKind {
    WinPct,
    Last10,
    Pitcher,
    Leaders,
    Elo,
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FragmentKind::WinPct => "win-pct",
            FragmentKind::Last10 => "last10",
            FragmentKind::Pitcher => "pitcher",
            FragmentKind::Leaders => "leaders",
            FragmentKind::Elo => "elo",
        };
        f.write_str(label)
    }
}

/// Named values one aggregator produced for one game. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFragment {
    kind: FragmentKind,
    values: Vec<(Feature, Option<f64>)>,
}

impl FeatureFragment {
    pub fn new(kind: FragmentKind, values: impl IntoIterator<Item = (Feature, Option<f64>)>) -> Self {
        Self {
            kind,
            values: values.into_iter().collect(),
        }
    }

    pub fn empty(kind: FragmentKind) -> Self {
        Self {
            kind,
            values: Vec::new(),
        }
    }

    pub fn kind(&self) -> FragmentKind {
        self.kind
    }

    pub fn values(&self) -> &[(Feature, Option<f64>)] {
        &self.values
    }

    /// `None` when the feature is absent; `Some(None)` when present but null.
    pub fn get(&self, feature: Feature) -> Option<Option<f64>> {
        self.values
            .iter()
            .find(|(f, _)| *f == feature)
            .map(|(_, v)| *v)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}
