use thiserror::Error;

/// Whether a failed provider call is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// Timeouts, connection resets, 5xx, 429. Retried with backoff.
    Transient,
    /// Malformed ids, 4xx, undecodable payloads. Never retried.
    Permanent,
}

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("data unavailable for game {game_id}: {reason}")]
    DataUnavailable { game_id: u64, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("odds unavailable: {0}")]
    StaleCache(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("{kind:?} fetch failure: {message}")]
    Fetch { kind: FetchKind, message: String },
}

pub type Result<T> = std::result::Result<T, OracleError>;

impl OracleError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Fetch {
            kind: FetchKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Fetch {
            kind: FetchKind::Permanent,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Fetch {
                kind: FetchKind::Transient,
                ..
            }
        )
    }

    /// Configuration-class failures halt the daily cycle; everything else only
    /// costs the game it happened on.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::ModelNotFound(_))
    }

    /// Re-labels a per-game failure as "this game cannot be predicted this
    /// cycle". Fatal errors pass through untouched.
    pub fn into_unavailable(self, game_id: u64) -> Self {
        match self {
            err @ (Self::Configuration(_) | Self::ModelNotFound(_)) => err,
            err @ Self::DataUnavailable { .. } => err,
            other => Self::DataUnavailable {
                game_id,
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors_survive_relabel() {
        let err = OracleError::Configuration("bad scaler".to_string()).into_unavailable(7);
        assert!(err.is_fatal());

        let err = OracleError::transient("timeout").into_unavailable(7);
        assert!(matches!(
            err,
            OracleError::DataUnavailable { game_id: 7, .. }
        ));
        assert!(!err.is_fatal());
    }
}
