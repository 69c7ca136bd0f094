use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Regular season, wild card, division series, LCS, world series, championship
/// and playoff game-type codes. Spring training and exhibitions never count.
pub const COUNTED_GAME_TYPES: [&str; 7] = ["R", "F", "D", "L", "W", "C", "P"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Home, Side::Away];

    pub fn label(self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
        }
    }

    pub fn other(self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    Scheduled,
    Live,
    Final,
    Postponed,
}

impl GameStatus {
    /// Maps the provider's `abstractGameState` / `detailedState` pair.
    pub fn from_states(abstract_state: &str, detailed_state: &str) -> Self {
        let detailed = detailed_state.trim().to_ascii_lowercase();
        if detailed.starts_with("postponed")
            || detailed.starts_with("cancelled")
            || detailed.starts_with("suspended")
        {
            return GameStatus::Postponed;
        }
        if detailed.starts_with("final")
            || detailed.starts_with("game over")
            || detailed.starts_with("completed early")
        {
            return GameStatus::Final;
        }
        match abstract_state.trim().to_ascii_lowercase().as_str() {
            "final" => GameStatus::Final,
            "live" => GameStatus::Live,
            _ => GameStatus::Scheduled,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GameStatus::Scheduled => "Scheduled",
            GameStatus::Live => "In Progress",
            GameStatus::Final => "Final",
            GameStatus::Postponed => "Postponed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRef {
    pub id: u32,
    pub name: String,
}

/// One game as the provider describes it. Fetched once per game and shared by
/// every aggregator working on that game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameContext {
    pub game_id: u64,
    pub date: NaiveDate,
    pub datetime: Option<DateTime<Utc>>,
    pub game_type: String,
    pub home: TeamRef,
    pub away: TeamRef,
    pub home_probable: Option<String>,
    pub away_probable: Option<String>,
    pub venue: Option<String>,
    pub national_broadcasts: Vec<String>,
    pub series_status: Option<String>,
    pub status: GameStatus,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub winning_pitcher: Option<String>,
    pub losing_pitcher: Option<String>,
}

impl GameContext {
    pub fn team(&self, side: Side) -> &TeamRef {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }

    pub fn probable(&self, side: Side) -> Option<&str> {
        match side {
            Side::Home => self.home_probable.as_deref(),
            Side::Away => self.away_probable.as_deref(),
        }
    }

    pub fn season(&self) -> i32 {
        use chrono::Datelike;
        self.date.year()
    }

    pub fn is_final(&self) -> bool {
        self.status == GameStatus::Final
    }

    pub fn counts_for_form(&self) -> bool {
        COUNTED_GAME_TYPES.contains(&self.game_type.as_str())
    }

    /// The side that won, if the game is final and not tied.
    pub fn winner_side(&self) -> Option<Side> {
        if !self.is_final() {
            return None;
        }
        let (Some(home), Some(away)) = (self.home_score, self.away_score) else {
            return None;
        };
        match home.cmp(&away) {
            std::cmp::Ordering::Greater => Some(Side::Home),
            std::cmp::Ordering::Less => Some(Side::Away),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn winning_team(&self) -> Option<&str> {
        self.winner_side().map(|side| self.team(side).name.as_str())
    }

    pub fn summary(&self) -> String {
        match (self.status, self.home_score, self.away_score) {
            (GameStatus::Final | GameStatus::Live, Some(h), Some(a)) => format!(
                "{} - {} ({}) @ {} ({}) ({})",
                self.date,
                self.away.name,
                a,
                self.home.name,
                h,
                self.status.label()
            ),
            _ => format!(
                "{} - {} @ {} ({})",
                self.date,
                self.away.name,
                self.home.name,
                self.status.label()
            ),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_game(id: u64, date: &str, home: (u32, &str), away: (u32, &str)) -> GameContext {
        GameContext {
            game_id: id,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            datetime: None,
            game_type: "R".to_string(),
            home: TeamRef {
                id: home.0,
                name: home.1.to_string(),
            },
            away: TeamRef {
                id: away.0,
                name: away.1.to_string(),
            },
            home_probable: None,
            away_probable: None,
            venue: None,
            national_broadcasts: Vec::new(),
            series_status: None,
            status: GameStatus::Scheduled,
            home_score: None,
            away_score: None,
            winning_pitcher: None,
            losing_pitcher: None,
        }
    }

    #[test]
    fn status_mapping() {
        assert_eq!(GameStatus::from_states("Final", "Final"), GameStatus::Final);
        assert_eq!(GameStatus::from_states("Final", "Game Over"), GameStatus::Final);
        assert_eq!(
            GameStatus::from_states("Preview", "Postponed"),
            GameStatus::Postponed
        );
        assert_eq!(GameStatus::from_states("Live", "In Progress"), GameStatus::Live);
        assert_eq!(
            GameStatus::from_states("Preview", "Pre-Game"),
            GameStatus::Scheduled
        );
    }

    #[test]
    fn winner_requires_final_and_untied() {
        let mut game = sample_game(1, "2024-05-01", (1, "A"), (2, "B"));
        game.home_score = Some(3);
        game.away_score = Some(5);
        assert_eq!(game.winning_team(), None);

        game.status = GameStatus::Final;
        assert_eq!(game.winning_team(), Some("B"));

        game.home_score = Some(5);
        assert_eq!(game.winner_side(), None);
    }
}
