use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{OracleError, Result};
use crate::persist::{load_json, save_json};
use crate::stats_api::StatsProvider;

const IDS_CACHE_VERSION: u32 = 1;

/// Abbreviations used by the public ratings table where they differ from, or
/// predate, the provider's own.
const ELO_ABBREVIATIONS: [(&str, &str); 31] = [
    ("Oakland Athletics", "OAK"),
    ("Athletics", "OAK"),
    ("Pittsburgh Pirates", "PIT"),
    ("San Diego Padres", "SDP"),
    ("Seattle Mariners", "SEA"),
    ("San Francisco Giants", "SFG"),
    ("St. Louis Cardinals", "STL"),
    ("Tampa Bay Rays", "TBD"),
    ("Texas Rangers", "TEX"),
    ("Toronto Blue Jays", "TOR"),
    ("Minnesota Twins", "MIN"),
    ("Philadelphia Phillies", "PHI"),
    ("Atlanta Braves", "ATL"),
    ("Chicago White Sox", "CHW"),
    ("Miami Marlins", "FLA"),
    ("New York Yankees", "NYY"),
    ("Milwaukee Brewers", "MIL"),
    ("Los Angeles Angels", "ANA"),
    ("Arizona Diamondbacks", "ARI"),
    ("Baltimore Orioles", "BAL"),
    ("Boston Red Sox", "BOS"),
    ("Chicago Cubs", "CHC"),
    ("Cincinnati Reds", "CIN"),
    ("Cleveland Guardians", "CLE"),
    ("Colorado Rockies", "COL"),
    ("Detroit Tigers", "DET"),
    ("Houston Astros", "HOU"),
    ("Kansas City Royals", "KCR"),
    ("Los Angeles Dodgers", "LAD"),
    ("Washington Nationals", "WSN"),
    ("New York Mets", "NYM"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamIdentity {
    pub id: u32,
    pub name: String,
    pub short_name: String,
    pub abbreviation: String,
    pub division_id: Option<u32>,
    pub division: Option<String>,
    pub league_id: Option<u32>,
    pub league: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IdsCacheFile {
    version: u32,
    teams: Vec<TeamIdentity>,
}

/// Team and division lookups, built once and then read-only.
#[derive(Debug, Clone)]
pub struct Resolver {
    teams: Vec<TeamIdentity>,
    index: HashMap<String, usize>,
}

impl Resolver {
    pub fn from_teams(teams: Vec<TeamIdentity>) -> Result<Self> {
        if teams.is_empty() {
            return Err(OracleError::Configuration(
                "team list is empty, cannot build resolver".to_string(),
            ));
        }
        let mut index = HashMap::new();
        // Full names win over short names, which win over abbreviations.
        for (idx, team) in teams.iter().enumerate() {
            index.entry(normalize(&team.name)).or_insert(idx);
        }
        for (idx, team) in teams.iter().enumerate() {
            index.entry(normalize(&team.short_name)).or_insert(idx);
        }
        for (idx, team) in teams.iter().enumerate() {
            index.entry(normalize(&team.abbreviation)).or_insert(idx);
        }
        index.remove("");
        Ok(Self { teams, index })
    }

    /// Reads the cache artifact, or builds it from the provider when absent.
    /// A present but unreadable cache is a configuration error.
    pub fn load_or_build(path: &Path, provider: &dyn StatsProvider) -> Result<Self> {
        if let Some(resolver) = Self::load(path)? {
            return Ok(resolver);
        }
        Self::regenerate(path, provider)
    }

    pub fn load(path: &Path) -> Result<Option<Self>> {
        let cache: Option<IdsCacheFile> = load_json(path)
            .map_err(|err| OracleError::Configuration(format!("{err:#}")))?;
        let Some(cache) = cache else {
            return Ok(None);
        };
        if cache.version != IDS_CACHE_VERSION {
            return Err(OracleError::Configuration(format!(
                "{} has version {}, expected {IDS_CACHE_VERSION}; regenerate it",
                path.display(),
                cache.version
            )));
        }
        Self::from_teams(cache.teams).map(Some)
    }

    pub fn regenerate(path: &Path, provider: &dyn StatsProvider) -> Result<Self> {
        let teams = provider.teams()?;
        let resolver = Self::from_teams(teams)?;
        let cache = IdsCacheFile {
            version: IDS_CACHE_VERSION,
            teams: resolver.teams.clone(),
        };
        match save_json(path, &cache) {
            Ok(()) => info!(path = %path.display(), teams = resolver.teams.len(), "wrote ids cache"),
            Err(err) => warn!(path = %path.display(), "failed writing ids cache: {err:#}"),
        }
        Ok(resolver)
    }

    pub fn teams(&self) -> &[TeamIdentity] {
        &self.teams
    }

    pub fn resolve(&self, name: &str) -> Result<&TeamIdentity> {
        self.index
            .get(&normalize(name))
            .map(|idx| &self.teams[*idx])
            .ok_or_else(|| OracleError::NotFound(format!("team `{}`", name.trim())))
    }

    pub fn by_id(&self, id: u32) -> Option<&TeamIdentity> {
        self.teams.iter().find(|t| t.id == id)
    }

    pub fn division_of(&self, name: &str) -> Result<(&str, u32)> {
        let team = self.resolve(name)?;
        match (team.division.as_deref(), team.division_id) {
            (Some(div), Some(id)) => Ok((div, id)),
            _ => Err(OracleError::NotFound(format!("division of `{}`", team.name))),
        }
    }

    pub fn division_teams(&self, division_id: u32) -> Vec<&TeamIdentity> {
        self.teams
            .iter()
            .filter(|t| t.division_id == Some(division_id))
            .collect()
    }

    pub fn abbreviation(&self, name: &str) -> Result<&str> {
        self.resolve(name).map(|t| t.abbreviation.as_str())
    }

    /// The ratings-table code for a team, falling back to its own abbreviation.
    pub fn elo_abbreviation(&self, name: &str) -> Result<&str> {
        let team = self.resolve(name)?;
        Ok(ELO_ABBREVIATIONS
            .iter()
            .find(|(full, _)| *full == team.name)
            .map(|(_, code)| *code)
            .unwrap_or(team.abbreviation.as_str()))
    }
}

fn normalize(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
