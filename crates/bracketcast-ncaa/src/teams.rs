// Team list, name spellings, and the domain derived from them.

use crate::error::LoadError;
use bracketcast_core::{Domain, GameRecord, TeamId};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// A team from the team list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Raw CSV row types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct RawTeam {
    TeamID: TeamId,
    TeamName: String,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct RawSpelling {
    TeamNameSpelling: String,
    TeamID: TeamId,
}

// ---------------------------------------------------------------------------
// Reader-based loaders
// ---------------------------------------------------------------------------

fn load_teams_from_reader<R: Read>(rdr: R) -> Result<Vec<Team>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut teams = Vec::new();
    for result in reader.deserialize::<RawTeam>() {
        match result {
            Ok(raw) => {
                let name = raw.TeamName.trim();
                if name.is_empty() {
                    warn!("skipping team {}: empty name", raw.TeamID);
                    continue;
                }
                teams.push(Team {
                    id: raw.TeamID,
                    name: name.to_string(),
                });
            }
            Err(e) => {
                warn!("skipping malformed team row: {}", e);
            }
        }
    }
    Ok(teams)
}

/// Decode one field as UTF-8, falling back to Latin-1.
fn decode_field(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Spelling files ship as Latin-1, so fields go through [`decode_field`]
/// before deserializing.
fn load_spellings_from_reader<R: Read>(rdr: R) -> Result<HashMap<String, TeamId>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let headers: csv::StringRecord = reader
        .byte_headers()?
        .iter()
        .map(decode_field)
        .collect();

    let mut map = HashMap::new();
    for result in reader.byte_records() {
        let bytes = result?;
        let record: csv::StringRecord = bytes
            .iter()
            .map(decode_field)
            .collect();
        match record.deserialize::<RawSpelling>(Some(&headers)) {
            Ok(raw) => {
                let spelling = raw.TeamNameSpelling.trim().to_lowercase();
                if spelling.is_empty() {
                    continue;
                }
                if let Some(prev) = map.insert(spelling.clone(), raw.TeamID) {
                    if prev != raw.TeamID {
                        warn!(
                            "spelling '{}' maps to both {} and {}, using {}",
                            spelling, prev, raw.TeamID, raw.TeamID
                        );
                    }
                }
            }
            Err(e) => {
                warn!("skipping malformed spelling row: {}", e);
            }
        }
    }
    Ok(map)
}

// ---------------------------------------------------------------------------
// Public path-based loaders
// ---------------------------------------------------------------------------

/// Load the team list from a CSV file.
pub fn load_teams(path: &Path) -> Result<Vec<Team>, LoadError> {
    let file = std::fs::File::open(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_teams_from_reader(file).map_err(|e| LoadError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

/// Load alternate team name spellings. Keys are lowercased.
pub fn load_spellings(path: &Path) -> Result<HashMap<String, TeamId>, LoadError> {
    let file = std::fs::File::open(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_spellings_from_reader(file).map_err(|e| LoadError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Team directory
// ---------------------------------------------------------------------------

/// Team names by id plus case-insensitive name resolution.
#[derive(Debug, Clone, Default)]
pub struct TeamDirectory {
    names: BTreeMap<TeamId, String>,
    spellings: HashMap<String, TeamId>,
}

impl TeamDirectory {
    /// Build a directory from a team list and a spellings map. Each team's
    /// own name is always a valid spelling.
    pub fn from_parts(teams: Vec<Team>, spellings: HashMap<String, TeamId>) -> Self {
        let mut dir = TeamDirectory {
            names: BTreeMap::new(),
            spellings,
        };
        for team in teams {
            dir.spellings
                .entry(team.name.to_lowercase())
                .or_insert(team.id);
            if dir.names.insert(team.id, team.name).is_some() {
                warn!("duplicate team id {}, using latest name", team.id);
            }
        }
        dir
    }

    /// Load the team list and, when given, the spellings file.
    pub fn load(teams: &Path, spellings: Option<&Path>) -> Result<Self, LoadError> {
        let team_list = load_teams(teams)?;
        let spelling_map = match spellings {
            Some(path) => load_spellings(path)?,
            None => HashMap::new(),
        };
        let dir = Self::from_parts(team_list, spelling_map);
        info!(
            "Loaded {} teams and {} spellings",
            dir.len(),
            dir.spellings.len()
        );
        Ok(dir)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, id: TeamId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Resolve a user query: a numeric team id if it parses as one and is
    /// known, otherwise a case-insensitive spelling.
    pub fn resolve(&self, query: &str) -> Option<TeamId> {
        let query = query.trim();
        if let Ok(id) = query.parse::<TeamId>() {
            if self.names.contains_key(&id) {
                return Some(id);
            }
        }
        let found = self.spellings.get(&query.to_lowercase()).copied();
        debug!("resolved '{}' to {:?}", query, found);
        found
    }

    /// Smallest and largest known team id.
    pub fn team_range(&self) -> Option<(TeamId, TeamId)> {
        let first = *self.names.keys().next()?;
        let last = *self.names.keys().next_back()?;
        Some((first, last))
    }
}

/// Dense domain covering every listed team and every season that has games.
pub fn domain_from(teams: &TeamDirectory, games: &[GameRecord]) -> Result<Domain, LoadError> {
    let (first_team, last_team) = teams
        .team_range()
        .ok_or_else(|| LoadError::Validation("team list is empty".into()))?;
    let first_season = games.iter().map(|g| g.season).min();
    let last_season = games.iter().map(|g| g.season).max();
    let (first_season, last_season) = match (first_season, last_season) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(LoadError::Validation("no games to build a domain from".into())),
    };
    let domain = Domain::new(first_team..=last_team, first_season..=last_season)?;
    info!(
        "Domain: teams {}..={}, seasons {}..={} ({} rows)",
        first_team,
        last_team,
        first_season,
        last_season,
        domain.len()
    );
    Ok(domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bracketcast_core::{BoxScore, VenueCode};

    const TEAMS_CSV: &str = "\
TeamID,TeamName,FirstD1Season,LastD1Season
1101,Abilene Chr,2014,2024
1102,Air Force,1985,2024
1103,Akron,1985,2024
";

    fn directory() -> TeamDirectory {
        let teams = load_teams_from_reader(TEAMS_CSV.as_bytes()).unwrap();
        let spellings = load_spellings_from_reader(
            "TeamNameSpelling,TeamID\nabilene christian,1101\nafa,1102\n".as_bytes(),
        )
        .unwrap();
        TeamDirectory::from_parts(teams, spellings)
    }

    fn game(season: u16) -> GameRecord {
        GameRecord {
            season,
            day_num: 0,
            winner: 1101,
            loser: 1102,
            winner_score: 70,
            loser_score: 60,
            venue: VenueCode::Home,
            winner_box: BoxScore::default(),
            loser_box: BoxScore::default(),
        }
    }

    #[test]
    fn parses_team_list() {
        let teams = load_teams_from_reader(TEAMS_CSV.as_bytes()).unwrap();
        assert_eq!(teams.len(), 3);
        assert_eq!(
            teams[0],
            Team {
                id: 1101,
                name: "Abilene Chr".into()
            }
        );
    }

    #[test]
    fn skips_malformed_team_rows() {
        let data = "TeamID,TeamName\n1101,Abilene Chr\nabc,Broken\n1103,Akron\n";
        let teams = load_teams_from_reader(data.as_bytes()).unwrap();
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[1].id, 1103);
    }

    #[test]
    fn spellings_tolerate_latin1() {
        let mut data = b"TeamNameSpelling,TeamID\n".to_vec();
        data.extend_from_slice(b"san jos\xe9 st,1361\n");
        data.extend_from_slice(b"akron,1103\n");
        data.extend_from_slice("universit\u{e9} de montr\u{e9}al,1999\n".as_bytes());
        let map = load_spellings_from_reader(&data[..]).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get("akron"), Some(&1103));
        assert_eq!(map.get("san jos\u{e9} st"), Some(&1361));
        assert_eq!(map.get("universit\u{e9} de montr\u{e9}al"), Some(&1999));

        let dir = TeamDirectory::from_parts(vec![], map);
        assert_eq!(dir.resolve("san josé st"), Some(1361));
        assert_eq!(dir.resolve("SAN JOSÉ ST"), Some(1361));
    }

    #[test]
    fn resolve_by_id_name_and_spelling() {
        let dir = directory();
        assert_eq!(dir.resolve("1103"), Some(1103));
        assert_eq!(dir.resolve("AKRON"), Some(1103));
        assert_eq!(dir.resolve(" Abilene Christian "), Some(1101));
        assert_eq!(dir.resolve("afa"), Some(1102));
        assert_eq!(dir.resolve("9999"), None);
        assert_eq!(dir.resolve("Gonzaga"), None);
        assert_eq!(dir.name(1102), Some("Air Force"));
    }

    #[test]
    fn domain_spans_teams_and_game_seasons() {
        let dir = directory();
        let domain = domain_from(&dir, &[game(2016), game(2003), game(2010)]).unwrap();
        assert_eq!(domain.teams(), 1101..=1103);
        assert_eq!(domain.seasons(), 2003..=2016);
    }

    #[test]
    fn domain_rejects_empty_inputs() {
        let dir = directory();
        assert!(matches!(
            domain_from(&dir, &[]),
            Err(LoadError::Validation(_))
        ));
        assert!(matches!(
            domain_from(&TeamDirectory::default(), &[game(2010)]),
            Err(LoadError::Validation(_))
        ));
    }

    #[test]
    fn missing_spellings_file_is_io_error() {
        let err = load_spellings(Path::new("nope/spellings.csv")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
