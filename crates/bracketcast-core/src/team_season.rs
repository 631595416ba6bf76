// Aggregation keys and the team/season domain they are drawn from.

use crate::error::EngineError;
use crate::game::{Season, TeamId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Identity of one aggregate row: a team in a season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamSeasonKey {
    pub team: TeamId,
    pub season: Season,
}

impl TeamSeasonKey {
    pub fn new(team: TeamId, season: Season) -> Self {
        Self { team, season }
    }
}

impl fmt::Display for TeamSeasonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.team, self.season)
    }
}

/// The accumulator slot a team's stats are credited to for one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Home,
    Away,
}

/// Dense team-id and season ranges. Every pair in the cross product gets a
/// row, whether or not the team played that season.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    teams: RangeInclusive<TeamId>,
    seasons: RangeInclusive<Season>,
}

impl Domain {
    pub fn new(
        teams: RangeInclusive<TeamId>,
        seasons: RangeInclusive<Season>,
    ) -> Result<Self, EngineError> {
        if teams.is_empty() {
            return Err(EngineError::InvalidDomain(format!(
                "team range {}..={} is empty",
                teams.start(),
                teams.end()
            )));
        }
        if seasons.is_empty() {
            return Err(EngineError::InvalidDomain(format!(
                "season range {}..={} is empty",
                seasons.start(),
                seasons.end()
            )));
        }
        Ok(Self { teams, seasons })
    }

    pub fn teams(&self) -> RangeInclusive<TeamId> {
        self.teams.clone()
    }

    pub fn seasons(&self) -> RangeInclusive<Season> {
        self.seasons.clone()
    }

    pub fn contains_team(&self, team: TeamId) -> bool {
        self.teams.contains(&team)
    }

    pub fn contains_season(&self, season: Season) -> bool {
        self.seasons.contains(&season)
    }

    /// Number of rows in the cross product.
    pub fn len(&self) -> usize {
        let teams = (*self.teams.end() - *self.teams.start()) as usize + 1;
        let seasons = (*self.seasons.end() - *self.seasons.start()) as usize + 1;
        teams * seasons
    }

    /// Always false: construction rejects empty ranges.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// All keys, team-major.
    pub fn keys(&self) -> impl Iterator<Item = TeamSeasonKey> + '_ {
        self.teams()
            .flat_map(move |team| self.seasons().map(move |season| TeamSeasonKey::new(team, season)))
    }
}
