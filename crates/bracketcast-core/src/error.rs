// Engine error type.

use crate::game::{Season, TeamId};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A feature lookup named a (team, season) row the table does not hold.
    #[error("no aggregate row for team {team} in season {season}")]
    MissingAggregate { team: TeamId, season: Season },

    #[error("invalid game record #{index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("invalid domain: {0}")]
    InvalidDomain(String),
}
