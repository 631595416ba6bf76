// Core aggregation and featurization engine.
//
// Pipeline: game records -> raw per-team-season totals -> derived rates ->
// normalized feature rows -> labeled, order-augmented example sets.

pub mod accumulate;
pub mod derive;
pub mod error;
pub mod game;
pub mod lookup;
pub mod normalize;
pub mod team_season;
pub mod training_set;

#[cfg(test)]
mod testutil;

pub use accumulate::{ingest, ingest_sharded, resolve_roles, RawTable, RoleAssignment};
pub use derive::{
    column_index, finalize, DerivedTable, DerivedTeamSeason, StatRow, COLUMN_COUNT, COLUMN_NAMES,
};
pub use error::EngineError;
pub use game::{BoxScore, GameRecord, Season, TeamId, VenueCode};
pub use lookup::TeamSummary;
pub use normalize::{normalize, ColumnBounds, ConstantColumnPolicy, NormalizedTable};
pub use team_season::{Domain, Role, TeamSeasonKey};
pub use training_set::{build, matchup_vector, ExampleSets, ExampleSplit, Split, VALIDATION_SEASON_START};
