// Labeled training examples: one normalized row per side of a game,
// concatenated in both orders, split chronologically.

use crate::accumulate::resolve_roles;
use crate::derive::COLUMN_COUNT;
use crate::error::EngineError;
use crate::game::{GameRecord, Season, TeamId};
use crate::normalize::NormalizedTable;
use crate::team_season::TeamSeasonKey;
use serde::{Deserialize, Serialize};
use tracing::info;

/// First season routed to the validation split.
pub const VALIDATION_SEASON_START: Season = 2018;

/// Length of one example's feature vector.
pub const FEATURE_LEN: usize = 2 * COLUMN_COUNT;

/// One-hot label: the first concatenated team won.
pub const FIRST_WON: [f64; 2] = [1.0, 0.0];
/// One-hot label: the second concatenated team won.
pub const SECOND_WON: [f64; 2] = [0.0, 1.0];

/// Which split a season's games belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Split {
    Train,
    Validation,
}

impl Split {
    pub fn for_season(season: Season) -> Self {
        if season < VALIDATION_SEASON_START {
            Split::Train
        } else {
            Split::Validation
        }
    }
}

/// Parallel feature and label collections for one split.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExampleSplit {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<[f64; 2]>,
}

impl ExampleSplit {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[f64], &[f64; 2])> {
        self.features.iter().map(Vec::as_slice).zip(self.labels.iter())
    }

    fn push(&mut self, features: Vec<f64>, label: [f64; 2]) {
        self.features.push(features);
        self.labels.push(label);
    }
}

/// Training and validation examples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExampleSets {
    pub train: ExampleSplit,
    pub validation: ExampleSplit,
}

impl ExampleSets {
    pub fn split(&self, split: Split) -> &ExampleSplit {
        match split {
            Split::Train => &self.train,
            Split::Validation => &self.validation,
        }
    }

    fn split_mut(&mut self, split: Split) -> &mut ExampleSplit {
        match split {
            Split::Train => &mut self.train,
            Split::Validation => &mut self.validation,
        }
    }

    pub fn total(&self) -> usize {
        self.train.len() + self.validation.len()
    }
}

/// Concatenate two teams' normalized rows for a season, first team first.
pub fn matchup_vector(
    table: &NormalizedTable,
    first: TeamId,
    second: TeamId,
    season: Season,
) -> Result<Vec<f64>, EngineError> {
    let a = table.require(&TeamSeasonKey::new(first, season))?;
    let b = table.require(&TeamSeasonKey::new(second, season))?;
    let mut features = Vec::with_capacity(FEATURE_LEN);
    features.extend_from_slice(a);
    features.extend_from_slice(b);
    Ok(features)
}

/// Emit two examples per game (home‖away and away‖home) into the split
/// selected by the game's season.
///
/// A game whose teams have no row in `table` aborts the build.
pub fn build(games: &[GameRecord], table: &NormalizedTable) -> Result<ExampleSets, EngineError> {
    let mut sets = ExampleSets::default();

    for game in games {
        let roles = resolve_roles(game.venue, game.winner, game.loser);
        let home_won = roles.home_team == game.winner;

        let home_first = matchup_vector(table, roles.home_team, roles.away_team, game.season)?;
        let away_first = matchup_vector(table, roles.away_team, roles.home_team, game.season)?;
        let (label, mirrored) = if home_won {
            (FIRST_WON, SECOND_WON)
        } else {
            (SECOND_WON, FIRST_WON)
        };

        let split = sets.split_mut(Split::for_season(game.season));
        split.push(home_first, label);
        split.push(away_first, mirrored);
    }

    info!(
        "Built {} training and {} validation examples from {} games",
        sets.train.len(),
        sets.validation.len(),
        games.len()
    );
    Ok(sets)
}
