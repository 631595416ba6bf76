// Min-max normalization of every feature column across all team-seasons.
//
// Two stages: a fork-join reduction computes per-column bounds, then every
// row is rescaled independently against those bounds.

use crate::derive::{DerivedTable, DerivedTeamSeason, StatRow, COLUMN_COUNT, COLUMN_NAMES};
use crate::error::EngineError;
use crate::team_season::{Domain, TeamSeasonKey};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// What to write for a column whose minimum equals its maximum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstantColumnPolicy {
    /// Perform the 0/0 division as-is; the column becomes NaN in every row.
    #[default]
    Propagate,
    /// Write 0.0 for every row of a constant column.
    Zero,
}

/// Per-column minimum and maximum over a set of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBounds {
    pub min: StatRow,
    pub max: StatRow,
}

impl ColumnBounds {
    /// Identity element for [`ColumnBounds::merge`].
    pub fn empty() -> Self {
        Self {
            min: [f64::INFINITY; COLUMN_COUNT],
            max: [f64::NEG_INFINITY; COLUMN_COUNT],
        }
    }

    pub fn observe(&mut self, row: &StatRow) {
        for (i, v) in row.iter().enumerate() {
            self.min[i] = self.min[i].min(*v);
            self.max[i] = self.max[i].max(*v);
        }
    }

    /// Elementwise min/max of two partial bounds.
    pub fn merge(mut self, other: &ColumnBounds) -> Self {
        for i in 0..COLUMN_COUNT {
            self.min[i] = self.min[i].min(other.min[i]);
            self.max[i] = self.max[i].max(other.max[i]);
        }
        self
    }

    /// Bounds over a slice of rows, computed as a parallel fold/reduce.
    /// Returns `None` for an empty slice.
    pub fn from_rows(rows: &[(TeamSeasonKey, StatRow)]) -> Option<Self> {
        if rows.is_empty() {
            return None;
        }
        let bounds = rows
            .par_iter()
            .fold(ColumnBounds::empty, |mut acc, (_, row)| {
                acc.observe(row);
                acc
            })
            .reduce(ColumnBounds::empty, |a, b| a.merge(&b));
        Some(bounds)
    }

    pub fn is_constant(&self, column: usize) -> bool {
        self.min[column] == self.max[column]
    }

    /// Names of the columns holding a single value across all rows.
    pub fn constant_columns(&self) -> Vec<&'static str> {
        (0..COLUMN_COUNT)
            .filter(|&i| self.is_constant(i))
            .map(|i| COLUMN_NAMES[i])
            .collect()
    }

    /// `(value - min) / (max - min)` for every column.
    pub fn rescale(&self, row: &StatRow, policy: ConstantColumnPolicy) -> StatRow {
        let mut out = [0.0; COLUMN_COUNT];
        for (i, v) in row.iter().enumerate() {
            out[i] = match policy {
                ConstantColumnPolicy::Zero if self.is_constant(i) => 0.0,
                _ => (v - self.min[i]) / (self.max[i] - self.min[i]),
            };
        }
        out
    }
}

/// Normalized feature rows, keyed like the derived table they came from.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    domain: Domain,
    bounds: Option<ColumnBounds>,
    rows: HashMap<TeamSeasonKey, StatRow>,
}

impl NormalizedTable {
    /// Assemble from already-normalized rows (e.g. reloaded from storage).
    /// Bounds are not recoverable from normalized values.
    pub fn from_rows(domain: Domain, rows: HashMap<TeamSeasonKey, StatRow>) -> Self {
        Self {
            domain,
            bounds: None,
            rows,
        }
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Bounds used to rescale the rows, when this table was computed here.
    pub fn bounds(&self) -> Option<&ColumnBounds> {
        self.bounds.as_ref()
    }

    pub fn get(&self, key: &TeamSeasonKey) -> Option<&StatRow> {
        self.rows.get(key)
    }

    pub fn require(&self, key: &TeamSeasonKey) -> Result<&StatRow, EngineError> {
        self.rows.get(key).ok_or(EngineError::MissingAggregate {
            team: key.team,
            season: key.season,
        })
    }

    /// Named-field view of a normalized row.
    pub fn stats(&self, key: &TeamSeasonKey) -> Option<DerivedTeamSeason> {
        self.rows.get(key).map(DerivedTeamSeason::from_row)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TeamSeasonKey, &StatRow)> {
        self.rows.iter()
    }

    pub fn sorted_keys(&self) -> Vec<TeamSeasonKey> {
        let mut keys: Vec<_> = self.rows.keys().copied().collect();
        keys.sort_unstable();
        keys
    }
}

/// Rescale every column of the derived table into [0, 1].
pub fn normalize(derived: &DerivedTable, policy: ConstantColumnPolicy) -> NormalizedTable {
    let rows: Vec<(TeamSeasonKey, StatRow)> = derived
        .iter()
        .map(|(key, stats)| (*key, stats.to_row()))
        .collect();

    let Some(bounds) = ColumnBounds::from_rows(&rows) else {
        return NormalizedTable {
            domain: derived.domain().clone(),
            bounds: None,
            rows: HashMap::new(),
        };
    };

    let constant = bounds.constant_columns();
    if !constant.is_empty() {
        match policy {
            ConstantColumnPolicy::Propagate => warn!(
                "{} constant column(s) normalize to NaN: {}",
                constant.len(),
                constant.join(", ")
            ),
            ConstantColumnPolicy::Zero => info!(
                "{} constant column(s) normalized to 0: {}",
                constant.len(),
                constant.join(", ")
            ),
        }
    }

    let normalized: HashMap<TeamSeasonKey, StatRow> = rows
        .into_par_iter()
        .map(|(key, row)| (key, bounds.rescale(&row, policy)))
        .collect();

    info!("Normalized {} rows over {} columns", normalized.len(), COLUMN_COUNT);
    NormalizedTable {
        domain: derived.domain().clone(),
        bounds: Some(bounds),
        rows: normalized,
    }
}
