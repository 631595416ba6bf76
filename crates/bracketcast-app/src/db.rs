// SQLite persistence for derived and normalized tables, run history, and
// build state.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Context, Result};
use bracketcast_core::{
    DerivedTable, DerivedTeamSeason, Domain, NormalizedTable, StatRow, TeamSeasonKey,
    COLUMN_COUNT, COLUMN_NAMES,
};
use rusqlite::{params, Connection, Transaction};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Which table a stored row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Derived,
    Normalized,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Derived => "derived",
            Stage::Normalized => "normalized",
        }
    }
}

/// One completed `build`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub created_at: String,
    pub games: usize,
    pub train_examples: usize,
    pub validation_examples: usize,
}

/// Domain bounds as stored in the state table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct StoredDomain {
    teams: (u32, u32),
    seasons: (u16, u16),
}

/// SQLite-backed store for per-team-season stat rows and run history.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at `path` and ensure all tables exist.
    /// Pass `":memory:"` for an ephemeral database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS team_season_stats (
                team_id      INTEGER NOT NULL,
                season       INTEGER NOT NULL,
                stage        TEXT NOT NULL,
                column_index INTEGER NOT NULL,
                column_name  TEXT NOT NULL,
                value        REAL,
                PRIMARY KEY (team_id, season, stage, column_index)
            );

            CREATE TABLE IF NOT EXISTS pipeline_runs (
                run_id              TEXT PRIMARY KEY,
                created_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                games               INTEGER NOT NULL,
                train_examples      INTEGER NOT NULL,
                validation_examples INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS build_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// A poisoned lock still holds a usable connection; SQLite rolls back
    /// any transaction the panicking thread left open.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ------------------------------------------------------------------
    // Stat tables
    // ------------------------------------------------------------------

    /// Replace the stored derived table and its domain.
    pub fn save_derived(&self, table: &DerivedTable) -> Result<()> {
        self.in_transaction("derived", |tx| {
            let written = write_stage(tx, Stage::Derived, table.domain(), derived_rows(table))?;
            info!("Saved {} derived rows", written);
            Ok(())
        })
    }

    /// Replace the stored normalized table and its domain.
    pub fn save_normalized(&self, table: &NormalizedTable) -> Result<()> {
        self.in_transaction("normalized", |tx| {
            let written =
                write_stage(tx, Stage::Normalized, table.domain(), normalized_rows(table))?;
            info!("Saved {} normalized rows", written);
            Ok(())
        })
    }

    /// Replace both stored tables together. Either both are written or the
    /// previous build stays as it was.
    pub fn save_tables(&self, derived: &DerivedTable, normalized: &NormalizedTable) -> Result<()> {
        if derived.domain() != normalized.domain() {
            bail!("derived and normalized tables cover different domains");
        }
        self.in_transaction("build", |tx| {
            let d = write_stage(tx, Stage::Derived, derived.domain(), derived_rows(derived))?;
            let n = write_stage(
                tx,
                Stage::Normalized,
                normalized.domain(),
                normalized_rows(normalized),
            )?;
            info!("Saved {} derived and {} normalized rows", d, n);
            Ok(())
        })
    }

    fn in_transaction(
        &self,
        what: &str,
        body: impl FnOnce(&Transaction<'_>) -> Result<()>,
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .with_context(|| format!("failed to begin {what} transaction"))?;
        body(&tx)?;
        tx.commit()
            .with_context(|| format!("failed to commit {what} transaction"))?;
        Ok(())
    }

    /// Load the stored derived table, or `None` if nothing has been built.
    pub fn load_derived(&self) -> Result<Option<DerivedTable>> {
        let Some((domain, rows)) = self.load_stage(Stage::Derived)? else {
            return Ok(None);
        };
        let rows = rows
            .into_iter()
            .map(|(key, row)| (key, DerivedTeamSeason::from_row(&row)))
            .collect();
        Ok(Some(DerivedTable::from_rows(domain, rows)))
    }

    /// Load the stored normalized table, or `None` if nothing has been built.
    pub fn load_normalized(&self) -> Result<Option<NormalizedTable>> {
        Ok(self
            .load_stage(Stage::Normalized)?
            .map(|(domain, rows)| NormalizedTable::from_rows(domain, rows)))
    }

    fn load_stage(&self, stage: Stage) -> Result<Option<(Domain, HashMap<TeamSeasonKey, StatRow>)>> {
        let Some(domain) = self.load_domain(stage)? else {
            return Ok(None);
        };

        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT team_id, season, column_index, value
                 FROM team_season_stats WHERE stage = ?1",
            )
            .context("failed to prepare stat query")?;

        let cells = stmt
            .query_map(params![stage.as_str()], |row| {
                let team: u32 = row.get(0)?;
                let season: u16 = row.get(1)?;
                let column: i64 = row.get(2)?;
                let value: Option<f64> = row.get(3)?;
                Ok((TeamSeasonKey::new(team, season), column, value))
            })
            .context("failed to query stat rows")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map stat rows")?;

        let mut rows: HashMap<TeamSeasonKey, (StatRow, usize)> = HashMap::new();
        for (key, column, value) in cells {
            let column = usize::try_from(column)
                .ok()
                .filter(|&c| c < COLUMN_COUNT)
                .with_context(|| format!("stored column index {column} out of range"))?;
            let entry = rows.entry(key).or_insert(([0.0; COLUMN_COUNT], 0));
            entry.0[column] = value.unwrap_or(f64::NAN);
            entry.1 += 1;
        }

        if rows.len() != domain.len() {
            bail!(
                "stored {} table has {} rows, expected {}",
                stage.as_str(),
                rows.len(),
                domain.len()
            );
        }
        let mut out = HashMap::with_capacity(rows.len());
        for (key, (row, count)) in rows {
            if count != COLUMN_COUNT {
                bail!(
                    "stored {} row {key} has {count} of {COLUMN_COUNT} columns",
                    stage.as_str()
                );
            }
            out.insert(key, row);
        }
        Ok(Some((domain, out)))
    }

    fn load_domain(&self, stage: Stage) -> Result<Option<Domain>> {
        let Some(value) = self.load_state(&domain_key(stage))? else {
            return Ok(None);
        };
        let stored: StoredDomain =
            serde_json::from_value(value).context("failed to decode stored domain")?;
        let domain = Domain::new(
            stored.teams.0..=stored.teams.1,
            stored.seasons.0..=stored.seasons.1,
        )?;
        Ok(Some(domain))
    }

    // ------------------------------------------------------------------
    // Run history
    // ------------------------------------------------------------------

    /// Record a finished pipeline run. Re-recording the same id replaces it.
    pub fn record_run(
        &self,
        run_id: &str,
        games: usize,
        train_examples: usize,
        validation_examples: usize,
    ) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO pipeline_runs
                (run_id, games, train_examples, validation_examples)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                run_id,
                games as i64,
                train_examples as i64,
                validation_examples as i64
            ],
        )
        .context("failed to record pipeline run")?;
        Ok(())
    }

    /// All recorded runs, oldest first.
    pub fn load_runs(&self) -> Result<Vec<RunRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT run_id, created_at, games, train_examples, validation_examples
                 FROM pipeline_runs ORDER BY created_at, run_id",
            )
            .context("failed to prepare load_runs query")?;

        let runs = stmt
            .query_map([], |row| {
                Ok(RunRecord {
                    run_id: row.get(0)?,
                    created_at: row.get(1)?,
                    games: row.get::<_, i64>(2)? as usize,
                    train_examples: row.get::<_, i64>(3)? as usize,
                    validation_examples: row.get::<_, i64>(4)? as usize,
                })
            })
            .context("failed to query pipeline runs")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map pipeline run rows")?;

        Ok(runs)
    }

    /// Generate a run id from the current UTC time.
    ///
    /// Format: `run_YYYYMMDD_HHMMSS_mmm` (e.g. `run_20250317_143022_123`).
    pub fn generate_run_id() -> String {
        chrono::Utc::now().format("run_%Y%m%d_%H%M%S_%3f").to_string()
    }

    // ------------------------------------------------------------------
    // Key/value state
    // ------------------------------------------------------------------

    /// Persist a JSON value under `key`, overwriting any previous value.
    pub fn save_state(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.conn();
        let json_str =
            serde_json::to_string(value).context("failed to serialize state value")?;
        conn.execute(
            "INSERT OR REPLACE INTO build_state (key, value) VALUES (?1, ?2)",
            params![key, json_str],
        )
        .context("failed to save state")?;
        Ok(())
    }

    /// Load a JSON value by `key`. Returns `None` if the key does not exist.
    pub fn load_state(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT value FROM build_state WHERE key = ?1")
            .context("failed to prepare load_state query")?;

        let mut rows = stmt
            .query_map(params![key], |row| row.get::<_, String>(0))
            .context("failed to query build state")?;

        match rows.next() {
            Some(row_result) => {
                let json_str = row_result.context("failed to read state row")?;
                let value = serde_json::from_str(&json_str)
                    .context("failed to deserialize state value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

fn derived_rows(table: &DerivedTable) -> impl Iterator<Item = (TeamSeasonKey, StatRow)> + '_ {
    table
        .sorted_keys()
        .into_iter()
        .filter_map(move |key| table.get(&key).map(|stats| (key, stats.to_row())))
}

fn normalized_rows(table: &NormalizedTable) -> impl Iterator<Item = (TeamSeasonKey, StatRow)> + '_ {
    table
        .sorted_keys()
        .into_iter()
        .filter_map(move |key| table.get(&key).map(|row| (key, *row)))
}

/// Replace one stage's rows and domain inside `tx`. Returns the rows written.
fn write_stage(
    tx: &Transaction<'_>,
    stage: Stage,
    domain: &Domain,
    rows: impl Iterator<Item = (TeamSeasonKey, StatRow)>,
) -> Result<usize> {
    tx.execute(
        "DELETE FROM team_season_stats WHERE stage = ?1",
        params![stage.as_str()],
    )
    .context("failed to clear previous stage rows")?;

    let mut stmt = tx
        .prepare(
            "INSERT INTO team_season_stats
                (team_id, season, stage, column_index, column_name, value)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .context("failed to prepare stat insert")?;
    let mut written = 0usize;
    for (key, row) in rows {
        for (i, value) in row.iter().enumerate() {
            // SQLite has no NaN; NULL stands in for it.
            let stored = if value.is_nan() { None } else { Some(*value) };
            stmt.execute(params![
                key.team,
                key.season,
                stage.as_str(),
                i as i64,
                COLUMN_NAMES[i],
                stored,
            ])
            .with_context(|| format!("failed to insert {} row {key}", stage.as_str()))?;
        }
        written += 1;
    }

    save_domain(tx, stage, domain)?;
    Ok(written)
}

fn domain_key(stage: Stage) -> String {
    format!("{}_domain", stage.as_str())
}

fn save_domain(tx: &Transaction<'_>, stage: Stage, domain: &Domain) -> Result<()> {
    let stored = StoredDomain {
        teams: (*domain.teams().start(), *domain.teams().end()),
        seasons: (*domain.seasons().start(), *domain.seasons().end()),
    };
    let json_str = serde_json::to_string(&stored).context("failed to serialize domain")?;
    tx.execute(
        "INSERT OR REPLACE INTO build_state (key, value) VALUES (?1, ?2)",
        params![domain_key(stage), json_str],
    )
    .context("failed to save domain")?;
    Ok(())
}
