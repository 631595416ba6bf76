// Batch pipeline: games -> raw totals -> derived rows -> normalized rows ->
// example sets, plus the persisted-table lookups the CLI serves.

use anyhow::{bail, Context, Result};
use bracketcast_core::{
    build, finalize, ingest_sharded, matchup_vector, normalize, ConstantColumnPolicy,
    DerivedTable, Domain, EngineError, ExampleSets, GameRecord, NormalizedTable, Season, TeamId,
    TeamSummary,
};
use bracketcast_ncaa::{domain_from, load_games, TeamDirectory};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::config::Config;
use crate::db::Database;
use crate::export::write_split;

/// In-memory products of one pipeline pass.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub derived: DerivedTable,
    pub normalized: NormalizedTable,
    pub examples: ExampleSets,
}

/// Summary of a `build` run, printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub games: usize,
    pub team_seasons: usize,
    pub constant_columns: Vec<String>,
    pub train_examples: usize,
    pub validation_examples: usize,
}

/// Run every stage over already-loaded games.
pub fn run_on(
    games: &[GameRecord],
    domain: &Domain,
    shards: usize,
    policy: ConstantColumnPolicy,
) -> Result<PipelineOutput, EngineError> {
    let raw = ingest_sharded(domain, games, shards)?;
    let derived = finalize(raw);
    let normalized = normalize(&derived, policy);
    let examples = build(games, &normalized)?;
    Ok(PipelineOutput {
        derived,
        normalized,
        examples,
    })
}

/// Load the configured CSVs, run the pipeline, persist both tables, export
/// the example sets, and record the run.
pub fn run(config: &Config, shards_override: Option<usize>) -> Result<PipelineReport> {
    let shards = shards_override.unwrap_or(config.pipeline.shards);
    if shards == 0 {
        bail!("shard count must be greater than 0");
    }

    let games = load_games(&config.games_path())?;
    let teams = TeamDirectory::load(&config.teams_path(), config.spellings_path().as_deref())?;
    let domain = domain_from(&teams, &games)?;

    let output = run_on(&games, &domain, shards, config.pipeline.constant_columns)
        .context("pipeline failed")?;

    let constant_columns: Vec<String> = output
        .normalized
        .bounds()
        .map(|b| b.constant_columns().into_iter().map(String::from).collect())
        .unwrap_or_default();

    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db = Database::open(&db_path.to_string_lossy())?;
    db.save_tables(&output.derived, &output.normalized)?;

    write_split(&config.train_dir(), &output.examples.train)?;
    write_split(&config.validation_dir(), &output.examples.validation)?;

    let run_id = Database::generate_run_id();
    db.record_run(
        &run_id,
        games.len(),
        output.examples.train.len(),
        output.examples.validation.len(),
    )?;
    db.save_state(
        "last_build",
        &json!({
            "run_id": run_id,
            "shards": shards,
            "constant_columns": config.pipeline.constant_columns,
        }),
    )?;

    let report = PipelineReport {
        run_id,
        games: games.len(),
        team_seasons: output.derived.len(),
        constant_columns,
        train_examples: output.examples.train.len(),
        validation_examples: output.examples.validation.len(),
    };
    info!(
        "Run {} complete: {} games, {} train / {} validation examples",
        report.run_id, report.games, report.train_examples, report.validation_examples
    );
    Ok(report)
}

/// Headline numbers for one team-season from the stored derived table.
pub fn team_summary(db: &Database, team: TeamId, season: Season) -> Result<TeamSummary> {
    let table = db
        .load_derived()?
        .context("no derived table stored; run `bracketcast build` first")?;
    Ok(TeamSummary::from_table(&table, team, season)?)
}

/// Classifier input for `first` vs `second` from the stored normalized table.
pub fn matchup(db: &Database, first: TeamId, second: TeamId, season: Season) -> Result<Vec<f64>> {
    let table = db
        .load_normalized()?
        .context("no normalized table stored; run `bracketcast build` first")?;
    Ok(matchup_vector(&table, first, second, season)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bracketcast_core::{BoxScore, Split, VenueCode, COLUMN_COUNT};

    fn game(season: Season, winner: TeamId, loser: TeamId, venue: VenueCode) -> GameRecord {
        let line = BoxScore {
            fgm: 26,
            fga: 58,
            fgm3: 7,
            fga3: 20,
            ftm: 12,
            fta: 17,
            or: 9,
            dr: 24,
            ast: 14,
            to: 12,
            stl: 7,
            blk: 4,
        };
        GameRecord {
            season,
            day_num: 30,
            winner,
            loser,
            winner_score: 71 + winner,
            loser_score: 60 + loser,
            venue,
            winner_box: line,
            loser_box: BoxScore { fgm: 22, ast: 9, ..line },
        }
    }

    fn games() -> Vec<GameRecord> {
        vec![
            game(2016, 1, 2, VenueCode::Home),
            game(2016, 3, 1, VenueCode::Away),
            game(2017, 2, 3, VenueCode::Neutral),
            game(2018, 1, 3, VenueCode::Home),
            game(2018, 2, 1, VenueCode::Neutral),
        ]
    }

    #[test]
    fn run_on_produces_every_stage() {
        let domain = Domain::new(1..=3, 2016..=2018).unwrap();
        let out = run_on(&games(), &domain, 1, ConstantColumnPolicy::Zero).unwrap();
        assert_eq!(out.derived.len(), 9);
        assert_eq!(out.normalized.len(), 9);
        assert_eq!(out.examples.total(), 10);
        assert_eq!(out.examples.split(Split::Train).len(), 6);
        assert_eq!(out.examples.split(Split::Validation).len(), 4);
    }

    #[test]
    fn sharding_does_not_change_output() {
        let domain = Domain::new(1..=3, 2016..=2018).unwrap();
        let one = run_on(&games(), &domain, 1, ConstantColumnPolicy::Zero).unwrap();
        let many = run_on(&games(), &domain, 4, ConstantColumnPolicy::Zero).unwrap();
        for key in one.derived.sorted_keys() {
            assert_eq!(one.derived.get(&key), many.derived.get(&key));
        }
        assert_eq!(one.examples, many.examples);
    }

    #[test]
    fn out_of_domain_game_aborts() {
        let domain = Domain::new(1..=2, 2016..=2018).unwrap();
        let err = run_on(&games(), &domain, 1, ConstantColumnPolicy::Zero).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRecord { .. }));
    }

    #[test]
    fn lookups_need_a_stored_build() {
        let db = Database::open(":memory:").unwrap();
        assert!(team_summary(&db, 1, 2016).is_err());
        assert!(matchup(&db, 1, 2, 2016).is_err());
    }

    #[test]
    fn lookups_read_stored_tables() {
        let domain = Domain::new(1..=3, 2016..=2018).unwrap();
        let out = run_on(&games(), &domain, 2, ConstantColumnPolicy::Zero).unwrap();
        let db = Database::open(":memory:").unwrap();
        db.save_derived(&out.derived).unwrap();
        db.save_normalized(&out.normalized).unwrap();

        let summary = team_summary(&db, 1, 2016).unwrap();
        assert_eq!(summary, TeamSummary::from_table(&out.derived, 1, 2016).unwrap());

        let vector = matchup(&db, 1, 2, 2016).unwrap();
        assert_eq!(vector.len(), 2 * COLUMN_COUNT);
        assert_eq!(vector, matchup_vector(&out.normalized, 1, 2, 2016).unwrap());

        let missing = team_summary(&db, 9, 2016).unwrap_err();
        assert!(missing.to_string().contains("team 9 in season 2016"));
    }
}
