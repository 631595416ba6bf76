// bracketcast entry point.
//
// Every subcommand:
// 1. Initializes tracing (log to file, not terminal)
// 2. Loads config, copying defaults/ on first run
// 3. Runs its stage against the configured CSVs or the stored tables
// 4. Prints a JSON result to stdout

use anyhow::{bail, Context};
use bracketcast_app::config::{self, Config};
use bracketcast_app::db::Database;
use bracketcast_app::pipeline;
use bracketcast_core::{Season, TeamId};
use bracketcast_ncaa::TeamDirectory;
use clap::{Parser, Subcommand};
use tracing::{error, info};

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "NCAA season aggregation and matchup featurization", long_about = None)]
struct CommandArgs {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Run the full pipeline and export training/validation sets
    Build(#[clap(flatten)] BuildArg),
    /// Print a team's headline season numbers
    Stats(#[clap(flatten)] StatsArg),
    /// Print the classifier input for a hypothetical game
    Matchup(#[clap(flatten)] MatchupArg),
}

#[derive(Debug, Clone, clap::Args)]
struct BuildArg {
    /// Number of parallel ingestion shards (overrides pipeline.shards)
    #[arg(long)]
    shards: Option<usize>,
}

#[derive(Debug, Clone, clap::Args)]
struct StatsArg {
    /// Team id or name spelling
    team: String,
    /// Season (defaults to lookup.season)
    #[arg(long)]
    season: Option<Season>,
}

#[derive(Debug, Clone, clap::Args)]
struct MatchupArg {
    /// First team (id or name spelling)
    first: String,
    /// Second team (id or name spelling)
    second: String,
    /// Season (defaults to lookup.season)
    #[arg(long)]
    season: Option<Season>,
}

fn main() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    init_tracing()?;
    info!("bracketcast starting: {:?}", args.mode);

    let config = config::load_config().context("failed to load configuration")?;

    let result = match &args.mode {
        Mode::Build(arg) => run_build(&config, arg),
        Mode::Stats(arg) => run_stats(&config, arg),
        Mode::Matchup(arg) => run_matchup(&config, arg),
    };
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

fn run_build(config: &Config, arg: &BuildArg) -> anyhow::Result<()> {
    let report = pipeline::run(config, arg.shards).context("build failed")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_stats(config: &Config, arg: &StatsArg) -> anyhow::Result<()> {
    let teams = load_directory(config)?;
    let team = resolve_team(&teams, &arg.team)?;
    let season = arg.season.unwrap_or(config.lookup.season);

    let db = open_database(config)?;
    let summary = pipeline::team_summary(&db, team, season)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_matchup(config: &Config, arg: &MatchupArg) -> anyhow::Result<()> {
    let teams = load_directory(config)?;
    let first = resolve_team(&teams, &arg.first)?;
    let second = resolve_team(&teams, &arg.second)?;
    let season = arg.season.unwrap_or(config.lookup.season);

    let db = open_database(config)?;
    let vector = pipeline::matchup(&db, first, second, season)?;
    println!("{}", serde_json::to_string(&vector)?);
    Ok(())
}

fn load_directory(config: &Config) -> anyhow::Result<TeamDirectory> {
    TeamDirectory::load(&config.teams_path(), config.spellings_path().as_deref())
        .context("failed to load team list")
}

fn resolve_team(teams: &TeamDirectory, query: &str) -> anyhow::Result<TeamId> {
    match teams.resolve(query) {
        Some(id) => {
            info!("'{}' resolved to {} ({})", query, id, teams.name(id).unwrap_or("?"));
            Ok(id)
        }
        None => bail!("unknown team '{query}'"),
    }
}

fn open_database(config: &Config) -> anyhow::Result<Database> {
    let path = config.database_path();
    if !path.exists() {
        bail!(
            "database {} not found; run `bracketcast build` first",
            path.display()
        );
    }
    Database::open(&path.to_string_lossy()).context("failed to open database")
}

/// Initialize tracing to log to a file (not the terminal, which carries the
/// JSON output).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("bracketcast.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bracketcast=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
