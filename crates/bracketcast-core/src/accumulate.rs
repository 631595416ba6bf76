// Season accumulation: credits each game's box score to the right
// (team, season, role) bucket.
//
// Accumulation is a plain field-wise sum, so the games can be split into any
// number of shards and the partial tables merged afterwards.

use crate::error::EngineError;
use crate::game::{BoxScore, GameRecord, TeamId, VenueCode};
use crate::team_season::{Domain, Role, TeamSeasonKey};
use rayon::prelude::*;
use std::collections::HashMap;
use std::ops::AddAssign;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Raw totals
// ---------------------------------------------------------------------------

/// Running sums for one venue role of one team-season.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleTotals {
    pub games: u32,
    pub wins: u32,
    pub score: u32,
    pub opp_score: u32,
    pub team: BoxScore,
    pub opp: BoxScore,
}

impl RoleTotals {
    fn credit(&mut self, line: &GameLine) {
        self.games += 1;
        self.wins += line.wins;
        self.score += line.score;
        self.opp_score += line.opp_score;
        self.team += line.team;
        self.opp += line.opp;
    }
}

impl AddAssign for RoleTotals {
    fn add_assign(&mut self, rhs: Self) {
        self.games += rhs.games;
        self.wins += rhs.wins;
        self.score += rhs.score;
        self.opp_score += rhs.opp_score;
        self.team += rhs.team;
        self.opp += rhs.opp;
    }
}

/// Raw accumulator row: home and away totals for one team-season.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawTeamSeason {
    pub home: RoleTotals,
    pub away: RoleTotals,
}

impl RawTeamSeason {
    pub fn role(&self, role: Role) -> &RoleTotals {
        match role {
            Role::Home => &self.home,
            Role::Away => &self.away,
        }
    }

    fn role_mut(&mut self, role: Role) -> &mut RoleTotals {
        match role {
            Role::Home => &mut self.home,
            Role::Away => &mut self.away,
        }
    }

    /// Games played across both roles.
    pub fn games(&self) -> u32 {
        self.home.games + self.away.games
    }
}

impl AddAssign for RawTeamSeason {
    fn add_assign(&mut self, rhs: Self) {
        self.home += rhs.home;
        self.away += rhs.away;
    }
}

// ---------------------------------------------------------------------------
// Role resolution
// ---------------------------------------------------------------------------

/// One team's share of a game, as credited to a single role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameLine {
    pub score: u32,
    pub opp_score: u32,
    /// 1 for the winner, 0 for the loser.
    pub wins: u32,
    pub team: BoxScore,
    pub opp: BoxScore,
}

impl GameLine {
    pub fn winner(game: &GameRecord) -> Self {
        Self {
            score: game.winner_score,
            opp_score: game.loser_score,
            wins: 1,
            team: game.winner_box,
            opp: game.loser_box,
        }
    }

    pub fn loser(game: &GameRecord) -> Self {
        Self {
            score: game.loser_score,
            opp_score: game.winner_score,
            wins: 0,
            team: game.loser_box,
            opp: game.winner_box,
        }
    }
}

/// Which team is nominally at home and which role each side is credited to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleAssignment {
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub winner_role: Role,
    pub loser_role: Role,
}

/// Resolve roles for a game from its venue code.
///
/// On a neutral floor both teams are credited as away, while the winner is
/// still reported as the nominal home team for feature ordering.
pub fn resolve_roles(venue: VenueCode, winner: TeamId, loser: TeamId) -> RoleAssignment {
    match venue {
        VenueCode::Home => RoleAssignment {
            home_team: winner,
            away_team: loser,
            winner_role: Role::Home,
            loser_role: Role::Away,
        },
        VenueCode::Away => RoleAssignment {
            home_team: loser,
            away_team: winner,
            winner_role: Role::Away,
            loser_role: Role::Home,
        },
        VenueCode::Neutral => RoleAssignment {
            home_team: winner,
            away_team: loser,
            winner_role: Role::Away,
            loser_role: Role::Away,
        },
    }
}

/// The two credits a game produces, winner first.
pub fn attributions(game: &GameRecord) -> [(TeamSeasonKey, Role, GameLine); 2] {
    let roles = resolve_roles(game.venue, game.winner, game.loser);
    [
        (
            TeamSeasonKey::new(game.winner, game.season),
            roles.winner_role,
            GameLine::winner(game),
        ),
        (
            TeamSeasonKey::new(game.loser, game.season),
            roles.loser_role,
            GameLine::loser(game),
        ),
    ]
}

/// Check a record against the domain before it is credited anywhere.
pub fn validate_record(domain: &Domain, index: usize, game: &GameRecord) -> Result<(), EngineError> {
    let invalid = |reason: String| EngineError::InvalidRecord { index, reason };

    if !domain.contains_season(game.season) {
        return Err(invalid(format!(
            "season {} outside {}..={}",
            game.season,
            domain.seasons().start(),
            domain.seasons().end()
        )));
    }
    for team in [game.winner, game.loser] {
        if !domain.contains_team(team) {
            return Err(invalid(format!(
                "team {} outside {}..={}",
                team,
                domain.teams().start(),
                domain.teams().end()
            )));
        }
    }
    if game.winner == game.loser {
        return Err(invalid(format!("team {} listed as both winner and loser", game.winner)));
    }
    if let Some(category) = game.winner_box.impossible_shooting() {
        return Err(invalid(format!("winner made more {category} than attempted")));
    }
    if let Some(category) = game.loser_box.impossible_shooting() {
        return Err(invalid(format!("loser made more {category} than attempted")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Dense table
// ---------------------------------------------------------------------------

/// Raw accumulator table with one row per key in the domain.
#[derive(Debug, Clone)]
pub struct RawTable {
    domain: Domain,
    rows: HashMap<TeamSeasonKey, RawTeamSeason>,
    games: usize,
}

impl RawTable {
    /// Build the zeroed table over the full team × season cross product.
    pub fn new(domain: &Domain) -> Self {
        let mut rows = HashMap::with_capacity(domain.len());
        for team in domain.teams() {
            for season in domain.seasons() {
                rows.insert(TeamSeasonKey::new(team, season), RawTeamSeason::default());
            }
        }
        Self {
            domain: domain.clone(),
            rows,
            games: 0,
        }
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn get(&self, key: &TeamSeasonKey) -> Option<&RawTeamSeason> {
        self.rows.get(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TeamSeasonKey, &RawTeamSeason)> {
        self.rows.iter()
    }

    /// Number of games credited so far.
    pub fn games_ingested(&self) -> usize {
        self.games
    }

    pub(crate) fn into_rows(self) -> HashMap<TeamSeasonKey, RawTeamSeason> {
        self.rows
    }

    /// Credit one team's line to a role of an existing row.
    pub fn attribute(&mut self, key: TeamSeasonKey, role: Role, line: &GameLine) -> Result<(), EngineError> {
        let row = self.rows.get_mut(&key).ok_or(EngineError::MissingAggregate {
            team: key.team,
            season: key.season,
        })?;
        row.role_mut(role).credit(line);
        Ok(())
    }

    /// Validate and credit a single game to both teams.
    pub fn ingest_game(&mut self, index: usize, game: &GameRecord) -> Result<(), EngineError> {
        validate_record(&self.domain, index, game)?;
        for (key, role, line) in attributions(game) {
            self.attribute(key, role, &line)?;
        }
        self.games += 1;
        Ok(())
    }

    /// Field-wise sum of another table over the same domain.
    pub fn merge(&mut self, other: RawTable) -> Result<(), EngineError> {
        if other.domain != self.domain {
            return Err(EngineError::InvalidDomain(
                "cannot merge tables built over different domains".into(),
            ));
        }
        self.games += other.games;
        self.absorb(other.rows)
    }

    fn absorb(&mut self, rows: HashMap<TeamSeasonKey, RawTeamSeason>) -> Result<(), EngineError> {
        for (key, partial) in rows {
            let row = self.rows.get_mut(&key).ok_or(EngineError::MissingAggregate {
                team: key.team,
                season: key.season,
            })?;
            *row += partial;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Single linear pass over all games.
pub fn ingest(domain: &Domain, games: &[GameRecord]) -> Result<RawTable, EngineError> {
    let mut table = RawTable::new(domain);
    for (index, game) in games.iter().enumerate() {
        table.ingest_game(index, game)?;
    }
    info!(
        "Accumulated {} games into {} team-season rows",
        table.games_ingested(),
        table.len()
    );
    Ok(table)
}

/// Sparse per-shard deltas. Only ever merged into a dense [`RawTable`].
#[derive(Debug, Default)]
struct ShardTotals {
    rows: HashMap<TeamSeasonKey, RawTeamSeason>,
    games: usize,
}

/// Accumulate with the games split into `shards` chunks processed in parallel.
///
/// Produces exactly the table [`ingest`] would.
pub fn ingest_sharded(domain: &Domain, games: &[GameRecord], shards: usize) -> Result<RawTable, EngineError> {
    if shards <= 1 || games.len() < 2 {
        return ingest(domain, games);
    }
    let chunk_size = games.len().div_ceil(shards);

    let results: Vec<Result<ShardTotals, EngineError>> = games
        .par_chunks(chunk_size)
        .enumerate()
        .map(|(shard, chunk)| -> Result<ShardTotals, EngineError> {
            let offset = shard * chunk_size;
            let mut totals = ShardTotals::default();
            for (i, game) in chunk.iter().enumerate() {
                validate_record(domain, offset + i, game)?;
                for (key, role, line) in attributions(game) {
                    totals.rows.entry(key).or_default().role_mut(role).credit(&line);
                }
                totals.games += 1;
            }
            debug!("shard {} accumulated {} games", shard, totals.games);
            Ok(totals)
        })
        .collect();
    let partials = first_error(results)?;

    let mut table = RawTable::new(domain);
    let shard_count = partials.len();
    for partial in partials {
        table.games += partial.games;
        table.absorb(partial.rows)?;
    }
    info!(
        "Accumulated {} games across {} shards into {} team-season rows",
        table.games_ingested(),
        shard_count,
        table.len()
    );
    Ok(table)
}

/// Collect shard results, reporting the failure with the lowest record index
/// so the error matches what [`ingest`] would return.
fn first_error(results: Vec<Result<ShardTotals, EngineError>>) -> Result<Vec<ShardTotals>, EngineError> {
    let mut partials = Vec::with_capacity(results.len());
    let mut earliest: Option<EngineError> = None;
    for result in results {
        match result {
            Ok(totals) => partials.push(totals),
            Err(e) => {
                let replace = match (&earliest, &e) {
                    (None, _) => true,
                    (
                        Some(EngineError::InvalidRecord { index: seen, .. }),
                        EngineError::InvalidRecord { index, .. },
                    ) => index < seen,
                    _ => false,
                };
                if replace {
                    earliest = Some(e);
                }
            }
        }
    }
    match earliest {
        Some(e) => Err(e),
        None => Ok(partials),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
