// Derived metrics: shooting percentages and per-game averages computed from
// the raw season totals, plus the fixed column layout of a feature row.

use crate::accumulate::{RawTable, RoleTotals};
use crate::error::EngineError;
use crate::team_season::{Domain, Role, TeamSeasonKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// Number of columns in a team-season feature row.
pub const COLUMN_COUNT: usize = 68;

/// One team-season as a positional feature row.
pub type StatRow = [f64; COLUMN_COUNT];

/// Column names in feature-row order. Downstream consumers depend on this
/// ordering.
pub const COLUMN_NAMES: [&str; COLUMN_COUNT] = [
    "score_home",
    "score_away",
    "opp_score_home",
    "opp_score_away",
    "win_perct_home",
    "win_perct_away",
    "fg_perct_home",
    "fg_made_home",
    "fg_att_home",
    "fg_perct_away",
    "fg_made_away",
    "fg_att_away",
    "opp_fg_perct_home",
    "opp_fg_made_home",
    "opp_fg_att_home",
    "opp_fg_perct_away",
    "opp_fg_made_away",
    "opp_fg_att_away",
    "3pt_perct_home",
    "3pt_fg_made_home",
    "3pt_fg_att_home",
    "3pt_perct_away",
    "3pt_fg_made_away",
    "3pt_fg_att_away",
    "opp_3pt_perct_home",
    "opp_3pt_fg_made_home",
    "opp_3pt_fg_att_home",
    "opp_3pt_perct_away",
    "opp_3pt_fg_made_away",
    "opp_3pt_fg_att_away",
    "ft_perct_home",
    "ft_made_home",
    "ft_att_home",
    "ft_perct_away",
    "ft_made_away",
    "ft_att_away",
    "opp_ft_perct_home",
    "opp_ft_made_home",
    "opp_ft_att_home",
    "opp_ft_perct_away",
    "opp_ft_made_away",
    "opp_ft_att_away",
    "or_home",
    "or_away",
    "opp_or_home",
    "opp_or_away",
    "dr_home",
    "dr_away",
    "opp_dr_home",
    "opp_dr_away",
    "ast_home",
    "ast_away",
    "opp_ast_home",
    "opp_ast_away",
    "to_home",
    "to_away",
    "opp_to_home",
    "opp_to_away",
    "stl_home",
    "stl_away",
    "opp_stl_home",
    "opp_stl_away",
    "blk_home",
    "blk_away",
    "opp_blk_home",
    "opp_blk_away",
    "games_home",
    "games_away",
];

/// Position of a named column, if it exists.
pub fn column_index(name: &str) -> Option<usize> {
    COLUMN_NAMES.iter().position(|c| *c == name)
}

// ---------------------------------------------------------------------------
// Derived row types
// ---------------------------------------------------------------------------

/// Percentage with the totals it was computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Shooting {
    pub pct: f64,
    pub made: f64,
    pub att: f64,
}

impl Shooting {
    /// `made / att`, left at 0.0 when there were no attempts.
    pub fn from_counts(made: u32, att: u32) -> Self {
        let pct = if att > 0 { made as f64 / att as f64 } else { 0.0 };
        Self {
            pct,
            made: made as f64,
            att: att as f64,
        }
    }
}

/// Derived stats for one venue role. Per-game fields are averages over
/// `games`; shooting totals and `games` stay cumulative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedRole {
    pub score: f64,
    pub opp_score: f64,
    pub win_pct: f64,
    pub fg: Shooting,
    pub opp_fg: Shooting,
    pub fg3: Shooting,
    pub opp_fg3: Shooting,
    pub ft: Shooting,
    pub opp_ft: Shooting,
    pub or: f64,
    pub opp_or: f64,
    pub dr: f64,
    pub opp_dr: f64,
    pub ast: f64,
    pub opp_ast: f64,
    pub to: f64,
    pub opp_to: f64,
    pub stl: f64,
    pub opp_stl: f64,
    pub blk: f64,
    pub opp_blk: f64,
    pub games: f64,
}

impl DerivedRole {
    pub fn from_totals(t: &RoleTotals) -> Self {
        let per_game = |sum: u32| {
            if t.games > 0 {
                sum as f64 / t.games as f64
            } else {
                0.0
            }
        };
        Self {
            score: per_game(t.score),
            opp_score: per_game(t.opp_score),
            win_pct: per_game(t.wins),
            fg: Shooting::from_counts(t.team.fgm, t.team.fga),
            opp_fg: Shooting::from_counts(t.opp.fgm, t.opp.fga),
            fg3: Shooting::from_counts(t.team.fgm3, t.team.fga3),
            opp_fg3: Shooting::from_counts(t.opp.fgm3, t.opp.fga3),
            ft: Shooting::from_counts(t.team.ftm, t.team.fta),
            opp_ft: Shooting::from_counts(t.opp.ftm, t.opp.fta),
            or: per_game(t.team.or),
            opp_or: per_game(t.opp.or),
            dr: per_game(t.team.dr),
            opp_dr: per_game(t.opp.dr),
            ast: per_game(t.team.ast),
            opp_ast: per_game(t.opp.ast),
            to: per_game(t.team.to),
            opp_to: per_game(t.opp.to),
            stl: per_game(t.team.stl),
            opp_stl: per_game(t.opp.stl),
            blk: per_game(t.team.blk),
            opp_blk: per_game(t.opp.blk),
            games: t.games as f64,
        }
    }
}

/// Derived stats for one team-season, both roles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedTeamSeason {
    pub home: DerivedRole,
    pub away: DerivedRole,
}

impl DerivedTeamSeason {
    pub fn role(&self, role: Role) -> &DerivedRole {
        match role {
            Role::Home => &self.home,
            Role::Away => &self.away,
        }
    }

    /// Flatten into feature-row order (see [`COLUMN_NAMES`]).
    #[rustfmt::skip]
    pub fn to_row(&self) -> StatRow {
        let (h, a) = (&self.home, &self.away);
        [
            h.score, a.score, h.opp_score, a.opp_score, h.win_pct, a.win_pct,
            h.fg.pct, h.fg.made, h.fg.att, a.fg.pct, a.fg.made, a.fg.att,
            h.opp_fg.pct, h.opp_fg.made, h.opp_fg.att, a.opp_fg.pct, a.opp_fg.made, a.opp_fg.att,
            h.fg3.pct, h.fg3.made, h.fg3.att, a.fg3.pct, a.fg3.made, a.fg3.att,
            h.opp_fg3.pct, h.opp_fg3.made, h.opp_fg3.att, a.opp_fg3.pct, a.opp_fg3.made, a.opp_fg3.att,
            h.ft.pct, h.ft.made, h.ft.att, a.ft.pct, a.ft.made, a.ft.att,
            h.opp_ft.pct, h.opp_ft.made, h.opp_ft.att, a.opp_ft.pct, a.opp_ft.made, a.opp_ft.att,
            h.or, a.or, h.opp_or, a.opp_or,
            h.dr, a.dr, h.opp_dr, a.opp_dr,
            h.ast, a.ast, h.opp_ast, a.opp_ast,
            h.to, a.to, h.opp_to, a.opp_to,
            h.stl, a.stl, h.opp_stl, a.opp_stl,
            h.blk, a.blk, h.opp_blk, a.opp_blk,
            h.games, a.games,
        ]
    }

    /// Rebuild named fields from a feature row.
    pub fn from_row(r: &StatRow) -> Self {
        let shooting = |i: usize| Shooting {
            pct: r[i],
            made: r[i + 1],
            att: r[i + 2],
        };
        let home = DerivedRole {
            score: r[0],
            opp_score: r[2],
            win_pct: r[4],
            fg: shooting(6),
            opp_fg: shooting(12),
            fg3: shooting(18),
            opp_fg3: shooting(24),
            ft: shooting(30),
            opp_ft: shooting(36),
            or: r[42],
            opp_or: r[44],
            dr: r[46],
            opp_dr: r[48],
            ast: r[50],
            opp_ast: r[52],
            to: r[54],
            opp_to: r[56],
            stl: r[58],
            opp_stl: r[60],
            blk: r[62],
            opp_blk: r[64],
            games: r[66],
        };
        let away = DerivedRole {
            score: r[1],
            opp_score: r[3],
            win_pct: r[5],
            fg: shooting(9),
            opp_fg: shooting(15),
            fg3: shooting(21),
            opp_fg3: shooting(27),
            ft: shooting(33),
            opp_ft: shooting(39),
            or: r[43],
            opp_or: r[45],
            dr: r[47],
            opp_dr: r[49],
            ast: r[51],
            opp_ast: r[53],
            to: r[55],
            opp_to: r[57],
            stl: r[59],
            opp_stl: r[61],
            blk: r[63],
            opp_blk: r[65],
            games: r[67],
        };
        Self { home, away }
    }
}

// ---------------------------------------------------------------------------
// Derived table
// ---------------------------------------------------------------------------

/// Per-key derived stats. Only obtainable by consuming a finished
/// [`RawTable`], so the sums are converted exactly once.
#[derive(Debug, Clone)]
pub struct DerivedTable {
    domain: Domain,
    rows: HashMap<TeamSeasonKey, DerivedTeamSeason>,
}

impl DerivedTable {
    /// Assemble a table from already-derived rows, e.g. when reloading from
    /// storage.
    pub fn from_rows(domain: Domain, rows: HashMap<TeamSeasonKey, DerivedTeamSeason>) -> Self {
        Self { domain, rows }
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn get(&self, key: &TeamSeasonKey) -> Option<&DerivedTeamSeason> {
        self.rows.get(key)
    }

    /// Lookup that treats an absent key as a contract violation.
    pub fn require(&self, key: &TeamSeasonKey) -> Result<&DerivedTeamSeason, EngineError> {
        self.rows.get(key).ok_or(EngineError::MissingAggregate {
            team: key.team,
            season: key.season,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TeamSeasonKey, &DerivedTeamSeason)> {
        self.rows.iter()
    }

    /// Keys in (team, season) order.
    pub fn sorted_keys(&self) -> Vec<TeamSeasonKey> {
        let mut keys: Vec<_> = self.rows.keys().copied().collect();
        keys.sort_unstable();
        keys
    }
}

/// Convert accumulated sums into rates and per-game averages.
pub fn finalize(raw: RawTable) -> DerivedTable {
    let domain = raw.domain().clone();
    let games = raw.games_ingested();
    let rows: HashMap<_, _> = raw
        .into_rows()
        .into_iter()
        .map(|(key, totals)| {
            let derived = DerivedTeamSeason {
                home: DerivedRole::from_totals(&totals.home),
                away: DerivedRole::from_totals(&totals.away),
            };
            (key, derived)
        })
        .collect();
    info!("Derived metrics for {} rows from {} games", rows.len(), games);
    DerivedTable { domain, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulate::ingest;
    use crate::game::{BoxScore, VenueCode};
    use crate::testutil::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn column_names_are_unique_and_complete() {
        let mut names: Vec<_> = COLUMN_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), COLUMN_COUNT);
        assert_eq!(column_index("score_home"), Some(0));
        assert_eq!(column_index("fg_perct_home"), Some(6));
        assert_eq!(column_index("opp_3pt_fg_att_away"), Some(29));
        assert_eq!(column_index("or_home"), Some(42));
        assert_eq!(column_index("games_away"), Some(67));
        assert_eq!(column_index("nope"), None);
    }

    #[test]
    fn row_positions_match_column_names() {
        let mut row = [0.0; COLUMN_COUNT];
        for (i, v) in row.iter_mut().enumerate() {
            *v = i as f64;
        }
        let stats = DerivedTeamSeason::from_row(&row);
        assert_eq!(stats.to_row(), row);

        assert_eq!(stats.home.fg3.att, column_index("3pt_fg_att_home").unwrap() as f64);
        assert_eq!(stats.away.opp_ft.pct, column_index("opp_ft_perct_away").unwrap() as f64);
        assert_eq!(stats.away.to, column_index("to_away").unwrap() as f64);
        assert_eq!(stats.home.opp_blk, column_index("opp_blk_home").unwrap() as f64);
        assert_eq!(stats.home.games, column_index("games_home").unwrap() as f64);
    }

    #[test]
    fn shooting_guards_zero_attempts() {
        let s = Shooting::from_counts(0, 0);
        assert_eq!(s.pct, 0.0);
        let s = Shooting::from_counts(7, 20);
        assert!(approx_eq(s.pct, 0.35, 1e-12));
        assert_eq!(s.made, 7.0);
        assert_eq!(s.att, 20.0);
    }

    #[test]
    fn scenario_single_home_game() {
        let domain = Domain::new(101..=202, 2017..=2017).unwrap();
        let derived = finalize(ingest(&domain, &[scenario_game()]).unwrap());

        let winner = derived.get(&TeamSeasonKey::new(101, 2017)).unwrap();
        assert_eq!(winner.home.games, 1.0);
        assert_eq!(winner.home.score, 70.0);
        assert_eq!(winner.home.opp_score, 60.0);
        assert_eq!(winner.home.win_pct, 1.0);
        assert!(approx_eq(winner.home.fg.pct, 0.5, 1e-12));
        assert_eq!(winner.home.fg.made, 25.0);
        assert_eq!(winner.home.fg.att, 50.0);
        assert_eq!(winner.away, DerivedRole::default());

        let loser = derived.get(&TeamSeasonKey::new(202, 2017)).unwrap();
        assert_eq!(loser.away.score, 60.0);
        assert_eq!(loser.away.win_pct, 0.0);
        assert!(approx_eq(loser.away.fg.pct, 20.0 / 55.0, 1e-12));
        assert!(approx_eq(loser.away.fg.pct, 0.364, 1e-3));
    }

    #[test]
    fn per_game_averages_divide_by_role_games() {
        let domain = Domain::new(1..=3, 2012..=2012).unwrap();
        let mut g1 = game(2012, 1, 2, VenueCode::Home);
        g1.winner_score = 80;
        g1.winner_box.ast = 10;
        g1.winner_box.or = 12;
        let mut g2 = game(2012, 3, 1, VenueCode::Away);
        g2.loser_score = 64;
        g2.loser_box.ast = 20;
        g2.loser_box.or = 6;

        let derived = finalize(ingest(&domain, &[g1, g2]).unwrap());
        let team = derived.get(&TeamSeasonKey::new(1, 2012)).unwrap();
        assert_eq!(team.home.games, 2.0);
        assert!(approx_eq(team.home.score, 72.0, 1e-12));
        assert!(approx_eq(team.home.ast, 15.0, 1e-12));
        assert!(approx_eq(team.home.or, 9.0, 1e-12));
        assert!(approx_eq(team.home.win_pct, 0.5, 1e-12));
        assert_eq!(team.away, DerivedRole::default());
    }

    #[test]
    fn zero_game_rows_stay_zero() {
        let domain = Domain::new(1..=4, 2012..=2013).unwrap();
        let derived = finalize(ingest(&domain, &[game(2012, 1, 2, VenueCode::Home)]).unwrap());
        assert_eq!(derived.len(), 8);
        for key in [TeamSeasonKey::new(3, 2012), TeamSeasonKey::new(1, 2013)] {
            assert_eq!(derived.get(&key), Some(&DerivedTeamSeason::default()));
        }
    }

    #[test]
    fn zero_attempts_leave_percentage_zero_but_averages_computed() {
        let domain = Domain::new(1..=2, 2012..=2012).unwrap();
        let mut g = game(2012, 1, 2, VenueCode::Home);
        g.winner_box = BoxScore {
            stl: 4,
            ..BoxScore::default()
        };
        let derived = finalize(ingest(&domain, &[g]).unwrap());
        let team = derived.get(&TeamSeasonKey::new(1, 2012)).unwrap();
        assert_eq!(team.home.fg.pct, 0.0);
        assert_eq!(team.home.ft.pct, 0.0);
        assert_eq!(team.home.stl, 4.0);
    }

    #[test]
    fn percentages_within_unit_interval() {
        let domain = Domain::new(1..=8, 2010..=2013).unwrap();
        let derived = finalize(ingest(&domain, &sample_season(&domain, 300)).unwrap());
        for (_, row) in derived.iter() {
            for role in [&row.home, &row.away] {
                for s in [role.fg, role.opp_fg, role.fg3, role.opp_fg3, role.ft, role.opp_ft] {
                    if s.att > 0.0 {
                        assert!((0.0..=1.0).contains(&s.pct), "pct {} out of range", s.pct);
                    }
                }
            }
        }
    }

    #[test]
    fn require_reports_missing_key() {
        let domain = Domain::new(1..=2, 2012..=2012).unwrap();
        let derived = finalize(ingest(&domain, &[]).unwrap());
        let err = derived.require(&TeamSeasonKey::new(9, 2012)).unwrap_err();
        assert!(matches!(
            err,
            EngineError::MissingAggregate {
                team: 9,
                season: 2012
            }
        ));
    }
}
