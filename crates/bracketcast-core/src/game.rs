// Game records as delivered by a data source. Read-only to the engine.

use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

pub type TeamId = u32;
pub type Season = u16;

/// Where a game was played, relative to the winning team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VenueCode {
    Home,
    Away,
    Neutral,
}

impl VenueCode {
    /// Parse a single-letter location code (`H`, `A`, `N`).
    ///
    /// Codes are case-sensitive. Anything other than `H` or `A` is treated
    /// as a neutral site.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "H" => VenueCode::Home,
            "A" => VenueCode::Away,
            _ => VenueCode::Neutral,
        }
    }
}

/// Per-team counting stats for one game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxScore {
    pub fgm: u32,
    pub fga: u32,
    pub fgm3: u32,
    pub fga3: u32,
    pub ftm: u32,
    pub fta: u32,
    pub or: u32,
    pub dr: u32,
    pub ast: u32,
    pub to: u32,
    pub stl: u32,
    pub blk: u32,
}

impl BoxScore {
    /// Returns the name of the first shooting category whose makes exceed
    /// its attempts, if any.
    pub fn impossible_shooting(&self) -> Option<&'static str> {
        if self.fgm > self.fga {
            Some("field goals")
        } else if self.fgm3 > self.fga3 {
            Some("3-point field goals")
        } else if self.ftm > self.fta {
            Some("free throws")
        } else {
            None
        }
    }
}

impl AddAssign for BoxScore {
    fn add_assign(&mut self, rhs: Self) {
        self.fgm += rhs.fgm;
        self.fga += rhs.fga;
        self.fgm3 += rhs.fgm3;
        self.fga3 += rhs.fga3;
        self.ftm += rhs.ftm;
        self.fta += rhs.fta;
        self.or += rhs.or;
        self.dr += rhs.dr;
        self.ast += rhs.ast;
        self.to += rhs.to;
        self.stl += rhs.stl;
        self.blk += rhs.blk;
    }
}

/// One completed game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub season: Season,
    /// Day within the season as reported by the source. Not used by the
    /// aggregation.
    pub day_num: u16,
    pub winner: TeamId,
    pub loser: TeamId,
    pub winner_score: u32,
    pub loser_score: u32,
    pub venue: VenueCode,
    pub winner_box: BoxScore,
    pub loser_box: BoxScore,
}
