// Headline per-team numbers for display.

use crate::derive::DerivedTable;
use crate::error::EngineError;
use crate::game::{Season, TeamId};
use crate::team_season::TeamSeasonKey;
use serde::Serialize;

/// Home-role per-game averages for one team-season.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TeamSummary {
    #[serde(skip)]
    pub team: TeamId,
    #[serde(skip)]
    pub season: Season,
    pub score: f64,
    pub opp_score: f64,
    pub off_reb: f64,
    pub def_reb: f64,
    pub ast: f64,
    pub stl: f64,
    pub blk: f64,
}

impl TeamSummary {
    pub fn from_table(table: &DerivedTable, team: TeamId, season: Season) -> Result<Self, EngineError> {
        let home = &table.require(&TeamSeasonKey::new(team, season))?.home;
        Ok(Self {
            team,
            season,
            score: home.score,
            opp_score: home.opp_score,
            off_reb: home.or,
            def_reb: home.dr,
            ast: home.ast,
            stl: home.stl,
            blk: home.blk,
        })
    }
}
