// Game results loading.
//
// Reads the Kaggle "detailed results" CSV: one row per game with the
// winner's (W*) and loser's (L*) box score. Unlike the team list, game rows
// are never skipped: a malformed row fails the whole load.

use crate::error::LoadError;
use bracketcast_core::{BoxScore, GameRecord, VenueCode};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Detailed-results CSV row. Columns not listed here (NumOT, WPF, LPF, ...)
/// are ignored.
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct RawDetailedResult {
    Season: u16,
    #[serde(default)]
    DayNum: u16,
    WTeamID: u32,
    WScore: u32,
    LTeamID: u32,
    LScore: u32,
    WLoc: String,
    WFGM: u32,
    WFGA: u32,
    WFGM3: u32,
    WFGA3: u32,
    WFTM: u32,
    WFTA: u32,
    WOR: u32,
    WDR: u32,
    WAst: u32,
    WTO: u32,
    WStl: u32,
    WBlk: u32,
    LFGM: u32,
    LFGA: u32,
    LFGM3: u32,
    LFGA3: u32,
    LFTM: u32,
    LFTA: u32,
    LOR: u32,
    LDR: u32,
    LAst: u32,
    LTO: u32,
    LStl: u32,
    LBlk: u32,
}

impl From<RawDetailedResult> for GameRecord {
    fn from(raw: RawDetailedResult) -> Self {
        GameRecord {
            season: raw.Season,
            day_num: raw.DayNum,
            winner: raw.WTeamID,
            loser: raw.LTeamID,
            winner_score: raw.WScore,
            loser_score: raw.LScore,
            venue: VenueCode::from_code(&raw.WLoc),
            winner_box: BoxScore {
                fgm: raw.WFGM,
                fga: raw.WFGA,
                fgm3: raw.WFGM3,
                fga3: raw.WFGA3,
                ftm: raw.WFTM,
                fta: raw.WFTA,
                or: raw.WOR,
                dr: raw.WDR,
                ast: raw.WAst,
                to: raw.WTO,
                stl: raw.WStl,
                blk: raw.WBlk,
            },
            loser_box: BoxScore {
                fgm: raw.LFGM,
                fga: raw.LFGA,
                fgm3: raw.LFGM3,
                fga3: raw.LFGA3,
                ftm: raw.LFTM,
                fta: raw.LFTA,
                or: raw.LOR,
                dr: raw.LDR,
                ast: raw.LAst,
                to: raw.LTO,
                stl: raw.LStl,
                blk: raw.LBlk,
            },
        }
    }
}

/// Parse detailed results from any reader, preserving row order.
pub fn load_games_from_reader<R: Read>(rdr: R) -> Result<Vec<GameRecord>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    reader
        .deserialize::<RawDetailedResult>()
        .map(|row| row.map(GameRecord::from))
        .collect()
}

/// Load detailed results from a CSV file.
pub fn load_games(path: &Path) -> Result<Vec<GameRecord>, LoadError> {
    let file = std::fs::File::open(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let games = load_games_from_reader(file).map_err(|e| LoadError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;
    info!("Loaded {} games from {}", games.len(), path.display());
    Ok(games)
}
