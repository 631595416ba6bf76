// Shared fixtures for unit tests.

use crate::game::{BoxScore, GameRecord, Season, TeamId, VenueCode};
use crate::team_season::Domain;

/// 2017, home win: 101 beats 202 70-60, 25/50 vs 20/55 from the field.
pub fn scenario_game() -> GameRecord {
    GameRecord {
        season: 2017,
        day_num: 30,
        winner: 101,
        loser: 202,
        winner_score: 70,
        loser_score: 60,
        venue: VenueCode::Home,
        winner_box: BoxScore {
            fgm: 25,
            fga: 50,
            ..BoxScore::default()
        },
        loser_box: BoxScore {
            fgm: 20,
            fga: 55,
            ..BoxScore::default()
        },
    }
}

pub fn game(season: Season, winner: TeamId, loser: TeamId, venue: VenueCode) -> GameRecord {
    GameRecord {
        season,
        day_num: 50,
        winner,
        loser,
        winner_score: 75,
        loser_score: 65,
        venue,
        winner_box: BoxScore {
            fgm: 27,
            fga: 58,
            fgm3: 8,
            fga3: 21,
            ftm: 13,
            fta: 18,
            or: 11,
            dr: 25,
            ast: 15,
            to: 12,
            stl: 7,
            blk: 4,
        },
        loser_box: BoxScore {
            fgm: 24,
            fga: 61,
            fgm3: 6,
            fga3: 22,
            ftm: 11,
            fta: 16,
            or: 9,
            dr: 22,
            ast: 12,
            to: 14,
            stl: 5,
            blk: 3,
        },
    }
}

/// Small deterministic generator so fixtures are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }

    fn shooting(&mut self, max_att: u64) -> (u32, u32) {
        let att = self.below(max_att + 1);
        let made = if att == 0 { 0 } else { self.below(att + 1) };
        (made as u32, att as u32)
    }

    fn box_score(&mut self) -> BoxScore {
        let (fgm, fga) = self.shooting(75);
        let (fgm3, fga3) = self.shooting(35);
        let (ftm, fta) = self.shooting(35);
        BoxScore {
            fgm,
            fga,
            fgm3,
            fga3,
            ftm,
            fta,
            or: self.below(25) as u32,
            dr: self.below(40) as u32,
            ast: self.below(30) as u32,
            to: self.below(25) as u32,
            stl: self.below(15) as u32,
            blk: self.below(12) as u32,
        }
    }
}

/// Valid random games over the domain.
pub fn seeded_games(domain: &Domain, count: usize, seed: u64) -> Vec<GameRecord> {
    let mut rng = Lcg(seed);
    let first_team = *domain.teams().start();
    let teams = (*domain.teams().end() - first_team + 1) as u64;
    let first_season = *domain.seasons().start();
    let seasons = (*domain.seasons().end() - first_season + 1) as u64;
    assert!(teams >= 2, "need at least two teams");

    (0..count)
        .map(|_| {
            let winner = first_team + rng.below(teams) as TeamId;
            let mut loser = first_team + rng.below(teams) as TeamId;
            if loser == winner {
                loser = first_team + ((loser - first_team + 1) % teams as TeamId);
            }
            let venue = match rng.below(3) {
                0 => VenueCode::Home,
                1 => VenueCode::Away,
                _ => VenueCode::Neutral,
            };
            let loser_score = 40 + rng.below(50) as u32;
            GameRecord {
                season: first_season + rng.below(seasons) as Season,
                day_num: rng.below(132) as u16,
                winner,
                loser,
                winner_score: loser_score + 1 + rng.below(30) as u32,
                loser_score,
                venue,
                winner_box: rng.box_score(),
                loser_box: rng.box_score(),
            }
        })
        .collect()
}

pub fn sample_season(domain: &Domain, count: usize) -> Vec<GameRecord> {
    seeded_games(domain, count, 42)
}
