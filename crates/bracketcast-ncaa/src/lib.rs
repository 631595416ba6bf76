// NCAA data source: Kaggle-format CSV loaders and the team directory.

pub mod error;
pub mod games;
pub mod teams;

pub use error::LoadError;
pub use games::{load_games, load_games_from_reader};
pub use teams::{domain_from, load_spellings, load_teams, Team, TeamDirectory};
