// Configuration loading and parsing (pipeline.toml).

use bracketcast_core::{ConstantColumnPolicy, Season};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// pipeline.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory relative paths in the file are resolved against.
    pub base_dir: PathBuf,
    pub data: DataPaths,
    pub output: OutputPaths,
    pub pipeline: PipelineSettings,
    pub lookup: LookupSettings,
}

#[derive(Debug, Clone, Deserialize)]
struct PipelineFile {
    data: DataPaths,
    output: OutputPaths,
    #[serde(default)]
    pipeline: PipelineSettings,
    lookup: LookupSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub games: String,
    pub teams: String,
    /// Alternate team name spellings (optional).
    #[serde(default)]
    pub spellings: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputPaths {
    pub database: String,
    pub train_dir: String,
    pub validation_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSettings {
    #[serde(default = "default_shards")]
    pub shards: usize,
    #[serde(default)]
    pub constant_columns: ConstantColumnPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            shards: default_shards(),
            constant_columns: ConstantColumnPolicy::default(),
        }
    }
}

fn default_shards() -> usize {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct LookupSettings {
    /// Season used by `stats`/`matchup` when none is given.
    pub season: Season,
}

impl Config {
    /// Resolve a configured path against `base_dir` unless it is absolute.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }

    pub fn games_path(&self) -> PathBuf {
        self.resolve(&self.data.games)
    }

    pub fn teams_path(&self) -> PathBuf {
        self.resolve(&self.data.teams)
    }

    pub fn spellings_path(&self) -> Option<PathBuf> {
        self.data.spellings.as_deref().map(|p| self.resolve(p))
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.output.database)
    }

    pub fn train_dir(&self) -> PathBuf {
        self.resolve(&self.output.train_dir)
    }

    pub fn validation_dir(&self) -> PathBuf {
        self.resolve(&self.output.validation_dir)
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/pipeline.toml` relative to `base_dir`.
///
/// Does not copy defaults; `load_config()` does that first.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join("pipeline.toml");
    let text = read_file(&path)?;
    let file: PipelineFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    let config = Config {
        base_dir: base_dir.to_path_buf(),
        data: file.data,
        output: file.output,
        pipeline: file.pipeline,
        lookup: file.lookup,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }

        let target = config_dir.join(file_name);
        if target.exists() {
            continue;
        }
        std::fs::copy(&path, &target).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to copy {}: {e}", path.display()),
        })?;
        copied.push(target);
    }

    Ok(copied)
}

/// Load config relative to the current working directory, copying defaults
/// first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let required: &[(&str, &str)] = &[
        ("data.games", &config.data.games),
        ("data.teams", &config.data.teams),
        ("output.database", &config.output.database),
        ("output.train_dir", &config.output.train_dir),
        ("output.validation_dir", &config.output.validation_dir),
    ];
    for (name, val) in required {
        if val.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must not be empty".into(),
            });
        }
    }

    if config.output.train_dir == config.output.validation_dir {
        return Err(ConfigError::ValidationError {
            field: "output.validation_dir".into(),
            message: "must differ from output.train_dir".into(),
        });
    }

    if config.pipeline.shards == 0 {
        return Err(ConfigError::ValidationError {
            field: "pipeline.shards".into(),
            message: "must be greater than 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const VALID: &str = r#"
[data]
games = "data/MRegularSeasonDetailedResults.csv"
teams = "data/MTeams.csv"
spellings = "data/MTeamSpellings.csv"

[output]
database = "bracketcast.db"
train_dir = "out/train"
validation_dir = "out/validation"

[pipeline]
shards = 4
constant_columns = "zero"

[lookup]
season = 2019
"#;

    fn write_config(dir: &Path, text: &str) {
        let config_dir = dir.join("config");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join("pipeline.toml"), text).unwrap();
    }

    #[test]
    fn loads_valid_config() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(tmp.path(), VALID);
        let config = load_config_from(tmp.path()).unwrap();

        assert_eq!(config.data.games, "data/MRegularSeasonDetailedResults.csv");
        assert_eq!(config.data.spellings.as_deref(), Some("data/MTeamSpellings.csv"));
        assert_eq!(config.pipeline.shards, 4);
        assert_eq!(config.pipeline.constant_columns, ConstantColumnPolicy::Zero);
        assert_eq!(config.lookup.season, 2019);
        assert_eq!(config.database_path(), tmp.path().join("bracketcast.db"));
        assert_eq!(config.train_dir(), tmp.path().join("out/train"));
    }

    #[test]
    fn shipped_defaults_load() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(
            tmp.path(),
            include_str!("../../bracketcast-cli/defaults/pipeline.toml"),
        );
        let config = load_config_from(tmp.path()).unwrap();
        // Latest season in the stage 2 data.
        assert_eq!(config.lookup.season, 2019);
        assert_eq!(config.pipeline.shards, 4);
        assert_eq!(config.pipeline.constant_columns, ConstantColumnPolicy::Propagate);
    }

    #[test]
    fn pipeline_section_is_optional() {
        let tmp = tempfile::tempdir().unwrap();
        let text = r#"
[data]
games = "g.csv"
teams = "t.csv"

[output]
database = "b.db"
train_dir = "train"
validation_dir = "val"

[lookup]
season = 2017
"#;
        write_config(tmp.path(), text);
        let config = load_config_from(tmp.path()).unwrap();
        assert_eq!(config.pipeline.shards, 1);
        assert_eq!(config.pipeline.constant_columns, ConstantColumnPolicy::Propagate);
        assert!(config.spellings_path().is_none());
    }

    #[test]
    fn absolute_paths_are_kept() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(tmp.path(), VALID);
        let config = load_config_from(tmp.path()).unwrap();
        let abs = tmp.path().join("elsewhere.csv");
        assert_eq!(config.resolve(abs.to_str().unwrap()), abs);
    }

    #[test]
    fn rejects_zero_shards() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(tmp.path(), &VALID.replace("shards = 4", "shards = 0"));
        match load_config_from(tmp.path()) {
            Err(ConfigError::ValidationError { field, .. }) => {
                assert_eq!(field, "pipeline.shards")
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn rejects_same_output_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(
            tmp.path(),
            &VALID.replace("validation_dir = \"out/validation\"", "validation_dir = \"out/train\""),
        );
        match load_config_from(tmp.path()) {
            Err(ConfigError::ValidationError { field, .. }) => {
                assert_eq!(field, "output.validation_dir")
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_games_path() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(
            tmp.path(),
            &VALID.replace("games = \"data/MRegularSeasonDetailedResults.csv\"", "games = \"\""),
        );
        assert!(matches!(
            load_config_from(tmp.path()),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn unknown_policy_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(
            tmp.path(),
            &VALID.replace("constant_columns = \"zero\"", "constant_columns = \"clamp\""),
        );
        assert!(matches!(
            load_config_from(tmp.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn file_not_found_for_missing_config() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_config_from(tmp.path()),
            Err(ConfigError::FileNotFound { .. })
        ));
    }

    #[test]
    fn ensure_config_files_copies_missing_files() {
        let tmp = tempfile::tempdir().unwrap();
        let defaults = tmp.path().join("defaults");
        fs::create_dir_all(&defaults).unwrap();
        fs::write(defaults.join("pipeline.toml"), VALID).unwrap();
        fs::write(defaults.join("pipeline.toml.example"), VALID).unwrap();

        let copied = ensure_config_files(tmp.path()).unwrap();
        assert_eq!(copied, vec![tmp.path().join("config/pipeline.toml")]);
        assert!(!tmp.path().join("config/pipeline.toml.example").exists());
        assert!(load_config_from(tmp.path()).is_ok());
    }

    #[test]
    fn ensure_config_files_skips_existing() {
        let tmp = tempfile::tempdir().unwrap();
        let defaults = tmp.path().join("defaults");
        fs::create_dir_all(&defaults).unwrap();
        fs::write(defaults.join("pipeline.toml"), VALID).unwrap();
        write_config(tmp.path(), "# edited by hand\n");

        let copied = ensure_config_files(tmp.path()).unwrap();
        assert!(copied.is_empty());
        let kept = fs::read_to_string(tmp.path().join("config/pipeline.toml")).unwrap();
        assert_eq!(kept, "# edited by hand\n");
    }

    #[test]
    fn ensure_config_files_errors_when_both_dirs_missing() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            ensure_config_files(tmp.path()),
            Err(ConfigError::DefaultsCopyError { .. })
        ));
    }
}
