// Example-set export: one directory per split holding features.csv and
// labels.csv with matching row order.

use std::path::Path;

use anyhow::{Context, Result};
use bracketcast_core::{ExampleSplit, COLUMN_NAMES};
use tracing::info;

pub const FEATURES_FILE: &str = "features.csv";
pub const LABELS_FILE: &str = "labels.csv";

/// Header for the 136 feature columns: the first team's columns, then the
/// second team's.
pub fn feature_header() -> Vec<String> {
    let first = COLUMN_NAMES.iter().map(|c| format!("first_{c}"));
    let second = COLUMN_NAMES.iter().map(|c| format!("second_{c}"));
    first.chain(second).collect()
}

/// Write one split into `dir`, creating it if needed. Existing files are
/// overwritten.
pub fn write_split(dir: &Path, split: &ExampleSplit) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    let features_path = dir.join(FEATURES_FILE);
    let mut features = csv::Writer::from_path(&features_path)
        .with_context(|| format!("failed to create {}", features_path.display()))?;
    features
        .write_record(feature_header())
        .context("failed to write feature header")?;

    let labels_path = dir.join(LABELS_FILE);
    let mut labels = csv::Writer::from_path(&labels_path)
        .with_context(|| format!("failed to create {}", labels_path.display()))?;
    labels
        .write_record(["first_won", "second_won"])
        .context("failed to write label header")?;

    for (vector, label) in split.iter() {
        features
            .write_record(vector.iter().map(|v| v.to_string()))
            .context("failed to write feature row")?;
        labels
            .write_record(label.iter().map(|v| v.to_string()))
            .context("failed to write label row")?;
    }

    features.flush().context("failed to flush features")?;
    labels.flush().context("failed to flush labels")?;
    info!("Wrote {} examples to {}", split.len(), dir.display());
    Ok(())
}
