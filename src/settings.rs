use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::cluster::birch::BirchParams;
use crate::cluster::dbscan::DbscanParams;
use crate::cluster::sweep::SweepGrid;
use crate::corpus::{LoadOptions, ReadErrorPolicy};
use crate::table::merge::DefaultPolicy;
use crate::table::schema::SchemaOptions;
use crate::text::stopwords::Language;

pub const DEFAULT_CONFIG_FILE: &str = "notecluster.toml";
const ENV_PREFIX: &str = "NOTECLUSTER";

/// Everything tunable about a run. Every field has a default, so an absent
/// config file is fine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub extension: String,
    pub skip_hidden: bool,
    pub on_read_error: ReadErrorPolicy,
    pub dropped_fields: Vec<String>,
    pub min_tag_support: usize,
    pub placeholders: Placeholders,
    pub stop_languages: Vec<Language>,
    pub text_columns: Vec<String>,
    pub seed: u64,
    pub output_dir: PathBuf,
    pub dbscan: DbscanGrid,
    pub birch: BirchGrid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Placeholders {
    pub text: String,
    pub other: String,
    /// Sentinel for missing or unparseable dates, `YYYY-MM-DD`.
    pub date: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbscanGrid {
    pub eps: Vec<f64>,
    pub min_samples: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BirchGrid {
    pub thresholds: Vec<f64>,
    pub n_clusters: Vec<usize>,
    /// Also sweep each threshold without the global clustering step.
    pub keep_subclusters: bool,
    pub branching_factor: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            extension: "md".into(),
            skip_hidden: false,
            on_read_error: ReadErrorPolicy::Skip,
            dropped_fields: [
                "sr-due",
                "sr-interval",
                "sr-ease",
                "kanban-plugin",
                "cssclass",
                "cssclasses",
                "complexity",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            min_tag_support: 1,
            placeholders: Placeholders::default(),
            stop_languages: vec![Language::English, Language::German],
            text_columns: ["text", "aliases", "link", "directory", "name"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            seed: 42,
            output_dir: PathBuf::from("out"),
            dbscan: DbscanGrid::default(),
            birch: BirchGrid::default(),
        }
    }
}

impl Default for Placeholders {
    fn default() -> Self {
        Self {
            text: "missing".into(),
            other: "unknown".into(),
            date: "1970-01-01".into(),
        }
    }
}

impl Default for DbscanGrid {
    fn default() -> Self {
        Self {
            eps: vec![0.8, 1.0, 1.2, 1.4, 1.6, 1.8],
            min_samples: 3,
        }
    }
}

impl Default for BirchGrid {
    fn default() -> Self {
        Self {
            thresholds: vec![0.6, 0.9, 1.2],
            n_clusters: vec![5, 10],
            keep_subclusters: true,
            branching_factor: 50,
        }
    }
}

impl Settings {
    /// Layer the optional TOML file under `NOTECLUSTER__*` environment
    /// variables.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to read config {:?}", path))?;
        settings
            .try_deserialize()
            .with_context(|| format!("Invalid config {:?}", path))
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            extension: self.extension.clone(),
            skip_hidden: self.skip_hidden,
            on_read_error: self.on_read_error,
        }
    }

    pub fn schema_options(&self) -> SchemaOptions {
        SchemaOptions {
            dropped_fields: self.dropped_fields.iter().cloned().collect(),
            min_tag_support: self.min_tag_support,
        }
    }

    pub fn default_policy(&self) -> Result<DefaultPolicy> {
        let sentinel = chrono::NaiveDate::parse_from_str(&self.placeholders.date, "%Y-%m-%d")
            .with_context(|| format!("Invalid sentinel date {:?}", self.placeholders.date))?
            .and_hms_opt(0, 0, 0)
            .context("Invalid sentinel time")?;
        Ok(DefaultPolicy {
            text: self.placeholders.text.clone(),
            other: self.placeholders.other.clone(),
            sentinel,
        })
    }

    pub fn sweep_grid(&self) -> SweepGrid {
        let dbscan = self
            .dbscan
            .eps
            .iter()
            .map(|&eps| DbscanParams {
                eps,
                min_samples: self.dbscan.min_samples,
            })
            .collect();

        let mut birch = Vec::new();
        for &threshold in &self.birch.thresholds {
            if self.birch.keep_subclusters {
                birch.push(BirchParams {
                    threshold,
                    branching_factor: self.birch.branching_factor,
                    n_clusters: None,
                });
            }
            for &k in &self.birch.n_clusters {
                birch.push(BirchParams {
                    threshold,
                    branching_factor: self.birch.branching_factor,
                    n_clusters: Some(k),
                });
            }
        }

        SweepGrid { dbscan, birch }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(s.extension, "md");
        assert_eq!(s.on_read_error, ReadErrorPolicy::Skip);
        assert_eq!(s.min_tag_support, 1);
        assert_eq!(s.stop_languages, vec![Language::English, Language::German]);
        assert!(s.dropped_fields.contains(&"sr-due".to_string()));
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notecluster.toml");
        std::fs::write(
            &path,
            "on_read_error = \"abort\"\nseed = 7\n\n[dbscan]\neps = [0.5]\nmin_samples = 2\n\n[placeholders]\ntext = \"n/a\"\n",
        )
        .unwrap();
        let s = Settings::load(&path).unwrap();
        assert_eq!(s.on_read_error, ReadErrorPolicy::Abort);
        assert_eq!(s.seed, 7);
        assert_eq!(s.dbscan.eps, vec![0.5]);
        assert_eq!(s.dbscan.min_samples, 2);
        assert_eq!(s.placeholders.text, "n/a");
        // untouched sections keep their defaults
        assert_eq!(s.placeholders.other, "unknown");
        assert_eq!(s.birch.branching_factor, 50);
    }

    #[test]
    fn sweep_grid_expands_birch_combinations() {
        let s = Settings::default();
        let grid = s.sweep_grid();
        assert_eq!(grid.dbscan.len(), 6);
        // 3 thresholds x (unreduced + 2 cluster counts)
        assert_eq!(grid.birch.len(), 9);
        assert!(grid.birch.iter().any(|p| p.n_clusters.is_none()));
    }

    #[test]
    fn bad_sentinel_is_rejected() {
        let mut s = Settings::default();
        s.placeholders.date = "yesterday".into();
        assert!(s.default_policy().is_err());
    }
}
