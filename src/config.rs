// src/config.rs

use crate::error::{Error, Result};
use crate::model::AssignmentRule;
use crate::physics::interactions::{DistanceFilter, InteractionModelBuilder, Normalization, SignPatternSpec};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

fn default_cutoff() -> f64 {
  6.0
}

fn default_tolerance() -> f64 {
  0.01
}

/// Everything the `nbmodel` pipeline needs besides the structure itself.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
  /// Neighbor search radius in Å.
  #[serde(default = "default_cutoff")]
  pub cutoff: f64,

  /// Distances closer than this (Å) share a shell.
  #[serde(default = "default_tolerance")]
  pub tolerance: f64,

  #[serde(default)]
  pub normalization: Normalization,

  #[serde(default)]
  pub distance_filter: Option<DistanceFilter>,

  /// Relabel sites before counting. Labels from the file are kept if unset.
  #[serde(default)]
  pub subspecies: Option<AssignmentRule>,

  /// Repeat the cell before labelling, e.g. to give a doubled cell
  /// independent site spins.
  #[serde(default)]
  pub supercell: Option<[u32; 3]>,

  /// Label sites by crystallographic orbit with this symmetry tolerance (Å).
  /// Applied after `subspecies`.
  #[serde(default)]
  pub symmetry_labels: Option<f64>,

  #[serde(default)]
  pub patterns: SignPatternSpec,
}

impl Default for AnalysisConfig {
  fn default() -> Self {
    Self {
      cutoff: default_cutoff(),
      tolerance: default_tolerance(),
      normalization: Normalization::default(),
      distance_filter: None,
      supercell: None,
      subspecies: None,
      symmetry_labels: None,
      patterns: SignPatternSpec::default(),
    }
  }
}

impl AnalysisConfig {
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let cfg = serde_json::from_reader(reader).map_err(|source| Error::Config {
      path: path.to_path_buf(),
      source,
    })?;
    log::info!("config loaded from {}", path.display());
    Ok(cfg)
  }

  /// Loads config from the standard OS location
  /// (e.g. ~/.config/nbmodel/settings.json), falling back to defaults.
  pub fn load_default() -> Self {
    let path = Self::default_path();
    if !path.exists() {
      log::info!("no config found at {}, using defaults", path.display());
      return Self::default();
    }
    match Self::load(&path) {
      Ok(cfg) => cfg,
      Err(e) => {
        log::warn!("{}; using defaults", e);
        Self::default()
      }
    }
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, self).map_err(|source| Error::Config {
      path: path.to_path_buf(),
      source,
    })?;
    log::info!("config saved to {}", path.display());
    Ok(())
  }

  pub fn default_path() -> PathBuf {
    if let Some(proj) = ProjectDirs::from("com", "example", "nbmodel") {
      proj.config_dir().join("settings.json")
    } else {
      PathBuf::from("settings.json")
    }
  }

  /// Interaction builder carrying this config's filter and normalization.
  pub fn model_builder(&self) -> InteractionModelBuilder {
    InteractionModelBuilder::new()
      .distance_filter(self.distance_filter.clone())
      .normalization(self.normalization)
  }
}
