// src/io/mod.rs
pub mod cif;
pub mod poscar;
pub mod xyz;

use crate::error::{Error, Result};
use crate::model::StructureModel;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Structure file formats understood by [`StructureModel::from_file`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureFormat {
    Poscar,
    Cif,
    Xyz,
}

impl StructureFormat {
    /// Guess the format from the file name; anything unrecognised is
    /// treated as POSCAR/CONTCAR.
    pub fn from_path(path: &Path) -> Self {
        let p = path.to_string_lossy().to_lowercase();

        if p.ends_with(".cif") {
            StructureFormat::Cif
        } else if p.ends_with(".xyz") || p.ends_with(".extxyz") {
            StructureFormat::Xyz
        } else {
            StructureFormat::Poscar
        }
    }
}

impl StructureModel {
    /// Read a structure file. Read and parse failures are reported as
    /// [`Error::InputFormat`] and are not retried.
    pub fn from_file(path: impl AsRef<Path>, format: StructureFormat) -> Result<StructureModel> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::input_format(path, e.to_string()))?;

        let structure = match format {
            StructureFormat::Poscar => poscar::parse_str(&text, path),
            StructureFormat::Cif => cif::parse_str(&text, path),
            StructureFormat::Xyz => xyz::parse_str(&text, path),
        }?;

        log::info!(
            "loaded {} sites from {} ({:?})",
            structure.num_sites(),
            path.display(),
            format
        );
        Ok(structure)
    }
}
