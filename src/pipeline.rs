//! Structure → neighbor data → interaction coefficients, driven by an
//! [`AnalysisConfig`].

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::model::{label_by_symmetry, StructureModel};
use crate::physics::interactions::InteractionCoefficients;
use crate::physics::neighbors::{count_neighbors, NeighborData};

/// Every intermediate of one run, kept for reporting.
#[derive(Clone, Debug)]
pub struct Analysis {
    /// The structure after supercell expansion and relabelling.
    pub structure: StructureModel,
    pub neighbors: NeighborData,
    pub coefficients: InteractionCoefficients,
}

pub fn analyze(structure: &StructureModel, config: &AnalysisConfig) -> Result<Analysis> {
    let mut structure = match config.supercell {
        Some([nx, ny, nz]) => structure.supercell(nx, ny, nz)?,
        None => structure.clone(),
    };
    if let Some(rule) = &config.subspecies {
        structure = structure.relabel(rule)?;
    }
    if let Some(symprec) = config.symmetry_labels {
        structure = label_by_symmetry(&structure, symprec)?;
    }
    log::debug!(
        "subspecies: {}",
        structure
            .subspecies_labels()
            .iter()
            .map(|l| l.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let neighbors = count_neighbors(&structure, config.cutoff, config.tolerance)?;
    let coefficients = config.model_builder().build(&neighbors, &config.patterns)?;

    Ok(Analysis {
        structure,
        neighbors,
        coefficients,
    })
}
