// src/model/structure.rs

use super::subspecies::{get_subspecies_labels, label_subspecies, AssignmentRule, Subspecies};
use crate::error::{Error, Result};
use crate::utils::linalg::{cart_to_frac, determinant, DEGENERATE_DET};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Site {
    index: usize,
    species: String,
    subspecies: Subspecies,
    /// Cartesian position in Angstroms.
    position: [f64; 3],
}

impl Site {
    /// Build a site. Without an explicit subspecies the species name is used.
    pub fn new(
        index: usize,
        species: impl Into<String>,
        subspecies: Option<Subspecies>,
        position: [f64; 3],
    ) -> Self {
        let species = species.into();
        let subspecies = subspecies
            .filter(|s| !s.as_str().trim().is_empty())
            .unwrap_or_else(|| Subspecies::new(species.clone()));
        Site {
            index,
            species,
            subspecies,
            position,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn species(&self) -> &str {
        &self.species
    }

    pub fn subspecies(&self) -> &Subspecies {
        &self.subspecies
    }

    pub fn position(&self) -> [f64; 3] {
        self.position
    }

    pub(crate) fn with_subspecies(&self, subspecies: Subspecies) -> Site {
        Site {
            subspecies,
            ..self.clone()
        }
    }
}

/// Sites plus lattice geometry. Immutable once built; relabelling returns a
/// new model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StructureModel {
    /// Lattice vectors: [a_vec, b_vec, c_vec]
    lattice: [[f64; 3]; 3],
    sites: Vec<Site>,
    /// Periodic boundary flag per lattice axis.
    periodic: [bool; 3],
}

/// One site as handed to [`StructureModel::new`]: species, optional
/// subspecies, Cartesian position.
pub type SiteInput = (String, Option<Subspecies>, [f64; 3]);

impl StructureModel {
    /// Validate the lattice and site list and assign indices `0..n`.
    pub fn new(lattice: [[f64; 3]; 3], sites: Vec<SiteInput>, periodic: [bool; 3]) -> Result<Self> {
        if lattice.iter().flatten().any(|x| !x.is_finite()) {
            return Err(Error::Configuration("lattice contains non-finite values".into()));
        }
        let det = determinant(&lattice);
        if det.abs() < DEGENERATE_DET {
            return Err(Error::Configuration(format!(
                "lattice is degenerate (determinant {:.3e})",
                det
            )));
        }

        let mut built = Vec::with_capacity(sites.len());
        for (index, (species, subspecies, position)) in sites.into_iter().enumerate() {
            if species.trim().is_empty() {
                return Err(Error::Configuration(format!("site {} has no species", index)));
            }
            if position.iter().any(|x| !x.is_finite()) {
                return Err(Error::Configuration(format!(
                    "site {} has a non-finite position",
                    index
                )));
            }
            built.push(Site::new(index, species.trim(), subspecies, position));
        }

        log::debug!(
            "structure model: {} sites, cell volume {:.4} Å^3",
            built.len(),
            det.abs()
        );

        Ok(StructureModel {
            lattice,
            sites: built,
            periodic,
        })
    }

    pub fn lattice(&self) -> &[[f64; 3]; 3] {
        &self.lattice
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn periodic(&self) -> [bool; 3] {
        self.periodic
    }

    pub fn num_sites(&self) -> usize {
        self.sites.len()
    }

    pub fn volume(&self) -> f64 {
        determinant(&self.lattice).abs()
    }

    /// Fractional coordinates of every site, in site order.
    pub fn fractional_positions(&self) -> Result<Vec<[f64; 3]>> {
        self.sites
            .iter()
            .map(|s| {
                cart_to_frac(s.position, &self.lattice)
                    .ok_or_else(|| Error::Configuration("lattice is not invertible".into()))
            })
            .collect()
    }

    /// Distinct subspecies labels of this structure.
    pub fn subspecies_labels(&self) -> BTreeSet<Subspecies> {
        get_subspecies_labels(&self.sites)
    }

    /// New model with labels assigned by `rule`.
    pub fn relabel(&self, rule: &AssignmentRule) -> Result<Self> {
        Ok(StructureModel {
            lattice: self.lattice,
            sites: label_subspecies(&self.sites, rule)?,
            periodic: self.periodic,
        })
    }

    /// Repeat the cell `nx × ny × nz` times. Sites keep species and
    /// subspecies; indices are renumbered cell by cell.
    pub fn supercell(&self, nx: u32, ny: u32, nz: u32) -> Result<Self> {
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(Error::Configuration(format!(
                "supercell multipliers must be positive, got {}x{}x{}",
                nx, ny, nz
            )));
        }
        let [vec_a, vec_b, vec_c] = self.lattice;
        let mut sites = Vec::with_capacity(self.sites.len() * (nx * ny * nz) as usize);

        for x in 0..nx {
            for y in 0..ny {
                for z in 0..nz {
                    let (fx, fy, fz) = (x as f64, y as f64, z as f64);
                    let translation = [
                        vec_a[0] * fx + vec_b[0] * fy + vec_c[0] * fz,
                        vec_a[1] * fx + vec_b[1] * fy + vec_c[1] * fz,
                        vec_a[2] * fx + vec_b[2] * fy + vec_c[2] * fz,
                    ];
                    for site in &self.sites {
                        let p = site.position;
                        sites.push(Site {
                            index: sites.len(),
                            species: site.species.clone(),
                            subspecies: site.subspecies.clone(),
                            position: [
                                p[0] + translation[0],
                                p[1] + translation[1],
                                p[2] + translation[2],
                            ],
                        });
                    }
                }
            }
        }

        let scale = |v: [f64; 3], n: u32| [v[0] * n as f64, v[1] * n as f64, v[2] * n as f64];
        Ok(StructureModel {
            lattice: [scale(vec_a, nx), scale(vec_b, ny), scale(vec_c, nz)],
            sites,
            periodic: self.periodic,
        })
    }
}
