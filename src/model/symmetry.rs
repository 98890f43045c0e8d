use super::structure::StructureModel;
use super::subspecies::AssignmentRule;
use crate::error::{Error, Result};
use crate::utils::linalg::lattice_matrix;
use moyo::base::{AngleTolerance, Cell, Lattice};
use moyo::data::Setting;
use moyo::MoyoDataset;
use nalgebra::Vector3;

/// Crystallographic orbit of every site: `orbits[i] == orbits[j]` when the
/// space group maps site i onto site j.
pub fn symmetry_orbits(structure: &StructureModel, symprec: f64) -> Result<Vec<usize>> {
    // Rows are basis vectors, as Lattice::new expects
    let lattice = Lattice::new(lattice_matrix(structure.lattice()));

    let mut positions = Vec::with_capacity(structure.num_sites());
    let mut numbers = Vec::with_capacity(structure.num_sites());
    let mut unique_species: Vec<&str> = Vec::new();

    for (site, frac) in structure.sites().iter().zip(structure.fractional_positions()?) {
        positions.push(Vector3::new(frac[0], frac[1], frac[2]));

        // Map species string to a 1-based type id
        let id = match unique_species.iter().position(|s| *s == site.species()) {
            Some(id) => id,
            None => {
                unique_species.push(site.species());
                unique_species.len() - 1
            }
        };
        numbers.push(id as i32 + 1);
    }

    let cell = Cell::new(lattice, positions, numbers);
    let dataset = MoyoDataset::new(&cell, symprec, AngleTolerance::Default, Setting::Spglib, true)
        .map_err(|e| Error::Configuration(format!("symmetry search failed: {:?}", e)))?;

    log::info!(
        "space group #{} found, {} orbits over {} sites",
        dataset.number,
        {
            let mut distinct = dataset.orbits.clone();
            distinct.sort_unstable();
            distinct.dedup();
            distinct.len()
        },
        structure.num_sites()
    );

    Ok(dataset.orbits)
}

/// Relabel sites so that each crystallographic orbit of a species becomes
/// its own subspecies (`Fe1`, `Fe2`, ...).
pub fn label_by_symmetry(structure: &StructureModel, symprec: f64) -> Result<StructureModel> {
    let orbits = symmetry_orbits(structure, symprec)?;
    structure.relabel(&AssignmentRule::Groups(orbits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parameters::StructureParameters;
    use crate::model::subspecies::Subspecies;

    #[test]
    fn test_rock_salt_has_one_orbit_per_species() {
        let a = 4.2;
        let mut species = Vec::new();
        let mut coords = Vec::new();
        for &(x, y, z) in &[(0.0, 0.0, 0.0), (0.0, 0.5, 0.5), (0.5, 0.0, 0.5), (0.5, 0.5, 0.0)] {
            species.push("Mg".to_string());
            coords.push([x, y, z]);
            species.push("O".to_string());
            coords.push([x + 0.5, y, z]);
        }
        let params = StructureParameters::new([[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]], species, coords);
        let s = StructureModel::from_parameters(&params).unwrap();

        let labelled = label_by_symmetry(&s, 1e-4).unwrap();
        let labels = labelled.subspecies_labels();
        assert_eq!(labels.len(), 2);
        assert!(labels.contains(&Subspecies::from("Mg1")));
        assert!(labels.contains(&Subspecies::from("O1")));
    }
}
