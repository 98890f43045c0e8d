//! Neighbor counting grouped by subspecies pair and distance shell.
//!
//! [`count_neighbors`] finds every periodic image within the cutoff,
//! collapses the distances into ranked shells and tabulates, for each site,
//! how many neighbors of each subspecies sit in each shell.

use super::images::all_neighbors;
use super::shells::{group_into_shells, DistanceShell};
use crate::error::{Error, Result};
use crate::model::{StructureModel, Subspecies, SubspeciesPair};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// One neighbor relation: site `site` sees image `image` of site `neighbor`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bond {
    pub site: usize,
    pub neighbor: usize,
    pub site_subspecies: Subspecies,
    pub neighbor_subspecies: Subspecies,
    /// Lattice translation from the home cell of `site` to the cell holding
    /// the neighbor image. Home cells are taken after wrapping fractional
    /// coordinates into [0, 1) on periodic axes, so this does not depend on
    /// where the input happened to store a site.
    pub image: [i32; 3],
    /// Cartesian vector from `site` to the neighbor image.
    pub offset: [f64; 3],
    pub distance: f64,
    /// Global shell rank.
    pub shell: usize,
}

impl Bond {
    pub fn pair(&self) -> SubspeciesPair {
        SubspeciesPair::new(self.site_subspecies.clone(), self.neighbor_subspecies.clone())
    }
}

/// One row of the dense count table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeighborCount {
    pub site: usize,
    pub pair: SubspeciesPair,
    pub neighbor_subspecies: Subspecies,
    pub shell: usize,
    /// Representative distance of the shell.
    pub distance: f64,
    pub count: usize,
}

/// Output of [`count_neighbors`]. Read-only once built.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NeighborData {
    cutoff: f64,
    tolerance: f64,
    site_subspecies: Vec<Subspecies>,
    labels: BTreeSet<Subspecies>,
    shells: Vec<DistanceShell>,
    bonds: Vec<Bond>,
    counts: Vec<NeighborCount>,
}

impl NeighborData {
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn num_sites(&self) -> usize {
        self.site_subspecies.len()
    }

    pub fn subspecies_of(&self, site: usize) -> Option<&Subspecies> {
        self.site_subspecies.get(site)
    }

    /// Every subspecies label of the structure, whether or not it has
    /// neighbors.
    pub fn labels(&self) -> &BTreeSet<Subspecies> {
        &self.labels
    }

    pub fn shells(&self) -> &[DistanceShell] {
        &self.shells
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    /// Dense table ordered by site, neighbor subspecies, then shell.
    pub fn counts(&self) -> &[NeighborCount] {
        &self.counts
    }

    pub fn is_empty(&self) -> bool {
        self.bonds.is_empty()
    }

    /// Subspecies pairs that have at least one bond.
    pub fn pairs(&self) -> BTreeSet<SubspeciesPair> {
        self.bonds.iter().map(Bond::pair).collect()
    }

    /// Total neighbors of `site` in shell `shell`, over all subspecies.
    pub fn neighbor_count(&self, site: usize, shell: usize) -> usize {
        self.counts
            .iter()
            .filter(|c| c.site == site && c.shell == shell)
            .map(|c| c.count)
            .sum()
    }
}

/// Count neighbors per site, neighbor subspecies and distance shell.
///
/// Distances within `distance_tolerance` of each other (chained through
/// consecutive sorted values) share a shell; a tolerance of zero only merges
/// identical distances. A structure without any neighbor inside the cutoff
/// yields empty data, not an error.
pub fn count_neighbors(
    structure: &StructureModel,
    cutoff_distance: f64,
    distance_tolerance: f64,
) -> Result<NeighborData> {
    if !(cutoff_distance > 0.0) || !cutoff_distance.is_finite() {
        return Err(Error::InvalidCutoff(cutoff_distance));
    }
    if !(distance_tolerance >= 0.0) {
        return Err(Error::InvalidTolerance(distance_tolerance));
    }

    let site_subspecies: Vec<Subspecies> = structure
        .sites()
        .iter()
        .map(|s| s.subspecies().clone())
        .collect();
    let labels: BTreeSet<Subspecies> = site_subspecies.iter().cloned().collect();

    let home = home_cells(structure)?;
    let per_site = all_neighbors(structure, cutoff_distance)?;
    let raw: Vec<(usize, _)> = per_site
        .into_iter()
        .enumerate()
        .flat_map(|(site, list)| list.into_iter().map(move |n| (site, n)))
        .collect();

    let distances: Vec<f64> = raw.iter().map(|(_, n)| n.distance).collect();
    let assignment = group_into_shells(&distances, distance_tolerance);
    if raw.iter().any(|(_, n)| n.distance < 1e-6) {
        log::warn!("overlapping sites found: some neighbor distances are below 1e-6 Å");
    }

    let bonds: Vec<Bond> = raw
        .into_iter()
        .zip(&assignment.ranks)
        .map(|((site, n), &shell)| Bond {
            site,
            neighbor: n.neighbor,
            site_subspecies: site_subspecies[site].clone(),
            neighbor_subspecies: site_subspecies[n.neighbor].clone(),
            image: [
                n.image[0] + home[n.neighbor][0] - home[site][0],
                n.image[1] + home[n.neighbor][1] - home[site][1],
                n.image[2] + home[n.neighbor][2] - home[site][2],
            ],
            offset: n.offset,
            distance: n.distance,
            shell,
        })
        .collect();

    let counts = dense_counts(&site_subspecies, &labels, &assignment.shells, &bonds);

    log::info!(
        "neighbor search: {} bonds in {} shells (cutoff {:.3} Å, tolerance {:.4} Å)",
        bonds.len(),
        assignment.shells.len(),
        cutoff_distance,
        distance_tolerance
    );

    Ok(NeighborData {
        cutoff: cutoff_distance,
        tolerance: distance_tolerance,
        site_subspecies,
        labels,
        shells: assignment.shells,
        bonds,
        counts,
    })
}

/// Cell index of every stored position: `floor(frac)` on periodic axes,
/// zero elsewhere.
fn home_cells(structure: &StructureModel) -> Result<Vec<[i32; 3]>> {
    let periodic = structure.periodic();
    Ok(structure
        .fractional_positions()?
        .iter()
        .map(|frac| {
            let mut cell = [0; 3];
            for k in 0..3 {
                if periodic[k] {
                    // values a rounding error below an integer belong to the upper cell
                    cell[k] = (frac[k] + 1e-9).floor() as i32;
                }
            }
            cell
        })
        .collect())
}

/// Zero-filled table over every (site, neighbor label, shell).
fn dense_counts(
    site_subspecies: &[Subspecies],
    labels: &BTreeSet<Subspecies>,
    shells: &[DistanceShell],
    bonds: &[Bond],
) -> Vec<NeighborCount> {
    if shells.is_empty() {
        return Vec::new();
    }

    let mut tally: HashMap<(usize, &Subspecies, usize), usize> = HashMap::new();
    for bond in bonds {
        *tally
            .entry((bond.site, &bond.neighbor_subspecies, bond.shell))
            .or_insert(0) += 1;
    }

    let mut counts = Vec::with_capacity(site_subspecies.len() * labels.len() * shells.len());
    for (site, own) in site_subspecies.iter().enumerate() {
        for label in labels {
            let pair = SubspeciesPair::new(own.clone(), label.clone());
            for shell in shells {
                counts.push(NeighborCount {
                    site,
                    pair: pair.clone(),
                    neighbor_subspecies: label.clone(),
                    shell: shell.rank,
                    distance: shell.distance,
                    count: tally.get(&(site, label, shell.rank)).copied().unwrap_or(0),
                });
            }
        }
    }
    counts
}
