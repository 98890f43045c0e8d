//! Periodic-image enumeration for neighbor search.
//!
//! Every image of every site within the cutoff is returned, including
//! periodic images of a site itself. Only the site at its own zero image is
//! skipped. This is explicit image enumeration, not the minimum-image
//! convention: with a cutoff larger than half the cell a site sees several
//! images of the same neighbor.

use crate::error::Result;
use crate::model::StructureModel;
use crate::utils::linalg::{frac_to_cart, interplanar_spacings, norm};
use rayon::prelude::*;

/// One image of a neighbor site, as seen from a center site.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageNeighbor {
    pub neighbor: usize,
    /// Lattice translation applied to the neighbor's stored position.
    pub image: [i32; 3],
    /// Cartesian vector from the center site to this image.
    pub offset: [f64; 3],
    pub distance: f64,
}

/// Number of images to scan on each side of the home cell, per axis.
///
/// Separations are first reduced into `[-0.5, 0.5]` on periodic axes, so one
/// extra plane on top of `ceil(cutoff / d_k)` covers every image within the
/// cutoff. Non-periodic axes are never translated.
pub fn image_ranges(structure: &StructureModel, cutoff: f64) -> [i32; 3] {
    let spacings = interplanar_spacings(structure.lattice());
    let periodic = structure.periodic();
    let mut ranges = [0; 3];
    for k in 0..3 {
        if periodic[k] && spacings[k] > 0.0 {
            ranges[k] = (cutoff / spacings[k]).ceil() as i32 + 1;
        }
    }
    ranges
}

/// Neighbors of every site within `cutoff`, in site order.
///
/// Sites are processed in parallel; each worker only reads the structure.
pub fn all_neighbors(structure: &StructureModel, cutoff: f64) -> Result<Vec<Vec<ImageNeighbor>>> {
    let fracs = structure.fractional_positions()?;
    let ranges = image_ranges(structure, cutoff);
    log::debug!(
        "image search: cutoff {:.4} Å, image ranges {:?}, {} sites",
        cutoff,
        ranges,
        fracs.len()
    );

    Ok((0..fracs.len())
        .into_par_iter()
        .map(|i| site_neighbors(structure, &fracs, i, cutoff, ranges))
        .collect())
}

fn site_neighbors(
    structure: &StructureModel,
    fracs: &[[f64; 3]],
    center: usize,
    cutoff: f64,
    ranges: [i32; 3],
) -> Vec<ImageNeighbor> {
    let lattice = structure.lattice();
    let periodic = structure.periodic();
    let origin = fracs[center];
    let mut found = Vec::new();

    for (j, frac_j) in fracs.iter().enumerate() {
        let mut delta = [0.0; 3];
        let mut base = [0i32; 3];
        for k in 0..3 {
            delta[k] = frac_j[k] - origin[k];
            if periodic[k] {
                base[k] = -delta[k].round() as i32;
            }
        }

        for nx in -ranges[0]..=ranges[0] {
            for ny in -ranges[1]..=ranges[1] {
                for nz in -ranges[2]..=ranges[2] {
                    let image = [base[0] + nx, base[1] + ny, base[2] + nz];
                    if j == center && image == [0, 0, 0] {
                        continue;
                    }
                    let shifted = [
                        delta[0] + image[0] as f64,
                        delta[1] + image[1] as f64,
                        delta[2] + image[2] as f64,
                    ];
                    let offset = frac_to_cart(shifted, lattice);
                    let distance = norm(offset);
                    if distance <= cutoff {
                        found.push(ImageNeighbor {
                            neighbor: j,
                            image,
                            offset,
                            distance,
                        });
                    }
                }
            }
        }
    }
    found
}
