// src/physics/mod.rs

pub mod images;
pub mod interactions;
pub mod neighbors;
pub mod shells;

pub use images::{all_neighbors, image_ranges, ImageNeighbor};
pub use interactions::{build_model, InteractionCoefficients, InteractionModelBuilder, SignPatternSpec, SignRule};
pub use neighbors::{count_neighbors, Bond, NeighborCount, NeighborData};
pub use shells::{group_into_shells, DistanceShell, ShellAssignment};
