//src/model/mod.rs
pub mod parameters;
pub mod structure;
pub mod subspecies;
pub mod symmetry;

// Re-exports for cleaner imports
pub use parameters::{CoordinateMode, LatticeSpec, StructureParameters, SymmetryOperation};
pub use structure::{Site, SiteInput, StructureModel};
pub use subspecies::{get_subspecies_labels, label_subspecies, AssignmentRule, Subspecies, SubspeciesPair};
pub use symmetry::{label_by_symmetry, symmetry_orbits};
