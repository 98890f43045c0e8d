//! Distance-shell neighbor counting for periodic crystal structures and
//! the signed coefficient tables of magnetic interaction models built on it.
//!
//! ```text
//! StructureModel -> count_neighbors -> NeighborData -> build_model -> InteractionCoefficients
//! ```

pub mod config;
pub mod error;
pub mod io;
pub mod model;
pub mod physics;
pub mod pipeline;
pub mod utils;

pub use config::AnalysisConfig;
pub use error::{Error, Result};
pub use io::StructureFormat;
pub use model::{AssignmentRule, Site, StructureModel, StructureParameters, Subspecies, SubspeciesPair};
pub use physics::interactions::{
    build_model,
    InteractionCoefficients,
    InteractionModelBuilder,
    Normalization,
    Sign,
    SignPatternSpec,
    SignRule,
    WideTable,
};
pub use physics::neighbors::{count_neighbors, NeighborData};
pub use pipeline::{analyze, Analysis};
