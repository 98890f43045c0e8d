// src/physics/interactions/mod.rs

pub mod builder;
pub mod patterns;
pub mod table;

// Re-export commonly used items
pub use builder::{build_model, DistanceFilter, InteractionModelBuilder, Normalization};
pub use patterns::{PairSign, Sign, SignPatternSpec, SignRule, Spin};
pub use table::{
    parameter_label,
    parameter_name,
    InteractionCoefficients,
    InteractionKey,
    InteractionParameter,
    ParameterColumn,
    WideTable,
};
