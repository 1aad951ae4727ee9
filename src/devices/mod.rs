//! Generation models that turn station measurements into power output.

/// Weighted blend of several sources.
pub mod mixed;
/// Linear irradiance model.
pub mod solar;
pub mod types;
/// Cubic power-law turbine model.
pub mod wind;

// Re-export the main types for convenience
pub use mixed::MixedSupply;
pub use solar::SolarPanel;
pub use types::{Generator, PowerSample, SourceKind};
pub use wind::WindTurbine;
