pub mod geom;
pub mod io;
pub mod sim;

// Prelude
pub use geom::rect::Rect;
pub use sim::config::{
    BoundarySegment, PoissonConfig, PressureScheme, Side, SimulationConfig, StabilityNumbers,
};
pub use sim::error::SimulationError;
pub use sim::materials::ThermalMaterial;
pub use sim::recorder::{SimulationResult, Snapshot};
pub use sim::simulation::{Simulation, SimulationProgress, StepReport};
