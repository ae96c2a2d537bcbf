pub mod config;
pub mod dispatch;
pub mod error;
pub mod matrix;
pub mod optimize;
pub mod solver;
pub mod types;

pub use config::{Config, Method};
pub use dispatch::{process_grid, GridOutput, GridStats};
pub use error::{AeromixError, AmResult};
pub use matrix::MatrixData;
pub use types::{CellSolution, Fractions, PerSpecies, PointData, Species, SpeciesParams};
