//! Domain models for the evolution pipeline.
//!
//! - `EvolutionRequest`: immutable (locator, module name) pair
//! - `EvolutionState`: one-directional run state machine
//! - `EvolutionResult`: write-once run record with per-stage outcomes

pub mod error;
pub mod request;
pub mod result;

pub use error::{EvolveError, Result};
pub use request::{EvolutionRequest, ModuleName, SourceLocator};
pub use result::{
    EvolutionResult, EvolutionState, EvolutionStatus, FailureKind, Stage, StageOutcome,
};
