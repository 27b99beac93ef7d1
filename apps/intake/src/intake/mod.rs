//! Intake Gate — admits or rejects a candidate file before it reaches the pipeline.

pub mod gate;
pub mod policy;

pub use gate::{validate, IntakeError, ValidationOutcome};
pub use policy::ValidationPolicy;
