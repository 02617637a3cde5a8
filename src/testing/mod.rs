//! # Scenarios, assertions and verdicts
//!
//! A scenario's captured exchange is checked against its declared
//! assertions (status, field equality/presence, elapsed bound, ...) and an
//! optional JSON Schema. Every problem is collected into a single verdict.

pub mod assembler;
pub mod assertion;
pub mod json_path;
pub mod scenario;
pub mod verdict;

pub use assembler::VerdictAssembler;
pub use assertion::Assertion;
pub use json_path::JsonPath;
pub use scenario::{Scenario, Suite};
pub use verdict::{Outcome, ScenarioState, Verdict, VerdictRecord};
