pub mod core;
pub mod outcome;

pub use self::core::{Coordinator, RunPhase};
pub use outcome::{Outcome, RunResult};
