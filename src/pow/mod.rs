mod difficulty;
mod engine;

pub use difficulty::expected_zeros;
pub use engine::{PowEngine, PowState};
