pub mod ids;
pub mod stats;

pub use ids::*;
pub use stats::*;
