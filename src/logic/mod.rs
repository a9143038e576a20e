pub mod advisory;
pub mod climate;
pub mod conditions;
pub mod engine;
pub mod irrigation;
pub mod pests;
pub mod thresholds;
pub mod upgrade;

pub use engine::{AdvisoryEngine, EngineSettings};
pub use pests::PestScorer;
pub use upgrade::{ClimateUpgrader, UpgradeQueue};
