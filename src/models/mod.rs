pub mod advisory;
pub mod climate;
pub mod irrigation;
pub mod location;
pub mod pest;
pub mod weather;

pub use advisory::*;
pub use climate::*;
pub use irrigation::*;
pub use location::*;
pub use pest::*;
pub use weather::*;

use serde::{Deserialize, Serialize};

/// Identifier of a cultivated parcel (one grove block).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParcelId(pub i64);

impl std::fmt::Display for ParcelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ParcelId {
    fn from(id: i64) -> Self {
        ParcelId(id)
    }
}
