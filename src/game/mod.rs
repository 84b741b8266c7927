//! Game simulation modules

pub mod combat;
pub mod entities;
pub mod r#match;
pub mod physics;
pub mod snapshot;
pub mod tuning;
pub mod world;

pub use entities::{BuildingType, MatchPhase, MoveInput};
pub use r#match::{GameMatch, MatchError, MatchHandle};
pub use tuning::WorldConfig;
pub use world::{PlacementRejection, World};
