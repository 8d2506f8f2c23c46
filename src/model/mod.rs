pub mod builder;
pub mod snapshot;

pub use builder::build_snapshot;
pub use snapshot::{DisplaySpaceInfo, Snapshot, SpaceEntry, FULLSCREEN_LABEL};
