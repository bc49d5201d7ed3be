mod excludes;
pub mod mode;
mod snapshot;
mod walker;

pub use excludes::{IgnoreEngine, IgnoreOptions};
pub use mode::render_mode;
pub use snapshot::Snapshot;
pub use walker::{WalkError, WalkErrorPolicy, WalkOptions, WalkSummary, walk};
