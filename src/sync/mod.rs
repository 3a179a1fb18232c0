pub mod engine;
pub mod readiness;

pub use engine::{Hydration, PersistentMap};
pub use readiness::{Readiness, SyncState};
