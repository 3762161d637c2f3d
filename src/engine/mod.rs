pub mod classifier;
pub mod clock;
pub mod command;
pub mod engagement;
pub mod pin_cache;
pub mod pin_quota;
pub mod ranking;
pub mod store;
pub mod visibility;
pub mod working_set;

#[cfg(test)]
pub(crate) mod testing;

pub use classifier::{DepartmentClassifier, DepartmentRule};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engagement::{EngagementKind, RecordOutcome};
pub use pin_cache::PinOverrideCache;
pub use pin_quota::{PinOutcome, PinRejection};
pub use store::{
    AnnouncementStore, BootstrapSource, DepartmentGroup, FeedEntry, FeedSnapshot, StoreBuilder,
    SyncState,
};
