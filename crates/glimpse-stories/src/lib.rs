//! Ephemeral story lifecycle: storage adapters, the 24-hour visibility and
//! grouping policy, and the service that ties them to a clock and a profile
//! directory.

pub mod clock;
pub mod error;
pub mod feed;
pub mod memory;
pub mod policy;
pub mod profiles;
pub mod service;
pub mod snapshot;
pub mod sqlite;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::StoryError;
pub use feed::{ChangeFeed, Subscription};
pub use memory::MemoryStore;
pub use profiles::{MemoryProfiles, ProfileDirectory, ProfileLookup};
pub use service::{NewStory, StoryService};
pub use snapshot::{SnapshotError, StorySnapshot};
pub use sqlite::{SqliteProfiles, SqliteStore};
pub use store::StoryStore;
