pub mod error;
pub mod keys;
pub mod traits;
pub mod types;

pub use error::{PulseError, StoreError, StoreResult};
pub use keys::KeySpace;
pub use traits::{PresenceStore, ScanPage};
pub use types::{
    AnalyticsSnapshot, PeakCounts, PeakWindow, PresenceSettings, StoreBackend,
    StoreSettings, SweepReport,
    DEFAULT_ACTIVITY_TIMEOUT, DEFAULT_NAMESPACE, DEFAULT_SNAPSHOT_TTL, DEFAULT_SWEEP_BATCH_SIZE,
};
