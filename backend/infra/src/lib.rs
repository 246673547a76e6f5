//! Store adapters for the presence tracker.
//!
//! Both adapters implement [`pulse_core::PresenceStore`]:
//! - [`RedisStore`] for shared, multi-process deployments
//! - [`MemoryStore`] for single-process runs and tests

pub mod memory_store;
pub mod redis_store;

pub use memory_store::MemoryStore;
pub use redis_store::RedisStore;

use std::sync::Arc;

use pulse_core::{PresenceStore, PulseError, StoreBackend, StoreSettings};
use pulse_logging::redact_credentials;
use tracing::{error, info};

/// Build the store adapter selected by `settings.backend`.
pub async fn connect_store(settings: &StoreSettings) -> Result<Arc<dyn PresenceStore>, PulseError> {
    match settings.backend {
        StoreBackend::Redis => {
            let store = RedisStore::connect(settings).await.map_err(|e| {
                error!(url = %redact_credentials(&settings.url), error = %e, "Cannot reach redis");
                PulseError::Store(e)
            })?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            info!("Using in-memory presence store; state is not shared between processes");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_needs_no_server() {
        let settings = StoreSettings { backend: StoreBackend::Memory, ..Default::default() };
        let store = connect_store(&settings).await.unwrap();
        assert_eq!(store.name(), "memory");
        store.ping().await.unwrap();
    }
}
