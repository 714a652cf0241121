use rustbac_datalink::DataLinkAddress;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

#[derive(Clone, Copy, Debug)]
struct DeviceThrottleConfig {
    max_concurrent: usize,
    min_interval: Duration,
}

/// Per-device request coordination primitive.
///
/// This utility lets callers limit concurrent requests per target address and
/// enforce a minimum delay between request starts.
#[derive(Debug)]
pub struct DeviceThrottle {
    semaphores: Mutex<HashMap<DataLinkAddress, Arc<Semaphore>>>,
    last_request: Mutex<HashMap<DataLinkAddress, Instant>>,
    overrides: Mutex<HashMap<DataLinkAddress, DeviceThrottleConfig>>,
    default_max_concurrent: usize,
    default_min_interval: Duration,
}

impl DeviceThrottle {
    /// Creates a new throttle using the given defaults.
    pub fn new(max_concurrent: usize, min_interval: Duration) -> Self {
        Self {
            semaphores: Mutex::new(HashMap::new()),
            last_request: Mutex::new(HashMap::new()),
            overrides: Mutex::new(HashMap::new()),
            default_max_concurrent: max_concurrent.max(1),
            default_min_interval: min_interval,
        }
    }

    /// Sets (or replaces) a per-device override.
    pub async fn set_device_limit(
        &self,
        address: DataLinkAddress,
        max_concurrent: usize,
        min_interval: Duration,
    ) {
        let max_concurrent = max_concurrent.max(1);
        self.overrides.lock().await.insert(
            address,
            DeviceThrottleConfig {
                max_concurrent,
                min_interval,
            },
        );

        // Swap in a new semaphore so future acquisitions use the new limit.
        self.semaphores
            .lock()
            .await
            .insert(address, Arc::new(Semaphore::new(max_concurrent)));
    }

    /// Acquires a permit for `address`, respecting per-device concurrency and
    /// minimum interval between request starts.
    pub async fn acquire(&self, address: DataLinkAddress) -> OwnedSemaphorePermit {
        let config = {
            let overrides = self.overrides.lock().await;
            overrides
                .get(&address)
                .copied()
                .unwrap_or(DeviceThrottleConfig {
                    max_concurrent: self.default_max_concurrent,
                    min_interval: self.default_min_interval,
                })
        };

        let semaphore = {
            let mut semaphores = self.semaphores.lock().await;
            semaphores
                .entry(address)
                .or_insert_with(|| Arc::new(Semaphore::new(config.max_concurrent)))
                .clone()
        };

        let permit = semaphore
            .acquire_owned()
            .await
            .expect("device throttle semaphore closed unexpectedly");

        if !config.min_interval.is_zero() {
            let mut last_request = self.last_request.lock().await;
            if let Some(last) = last_request.get(&address) {
                let elapsed = last.elapsed();
                if elapsed < config.min_interval {
                    tokio::time::sleep(config.min_interval - elapsed).await;
                }
            }
            last_request.insert(address, Instant::now());
        }

        permit
    }
}
