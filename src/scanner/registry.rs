//! Active scan registry
//!
//! Admission control for scans: at most one scan may run per normalized range
//! key. Acquisition is fail-fast; there is no queue and no expiry.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Atomic acquire-or-fail guard over range keys
pub trait ScanAdmission: Send + Sync {
    /// Claim `key`; returns `false` if it is already held
    fn try_acquire(&self, key: &str) -> bool;

    /// Give `key` back; releasing an unheld key is a no-op
    fn release(&self, key: &str);
}

/// In-memory registry of running scans. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct ActiveScanRegistry {
    active: Arc<Mutex<HashSet<String>>>,
}

impl ActiveScanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    /// Scoped acquisition; the key is released when the lease drops
    pub fn lease(&self, key: impl Into<String>) -> Option<ScanLease> {
        ScanLease::acquire(Arc::new(self.clone()), key)
    }

    /// Sorted snapshot of the keys currently held
    pub fn active_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().iter().cloned().collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set stays consistent even if a holder panicked
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ScanAdmission for ActiveScanRegistry {
    fn try_acquire(&self, key: &str) -> bool {
        self.lock().insert(key.to_string())
    }

    fn release(&self, key: &str) {
        self.lock().remove(key);
    }
}

/// Scoped hold on a range key, released on drop
pub struct ScanLease {
    admission: Arc<dyn ScanAdmission>,
    key: String,
}

impl ScanLease {
    /// Try to take `key`; `None` if another scan holds it
    pub fn acquire(admission: Arc<dyn ScanAdmission>, key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        if admission.try_acquire(&key) {
            log::debug!("Acquired scan lease for {}", key);
            Some(Self { admission, key })
        } else {
            None
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for ScanLease {
    fn drop(&mut self) {
        self.admission.release(&self.key);
        log::debug!("Released scan lease for {}", self.key);
    }
}

impl std::fmt::Debug for ScanLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanLease").field("key", &self.key).finish()
    }
}
