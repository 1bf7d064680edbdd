//! Hot-reloadable settings handle.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::settings::Settings;

/// Process-wide settings, swapped atomically on reload.
///
/// Readers grab an `Arc` snapshot and keep using it for the remainder of
/// their query; a reload replaces the pointer whole, so an in-flight
/// query never observes a half-updated struct.
pub struct ConfigHandle {
    inner: RwLock<Arc<Settings>>,
}

impl ConfigHandle {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: RwLock::new(Arc::new(settings)),
        }
    }

    /// Current settings snapshot.
    pub fn load(&self) -> Arc<Settings> {
        self.inner.read().clone()
    }

    /// Replace the settings wholesale.
    pub fn swap(&self, settings: Settings) {
        let mut guard = self.inner.write();
        *guard = Arc::new(settings);
        tracing::info!("settings reloaded");
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_is_visible_to_new_readers() {
        let handle = ConfigHandle::default();
        let before = handle.load();
        assert_eq!(before.retrieval.final_top_k, 5);

        let mut updated = Settings::default();
        updated.retrieval.final_top_k = 9;
        handle.swap(updated);

        assert_eq!(handle.load().retrieval.final_top_k, 9);
        // The old snapshot is unchanged
        assert_eq!(before.retrieval.final_top_k, 5);
    }
}
