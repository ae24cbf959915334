//! Bridge registry.
//!
//! Holds at most one active bridge. Registration swaps the whole handle atomically, so a
//! reader sees either the previous bridge or the new one, never a mix. Calls that already
//! looked up a handle keep using it; re-registering while calls are in flight is the
//! host's responsibility.

use arc_swap::ArcSwapOption;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

use super::{Bridge, BridgeCapabilities};
use crate::{Error, Result};

pub(crate) const NOT_INITIALIZED_GUIDANCE: &str =
    "WebLLM bridge not initialized. The host must call set_bridge() with a completion function before using the provider.";

/// The registered bridge plus the registration it came from.
pub struct BridgeHandle {
    bridge: Arc<dyn Bridge>,
    generation: u64,
}

impl BridgeHandle {
    pub fn bridge(&self) -> &dyn Bridge {
        self.bridge.as_ref()
    }

    /// 1 for the first registration, incremented on every replacement.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn capabilities(&self) -> BridgeCapabilities {
        self.bridge.capabilities()
    }
}

impl std::fmt::Debug for BridgeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeHandle")
            .field("generation", &self.generation)
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

pub struct BridgeRegistry {
    slot: ArcSwapOption<BridgeHandle>,
    generation: AtomicU64,
}

impl BridgeRegistry {
    pub fn new() -> Self {
        Self {
            slot: ArcSwapOption::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Store `bridge`, replacing any previous one. Returns the new generation.
    pub fn set_bridge<B: Bridge + 'static>(&self, bridge: B) -> u64 {
        self.set_shared(Arc::new(bridge))
    }

    pub fn set_shared(&self, bridge: Arc<dyn Bridge>) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let streaming = bridge.capabilities().streaming;
        let replaced = self
            .slot
            .swap(Some(Arc::new(BridgeHandle { bridge, generation })))
            .is_some();
        info!(generation, streaming, replaced, "bridge registered");
        generation
    }

    pub fn is_ready(&self) -> bool {
        self.slot.load().is_some()
    }

    pub fn get_bridge(&self) -> Result<Arc<BridgeHandle>> {
        self.slot
            .load_full()
            .ok_or_else(|| Error::not_initialized(NOT_INITIALIZED_GUIDANCE))
    }

    /// Drop the current bridge, returning it. The generation counter keeps counting.
    pub fn clear(&self) -> Option<Arc<BridgeHandle>> {
        self.slot.swap(None)
    }

    /// Number of registrations so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl Default for BridgeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_REGISTRY: once_cell::sync::Lazy<Arc<BridgeRegistry>> =
    once_cell::sync::Lazy::new(|| Arc::new(BridgeRegistry::new()));

/// Process-wide registry used by providers that were not given one explicitly.
pub fn global_registry() -> Arc<BridgeRegistry> {
    Arc::clone(&GLOBAL_REGISTRY)
}

/// Register the process-wide bridge (last write wins).
pub fn set_bridge<B: Bridge + 'static>(bridge: B) -> u64 {
    GLOBAL_REGISTRY.set_bridge(bridge)
}

pub fn is_ready() -> bool {
    GLOBAL_REGISTRY.is_ready()
}

pub fn get_bridge() -> Result<Arc<BridgeHandle>> {
    GLOBAL_REGISTRY.get_bridge()
}
