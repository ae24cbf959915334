//! Host wiring: mounts the provider into a session's provider table.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::bridge::{global_registry, BridgeRegistry};
use crate::config::ProviderConfig;
use crate::provider::{Provider, WebLlmProvider};
use crate::Result;

/// The host's provider mount points plus its session default.
#[derive(Default)]
pub struct MountPoints {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: Option<String>,
}

impl MountPoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a provider under its own name, replacing any provider with that name.
    pub fn insert(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn default_provider(&self) -> Option<&str> {
        self.default_provider.as_deref()
    }

    pub fn set_default_provider(&mut self, name: impl Into<String>) {
        self.default_provider = Some(name.into());
    }

    /// The session default provider, if one is set and mounted.
    pub fn default_mounted(&self) -> Option<Arc<dyn Provider>> {
        self.default_provider.as_deref().and_then(|n| self.get(n))
    }
}

/// Mount a [`WebLlmProvider`] bound to the process-wide bridge registry.
///
/// `config` is the host's provider config mapping (`default_model`, `temperature`,
/// `max_tokens`, `top_p`). The provider becomes the session default only when the host
/// has none yet. Nothing needs tearing down afterwards.
pub fn mount(points: &mut MountPoints, config: Value) -> Result<Arc<WebLlmProvider>> {
    mount_with_registry(points, config, global_registry())
}

pub fn mount_with_registry(
    points: &mut MountPoints,
    config: Value,
    registry: Arc<BridgeRegistry>,
) -> Result<Arc<WebLlmProvider>> {
    let config = ProviderConfig::from_value(config)?;
    let provider = Arc::new(WebLlmProvider::with_registry(config, registry)?);
    points.insert(provider.clone());

    if points.default_provider().is_none() {
        points.set_default_provider(WebLlmProvider::NAME);
    }
    info!(
        provider = WebLlmProvider::NAME,
        model = %provider.config().default_model,
        default = points.default_provider() == Some(WebLlmProvider::NAME),
        "provider mounted"
    );
    Ok(provider)
}
