//! Plugin registration and discovery.
//!
//! The [`ServiceRegistry`] holds every live plugin instance keyed by `category.name`. It is
//! owned by the [`Agent`](crate::Agent) and shared as `Arc<ServiceRegistry>`; there is no
//! process-wide registry.

use crate::plugins::{LlmProvider, OcrEngine, Plugin, PluginState};
use crate::{AgentError, Result};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::task::JoinSet;

/// Upper bound for a single health probe, on top of the plugin's own network timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn validate_plugin_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(AgentError::validation("Plugin name cannot be empty"));
    }

    if name.contains(char::is_whitespace) {
        return Err(AgentError::validation(format!(
            "Plugin name '{}' cannot contain whitespace",
            name
        )));
    }

    Ok(())
}

/// A live plugin instance, tagged by capability.
#[derive(Clone)]
pub enum ServicePlugin {
    Ocr(Arc<dyn OcrEngine>),
    Llm(Arc<dyn LlmProvider>),
}

impl ServicePlugin {
    pub fn as_plugin(&self) -> &dyn Plugin {
        match self {
            ServicePlugin::Ocr(engine) => engine.as_ref(),
            ServicePlugin::Llm(provider) => provider.as_ref(),
        }
    }

    pub fn name(&self) -> &str {
        self.as_plugin().name()
    }

    pub fn version(&self) -> String {
        self.as_plugin().version()
    }

    pub fn state(&self) -> PluginState {
        self.as_plugin().state()
    }

    /// Capability tag: `ocr` or `llm`.
    pub fn kind(&self) -> &'static str {
        match self {
            ServicePlugin::Ocr(_) => "ocr",
            ServicePlugin::Llm(_) => "llm",
        }
    }

    pub fn as_ocr(&self) -> Option<&Arc<dyn OcrEngine>> {
        match self {
            ServicePlugin::Ocr(engine) => Some(engine),
            ServicePlugin::Llm(_) => None,
        }
    }

    pub fn as_llm(&self) -> Option<&Arc<dyn LlmProvider>> {
        match self {
            ServicePlugin::Llm(provider) => Some(provider),
            ServicePlugin::Ocr(_) => None,
        }
    }

    pub fn supports_vision(&self) -> bool {
        self.as_llm().is_some_and(|provider| provider.as_vision().is_some())
    }

    pub fn initialize(&self, config: &Value) -> Result<()> {
        self.as_plugin().initialize(config)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.as_plugin().shutdown()
    }

    pub async fn health_check(&self) -> bool {
        self.as_plugin().health_check().await
    }
}

impl fmt::Debug for ServicePlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServicePlugin")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .field("version", &self.version())
            .finish()
    }
}

/// A registered plugin together with the config block it was initialized with.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub plugin: ServicePlugin,
    pub config: Value,
}

/// Build the `category.name` registry key.
pub fn registry_key(category: &str, name: &str) -> String {
    format!("{}.{}", category, name)
}

/// In-memory store of live plugins.
///
/// Entries keep registration order. Replacing an entry keeps its original position.
pub struct ServiceRegistry {
    entries: RwLock<IndexMap<String, RegistryEntry>>,
    probe_timeout: Duration,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::with_probe_timeout(DEFAULT_PROBE_TIMEOUT)
    }

    pub fn with_probe_timeout(probe_timeout: Duration) -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            probe_timeout,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, IndexMap<String, RegistryEntry>>> {
        self.entries
            .read()
            .map_err(|e| AgentError::LockPoisoned(format!("Service registry lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, IndexMap<String, RegistryEntry>>> {
        self.entries
            .write()
            .map_err(|e| AgentError::LockPoisoned(format!("Service registry lock poisoned: {}", e)))
    }

    /// Construct a plugin with `factory`, initialize it with `config` and store it.
    ///
    /// Initialization happens before the write lock is taken, so readers never see an
    /// uninitialized entry. An existing entry under the same key is replaced without being
    /// shut down.
    ///
    /// # Errors
    ///
    /// `Validation` for an invalid category or name; `PluginInitialization` if construction or
    /// initialization fails, in which case nothing is stored.
    pub fn register<F>(&self, category: &str, name: &str, factory: F, config: Value) -> Result<ServicePlugin>
    where
        F: FnOnce() -> Result<ServicePlugin>,
    {
        validate_plugin_name(category)?;
        validate_plugin_name(name)?;
        let key = registry_key(category, name);

        let plugin = factory().map_err(|e| into_initialization_error(&key, e))?;
        self.insert_initialized(key, plugin, config)
    }

    /// Register an already constructed plugin. Same contract as [`register`](Self::register).
    pub fn register_instance(
        &self,
        category: &str,
        name: &str,
        plugin: ServicePlugin,
        config: Value,
    ) -> Result<ServicePlugin> {
        validate_plugin_name(category)?;
        validate_plugin_name(name)?;
        self.insert_initialized(registry_key(category, name), plugin, config)
    }

    fn insert_initialized(&self, key: String, plugin: ServicePlugin, config: Value) -> Result<ServicePlugin> {
        plugin
            .initialize(&config)
            .map_err(|e| into_initialization_error(&key, e))?;

        let previous = self.write()?.insert(
            key.clone(),
            RegistryEntry {
                plugin: plugin.clone(),
                config,
            },
        );

        if previous.is_some() {
            tracing::info!(plugin = %key, "Replaced registered plugin");
        } else {
            tracing::info!(plugin = %key, kind = plugin.kind(), version = %plugin.version(), "Registered plugin");
        }
        Ok(plugin)
    }

    /// Look up a plugin. Never constructs anything.
    pub fn get(&self, category: &str, name: &str) -> Result<Option<ServicePlugin>> {
        Ok(self
            .read()?
            .get(&registry_key(category, name))
            .map(|entry| entry.plugin.clone()))
    }

    /// Look up an OCR engine. `None` if absent or if the entry is not an OCR engine.
    pub fn get_ocr(&self, category: &str, name: &str) -> Result<Option<Arc<dyn OcrEngine>>> {
        Ok(self.get(category, name)?.and_then(|p| p.as_ocr().cloned()))
    }

    /// Look up an LLM provider. `None` if absent or if the entry is not an LLM provider.
    pub fn get_llm(&self, category: &str, name: &str) -> Result<Option<Arc<dyn LlmProvider>>> {
        Ok(self.get(category, name)?.and_then(|p| p.as_llm().cloned()))
    }

    /// Init config a plugin was registered with.
    pub fn config_for(&self, category: &str, name: &str) -> Result<Option<Value>> {
        Ok(self
            .read()?
            .get(&registry_key(category, name))
            .map(|entry| entry.config.clone()))
    }

    /// All plugins of `category`, keyed by bare name, in registration order.
    pub fn list_category(&self, category: &str) -> Result<IndexMap<String, ServicePlugin>> {
        let prefix = format!("{}.", category);
        Ok(self
            .read()?
            .iter()
            .filter_map(|(key, entry)| {
                key.strip_prefix(&prefix)
                    .map(|name| (name.to_string(), entry.plugin.clone()))
            })
            .collect())
    }

    /// All registry keys in registration order.
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove a plugin and shut it down. Unknown keys are a no-op.
    pub fn unregister(&self, category: &str, name: &str) -> Result<()> {
        let key = registry_key(category, name);
        let removed = self.write()?.shift_remove(&key);

        if let Some(entry) = removed {
            tracing::info!(plugin = %key, "Unregistered plugin");
            entry.plugin.shutdown()?;
        }
        Ok(())
    }

    /// Remove and shut down every plugin. Shutdown errors are logged and skipped.
    pub fn shutdown_all(&self) -> Result<()> {
        let drained: Vec<(String, RegistryEntry)> = self.write()?.drain(..).collect();

        for (key, entry) in drained {
            if let Err(e) = entry.plugin.shutdown() {
                tracing::warn!(plugin = %key, error = %e, "Plugin shutdown failed");
            }
        }
        Ok(())
    }

    /// Probe every plugin concurrently.
    ///
    /// Each probe runs in its own task bounded by the probe timeout. A probe that panics,
    /// times out or reports `false` yields `false` for that key only. Keys are returned in
    /// registration order.
    pub async fn health_check_all(&self) -> Result<IndexMap<String, bool>> {
        let snapshot: Vec<(String, ServicePlugin)> = self
            .read()?
            .iter()
            .map(|(key, entry)| (key.clone(), entry.plugin.clone()))
            .collect();

        let mut status: IndexMap<String, bool> = snapshot.iter().map(|(key, _)| (key.clone(), false)).collect();

        let mut tasks = JoinSet::new();
        for (key, plugin) in snapshot {
            let probe_timeout = self.probe_timeout;
            tasks.spawn(async move {
                let healthy = match tokio::time::timeout(probe_timeout, plugin.health_check()).await {
                    Ok(healthy) => healthy,
                    Err(_) => {
                        tracing::warn!(plugin = %key, "Health probe timed out");
                        false
                    }
                };
                (key, healthy)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((key, healthy)) => {
                    status.insert(key, healthy);
                }
                Err(join_err) => {
                    tracing::warn!(error = %join_err, "Health probe task failed");
                }
            }
        }

        Ok(status)
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("keys", &self.keys().unwrap_or_default())
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

fn into_initialization_error(key: &str, err: AgentError) -> AgentError {
    match err {
        AgentError::PluginInitialization { .. } => err,
        other => AgentError::PluginInitialization {
            plugin_key: key.to_string(),
            message: other.to_string(),
            source: Some(Box::new(other)),
        },
    }
}
