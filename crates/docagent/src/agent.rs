//! The agent façade.
//!
//! An [`Agent`] owns the configuration and the plugin registry. Construction runs the
//! [`PluginLoader`], so a freshly built agent already holds every plugin the configuration
//! declares (minus the ones that failed to load).

use crate::core::{ConfigManager, io};
use crate::ocr::OcrProcessor;
use crate::plugins::{LoadReport, PluginCatalog, PluginLoader, ServicePlugin, ServiceRegistry};
use crate::types::{GenerateOptions, LlmResponse, OcrOptions, OcrResult, ProcessingMode};
use crate::{AgentError, Result};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

pub const OCR_CATEGORY: &str = "ocr";
pub const LLM_CATEGORY: &str = "llm";

/// Version and liveness of one plugin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginStatus {
    pub version: String,
    pub healthy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Aggregate health of the agent.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub plugins: IndexMap<String, bool>,
    pub version: String,
    /// Declarations that never made it into the registry.
    pub failed_plugins: Vec<String>,
}

pub struct Agent {
    config: Arc<ConfigManager>,
    registry: Arc<ServiceRegistry>,
    load_report: LoadReport,
}

impl Agent {
    /// Build the registry and load every declared plugin.
    pub fn new(config: ConfigManager, catalog: &PluginCatalog) -> Self {
        Self::with_registry(config, catalog, ServiceRegistry::new())
    }

    /// Like [`new`](Self::new) with a caller-provided (possibly pre-populated) registry.
    pub fn with_registry(config: ConfigManager, catalog: &PluginCatalog, registry: ServiceRegistry) -> Self {
        let load_report = PluginLoader::new(catalog, &registry).load_all(&config);
        if load_report.is_degraded() {
            tracing::warn!(failed = load_report.failed.len(), "Agent starting with a reduced plugin set");
        }

        tracing::info!(
            version = %config.agent_version(),
            plugins = registry.len(),
            "Agent initialized"
        );

        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            load_report,
        }
    }

    /// Load configuration from `path` and build an agent with the built-in backends.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let config = ConfigManager::load(path)?;
        Ok(Self::new(config, &PluginCatalog::with_builtins()))
    }

    pub fn config(&self) -> &Arc<ConfigManager> {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    /// Run plugin `operation` of `category` on the document at `path`.
    ///
    /// # Errors
    ///
    /// `NotFound` if no such plugin is registered, `Unhealthy` if its probe fails and
    /// `Unsupported` if it has no generic processing capability. Plugin errors propagate.
    pub async fn execute(
        &self,
        category: &str,
        operation: &str,
        path: &Path,
        options: &OcrOptions,
    ) -> Result<OcrResult> {
        let plugin = self
            .registry
            .get(category, operation)?
            .ok_or_else(|| AgentError::not_found(category, operation))?;

        if !plugin.health_check().await {
            return Err(AgentError::Unhealthy {
                category: category.to_string(),
                name: operation.to_string(),
            });
        }

        match plugin {
            ServicePlugin::Ocr(engine) => {
                let mut result = engine.process(path, options).await?;
                result.set_engine(operation);
                Ok(result)
            }
            ServicePlugin::Llm(_) => Err(AgentError::Unsupported {
                category: category.to_string(),
                name: operation.to_string(),
                capability: "process".to_string(),
            }),
        }
    }

    /// Name configured at `plugins.<category>.active`, if any.
    pub fn active_plugin_name(&self, category: &str) -> Option<String> {
        self.config
            .get_str(&format!("plugins.{}.active", category))
            .filter(|name| !name.is_empty())
    }

    /// The plugin configured as active for `category`.
    ///
    /// `None` when no active name is configured or when that name is not registered.
    pub fn get_active_plugin(&self, category: &str) -> Result<Option<ServicePlugin>> {
        match self.active_plugin_name(category) {
            Some(name) => self.registry.get(category, &name),
            None => Ok(None),
        }
    }

    /// Liveness of every registered plugin, keyed by `category.name`.
    pub async fn health_check(&self) -> Result<IndexMap<String, bool>> {
        self.registry.health_check_all().await
    }

    /// Version and liveness of the plugins of `category`, keyed by bare name.
    pub async fn list_plugins(&self, category: &str) -> Result<IndexMap<String, PluginStatus>> {
        let plugins = self.registry.list_category(category)?;
        let health = self.registry.health_check_all().await?;

        Ok(plugins
            .into_iter()
            .map(|(name, plugin)| {
                let healthy = health
                    .get(&crate::plugins::registry_key(category, &name))
                    .copied()
                    .unwrap_or(false);
                let status = PluginStatus {
                    version: plugin.version(),
                    healthy,
                };
                (name, status)
            })
            .collect())
    }

    /// Aggregate health: `healthy` only if every plugin is healthy and none failed to load.
    pub async fn health_report(&self) -> Result<HealthReport> {
        let plugins = self.health_check().await?;
        let failed_plugins: Vec<String> = self
            .load_report
            .failed
            .iter()
            .map(|f| crate::plugins::registry_key(&f.category, &f.name))
            .collect();

        let status = if plugins.values().all(|healthy| *healthy) && failed_plugins.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        Ok(HealthReport {
            status,
            plugins,
            version: self.config.agent_version(),
            failed_plugins,
        })
    }

    /// An [`OcrProcessor`] over the current OCR engines, the active OCR name and the active LLM.
    pub fn ocr_processor(&self) -> Result<OcrProcessor> {
        let engines = self
            .registry
            .list_category(OCR_CATEGORY)?
            .into_iter()
            .filter_map(|(name, plugin)| plugin.as_ocr().cloned().map(|engine| (name, engine)))
            .collect();

        let mut processor = OcrProcessor::new(engines);
        if let Some(active) = self.active_plugin_name(OCR_CATEGORY) {
            processor = processor.with_active_engine(active);
        }
        if let Some(name) = self.active_plugin_name(LLM_CATEGORY)
            && let Some(provider) = self.registry.get_llm(LLM_CATEGORY, &name)?
        {
            processor = processor.with_llm(name, provider);
        }
        Ok(processor)
    }

    /// OCR a document in the given mode.
    pub async fn process_document(&self, path: &Path, mode: ProcessingMode) -> Result<OcrResult> {
        io::validate_file_exists(path)?;
        self.ocr_processor()?.process(path, mode).await
    }

    /// Generate text with the active LLM provider.
    pub async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<LlmResponse> {
        let name = self
            .active_plugin_name(LLM_CATEGORY)
            .ok_or_else(|| AgentError::config("No active LLM provider configured (plugins.llm.active)"))?;
        let provider = self
            .registry
            .get_llm(LLM_CATEGORY, &name)?
            .ok_or_else(|| AgentError::not_found(LLM_CATEGORY, &name))?;

        provider.generate(prompt, options).await
    }

    /// Shut down and remove every plugin.
    pub fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down agent");
        self.registry.shutdown_all()
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("config_path", &self.config.path())
            .field("registry", &self.registry)
            .field("load_report", &self.load_report)
            .finish()
    }
}
