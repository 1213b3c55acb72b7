//! Configuration-driven plugin loading.
//!
//! Reads the `plugins` section:
//!
//! ```yaml
//! plugins:
//!   ocr:
//!     active: glm
//!     engines:
//!       glm:
//!         class: glm-ocr
//!         config:
//!           base_url: ${OLLAMA_BASE_URL}
//!   llm:
//!     active: vision
//!     providers:
//!       vision:
//!         class: ollama-vision
//!         enabled: true
//!         config: {}
//! ```
//!
//! Every declaration is resolved through the [`PluginCatalog`] and registered into the
//! [`ServiceRegistry`]. A bad declaration is logged and skipped; loading never aborts.

use crate::core::ConfigManager;
use crate::plugins::{PluginCatalog, ServiceRegistry, registry_key};
use crate::{AgentError, Result};
use serde::Serialize;
use serde_json::{Map, Value};

/// Table names holding plugin declarations inside a category.
const ENTRY_TABLES: [&str; 2] = ["engines", "providers"];

/// A declaration that could not be loaded.
#[derive(Debug, Clone, Serialize)]
pub struct LoadFailure {
    pub category: String,
    pub name: String,
    pub class: Option<String>,
    pub error: String,
}

/// Outcome of a load run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    /// Registry keys (`category.name`) that were registered.
    pub loaded: Vec<String>,
    pub failed: Vec<LoadFailure>,
    /// Declarations switched off with `enabled: false`.
    pub disabled: Vec<String>,
}

impl LoadReport {
    pub fn is_degraded(&self) -> bool {
        !self.failed.is_empty()
    }
}

pub struct PluginLoader<'a> {
    catalog: &'a PluginCatalog,
    registry: &'a ServiceRegistry,
}

impl<'a> PluginLoader<'a> {
    pub fn new(catalog: &'a PluginCatalog, registry: &'a ServiceRegistry) -> Self {
        Self { catalog, registry }
    }

    /// Load every declaration under `plugins`.
    pub fn load_all(&self, config: &ConfigManager) -> LoadReport {
        let mut report = LoadReport::default();
        let plugins = config.get_section("plugins");

        for (category, section) in &plugins {
            let Some(section) = section.as_object() else {
                tracing::warn!(category = %category, "Plugin category is not a mapping, skipping");
                continue;
            };

            for (name, declaration) in declarations(section) {
                self.load_one(category, name, declaration, &mut report);
            }
        }

        tracing::info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            disabled = report.disabled.len(),
            "Plugin loading finished"
        );
        report
    }

    fn load_one(&self, category: &str, name: &str, declaration: &Value, report: &mut LoadReport) {
        let key = registry_key(category, name);

        if declaration.get("enabled").and_then(Value::as_bool) == Some(false) {
            tracing::info!(plugin = %key, "Plugin disabled, skipping");
            report.disabled.push(key);
            return;
        }

        let class = declaration.get("class").and_then(Value::as_str).map(str::to_string);
        match self.register_declaration(category, name, class.as_deref(), declaration) {
            Ok(()) => report.loaded.push(key),
            Err(e) => {
                tracing::error!(plugin = %key, error = %e, "Failed to load plugin");
                report.failed.push(LoadFailure {
                    category: category.to_string(),
                    name: name.to_string(),
                    class,
                    error: e.to_string(),
                });
            }
        }
    }

    fn register_declaration(
        &self,
        category: &str,
        name: &str,
        class: Option<&str>,
        declaration: &Value,
    ) -> Result<()> {
        let plugin_key = registry_key(category, name);

        let class = class.ok_or_else(|| AgentError::PluginResolution {
            plugin_key: plugin_key.clone(),
            class: String::new(),
            message: "missing 'class'".to_string(),
        })?;

        let factory = self
            .catalog
            .resolve(class)
            .ok_or_else(|| AgentError::PluginResolution {
                plugin_key: plugin_key.clone(),
                class: class.to_string(),
                message: format!("unknown class (known: {})", self.catalog.classes().join(", ")),
            })?;

        let init_config = match declaration.get("config") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(config) => config.clone(),
        };

        self.registry
            .register(category, name, || factory(), init_config)
            .map(|_| ())
    }
}

/// Declarations of one category, from every entry table, in document order.
fn declarations(section: &Map<String, Value>) -> Vec<(&str, &Value)> {
    ENTRY_TABLES
        .iter()
        .filter_map(|table| section.get(*table).and_then(Value::as_object))
        .flat_map(|entries| entries.iter().map(|(name, decl)| (name.as_str(), decl)))
        .collect()
}
