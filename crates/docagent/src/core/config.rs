//! Configuration loading and lookup.
//!
//! [`ConfigManager`] owns the hierarchical configuration document of the agent. The document
//! is read from YAML (default), TOML or JSON depending on the file extension, interpolated
//! against the process environment, and exposed through dot-separated path lookups such as
//! `plugins.ocr.active`.
//!
//! # Example
//!
//! ```rust
//! use docagent::core::config::ConfigManager;
//!
//! let config = ConfigManager::from_yaml_str(
//!     r#"
//! plugins:
//!   ocr:
//!     active: glm
//! logging:
//!   level: DEBUG
//! "#,
//! )?;
//!
//! assert_eq!(config.get_str("plugins.ocr.active").as_deref(), Some("glm"));
//! assert_eq!(config.log_level(), "DEBUG");
//! # Ok::<(), docagent::AgentError>(())
//! ```

use crate::core::env;
use crate::{AgentError, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

const DEFAULT_LOG_LEVEL: &str = "INFO";
const DEFAULT_AGENT_VERSION: &str = "0.1.0";

/// Supported on-disk configuration formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

impl ConfigFormat {
    /// Pick the format from a file extension. Unknown extensions are read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("toml") => ConfigFormat::Toml,
            Some("json") => ConfigFormat::Json,
            _ => ConfigFormat::Yaml,
        }
    }

    fn parse(self, content: &str) -> Result<Value> {
        let value = match self {
            ConfigFormat::Yaml => serde_yaml_ng::from_str::<Value>(content)
                .map_err(|e| AgentError::config_with_source("Invalid YAML configuration", e))?,
            ConfigFormat::Toml => toml::from_str::<Value>(content)
                .map_err(|e| AgentError::config_with_source("Invalid TOML configuration", e))?,
            ConfigFormat::Json => serde_json::from_str::<Value>(content)
                .map_err(|e| AgentError::config_with_source("Invalid JSON configuration", e))?,
        };

        match value {
            Value::Null => Ok(Value::Object(Map::new())),
            Value::Object(_) => Ok(value),
            other => Err(AgentError::config(format!(
                "Configuration root must be a mapping, found {}",
                value_kind(&other)
            ))),
        }
    }
}

/// Hierarchical configuration with env interpolation and atomic reload.
///
/// # Thread Safety
///
/// The tree is held as an `Arc<Value>` behind a `RwLock`. Readers clone the `Arc` and work on
/// a consistent snapshot; [`ConfigManager::reload`] builds the new tree completely before
/// swapping it in, so a reader sees either the old or the new document, never a mix.
#[derive(Debug)]
pub struct ConfigManager {
    path: Option<PathBuf>,
    tree: RwLock<Arc<Value>>,
}

impl ConfigManager {
    /// Load configuration from a file.
    ///
    /// # Errors
    ///
    /// - `AgentError::ConfigNotFound` if the file does not exist
    /// - `AgentError::Config` if the document cannot be parsed
    /// - `AgentError::Io` for other read failures
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tree = read_document(&path)?;
        Ok(Self {
            path: Some(path),
            tree: RwLock::new(Arc::new(tree)),
        })
    }

    /// Build a configuration from an in-memory YAML document.
    ///
    /// The manager has no backing file, so [`ConfigManager::reload`] leaves it unchanged.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let raw = ConfigFormat::Yaml.parse(content)?;
        Ok(Self::from_value(raw))
    }

    /// Build a configuration from an already parsed tree. Interpolation is applied.
    pub fn from_value(value: Value) -> Self {
        let tree = finish_tree(value, None);
        Self {
            path: None,
            tree: RwLock::new(Arc::new(tree)),
        }
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// A consistent snapshot of the whole tree.
    pub fn snapshot(&self) -> Arc<Value> {
        match self.tree.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Value at a dot-separated path.
    ///
    /// Returns `None` if any segment is absent, the traversal hits a non-mapping node, or the
    /// value is `null`.
    pub fn get(&self, path: &str) -> Option<Value> {
        let tree = self.snapshot();
        lookup(&tree, path).cloned()
    }

    /// Value at a dot-separated path, or `default`.
    pub fn get_or(&self, path: &str, default: Value) -> Value {
        self.get(path).unwrap_or(default)
    }

    /// String value at a path. Numbers and booleans are rendered as strings.
    pub fn get_str(&self, path: &str) -> Option<String> {
        match self.get(path)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Boolean value at a path.
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path)?.as_bool()
    }

    /// Unsigned integer value at a path.
    pub fn get_u64(&self, path: &str) -> Option<u64> {
        self.get(path)?.as_u64()
    }

    /// Floating point value at a path.
    pub fn get_f64(&self, path: &str) -> Option<f64> {
        self.get(path)?.as_f64()
    }

    /// Sub-mapping at `name`, or an empty mapping if absent or not a mapping.
    pub fn get_section(&self, name: &str) -> Map<String, Value> {
        match self.get(name) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Re-read the backing document and swap the tree atomically.
    ///
    /// On failure the previous tree stays in place and the error is returned.
    pub fn reload(&self) -> Result<()> {
        let Some(path) = &self.path else {
            tracing::debug!("Configuration has no backing file; reload skipped");
            return Ok(());
        };

        let tree = Arc::new(read_document(path)?);
        let mut guard = self
            .tree
            .write()
            .map_err(|e| AgentError::LockPoisoned(format!("Config tree lock poisoned: {}", e)))?;
        *guard = tree;

        tracing::info!(path = %path.display(), "Configuration reloaded");
        Ok(())
    }

    /// Variable names whose `${...}` tokens remained unresolved after interpolation.
    pub fn unresolved_vars(&self) -> Vec<String> {
        env::referenced_vars(&self.snapshot())
    }

    /// Configured log level (`logging.level`), `INFO` by default.
    pub fn log_level(&self) -> String {
        self.get_str("logging.level")
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
    }

    /// Configured agent version (`agent.version`), `0.1.0` by default.
    pub fn agent_version(&self) -> String {
        self.get_str("agent.version")
            .unwrap_or_else(|| DEFAULT_AGENT_VERSION.to_string())
    }
}

/// Walk a dot-separated path through nested mappings.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        match current {
            Value::Object(map) => current = map.get(segment)?,
            _ => return None,
        }
    }

    if current.is_null() { None } else { Some(current) }
}

fn read_document(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Err(AgentError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path)?;
    let raw = ConfigFormat::from_path(path).parse(&content)?;
    let tree = finish_tree(raw, Some(path));

    tracing::info!(path = %path.display(), "Loaded configuration");
    Ok(tree)
}

fn finish_tree(raw: Value, path: Option<&Path>) -> Value {
    let tree = env::interpolate(&raw);

    let unresolved = env::referenced_vars(&tree);
    if !unresolved.is_empty() {
        tracing::warn!(
            path = %path.map(|p| p.display().to_string()).unwrap_or_else(|| "<memory>".to_string()),
            vars = ?unresolved,
            "Configuration references unset environment variables; tokens left verbatim"
        );
    }

    tree
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;
    use std::fs;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
agent:
  version: 1.2.0
logging:
  level: DEBUG
plugins:
  ocr:
    active: glm
    engines:
      glm:
        class: glm-ocr
        config:
          base_url: http://localhost:11434
          timeout_secs: 30
  llm:
    active: qwen
"#;

    #[test]
    fn test_get_returns_exact_leaf_values() {
        let config = ConfigManager::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.get("plugins.ocr.active"), Some(json!("glm")));
        assert_eq!(
            config.get("plugins.ocr.engines.glm.config.timeout_secs"),
            Some(json!(30))
        );
        assert_eq!(config.get_u64("plugins.ocr.engines.glm.config.timeout_secs"), Some(30));
        assert_eq!(config.get_str("agent.version").as_deref(), Some("1.2.0"));
    }

    #[test]
    fn test_get_missing_paths_return_default() {
        let config = ConfigManager::from_yaml_str(SAMPLE).unwrap();
        let default = json!("fallback");

        assert_eq!(config.get_or("plugins.vision.active", default.clone()), default);
        assert_eq!(config.get_or("nope", default.clone()), default);
        // traversal through a scalar
        assert_eq!(config.get_or("plugins.ocr.active.deeper", default.clone()), default);
        assert_eq!(config.get_or("", default.clone()), default);
    }

    #[test]
    fn test_null_leaf_returns_default() {
        let config = ConfigManager::from_yaml_str("a:\n  b: ~\n").unwrap();
        assert_eq!(config.get_or("a.b", json!(7)), json!(7));
    }

    #[test]
    fn test_get_section() {
        let config = ConfigManager::from_yaml_str(SAMPLE).unwrap();
        let plugins = config.get_section("plugins");
        assert_eq!(plugins.keys().collect::<Vec<_>>(), vec!["ocr", "llm"]);

        assert!(config.get_section("missing").is_empty());
        assert!(config.get_section("plugins.ocr.active").is_empty());
    }

    #[test]
    fn test_load_missing_file_is_config_not_found() {
        let dir = tempdir().unwrap();
        let err = ConfigManager::load(dir.path().join("config.yaml")).unwrap_err();
        assert!(matches!(err, AgentError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_load_invalid_yaml_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "plugins: [unclosed").unwrap();

        let err = ConfigManager::load(&path).unwrap_err();
        assert!(matches!(err, AgentError::Config { .. }));
    }

    #[test]
    fn test_scalar_root_is_rejected() {
        let err = ConfigManager::from_yaml_str("just a string").unwrap_err();
        assert!(err.to_string().contains("must be a mapping"));
    }

    #[test]
    fn test_empty_document_is_empty_mapping() {
        let config = ConfigManager::from_yaml_str("").unwrap();
        assert!(config.get_section("plugins").is_empty());
        assert_eq!(config.log_level(), "INFO");
        assert_eq!(config.agent_version(), "0.1.0");
    }

    #[test]
    fn test_load_toml_and_json_by_extension() {
        let dir = tempdir().unwrap();

        let toml_path = dir.path().join("agent.toml");
        fs::write(&toml_path, "[plugins.ocr]\nactive = \"tesseract\"\n").unwrap();
        let config = ConfigManager::load(&toml_path).unwrap();
        assert_eq!(config.get_str("plugins.ocr.active").as_deref(), Some("tesseract"));

        let json_path = dir.path().join("agent.json");
        fs::write(&json_path, r#"{"logging": {"level": "WARNING"}}"#).unwrap();
        let config = ConfigManager::load(&json_path).unwrap();
        assert_eq!(config.log_level(), "WARNING");
    }

    #[test]
    #[serial]
    fn test_env_interpolation_set_and_unset() {
        unsafe {
            std::env::set_var("DOCAGENT_TEST_FOO", "bar");
            std::env::remove_var("DOCAGENT_TEST_UNSET");
        }

        let config = ConfigManager::from_yaml_str(
            "a: ${DOCAGENT_TEST_FOO}\nb: ${DOCAGENT_TEST_UNSET}\n",
        )
        .unwrap();

        assert_eq!(config.get_str("a").as_deref(), Some("bar"));
        assert_eq!(config.get_str("b").as_deref(), Some("${DOCAGENT_TEST_UNSET}"));
        assert_eq!(config.unresolved_vars(), vec!["DOCAGENT_TEST_UNSET".to_string()]);

        unsafe {
            std::env::remove_var("DOCAGENT_TEST_FOO");
        }
    }

    #[test]
    fn test_reload_replaces_tree() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "plugins:\n  ocr:\n    active: glm\n").unwrap();

        let config = ConfigManager::load(&path).unwrap();
        let before = config.snapshot();

        fs::write(&path, "plugins:\n  ocr:\n    active: tesseract\n").unwrap();
        config.reload().unwrap();

        assert_eq!(config.get_str("plugins.ocr.active").as_deref(), Some("tesseract"));
        // An old snapshot is untouched by the swap.
        assert_eq!(lookup(&before, "plugins.ocr.active"), Some(&json!("glm")));
    }

    #[test]
    fn test_failed_reload_keeps_previous_tree() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "logging:\n  level: ERROR\n").unwrap();
        let config = ConfigManager::load(&path).unwrap();

        fs::remove_file(&path).unwrap();
        assert!(matches!(config.reload(), Err(AgentError::ConfigNotFound { .. })));
        assert_eq!(config.log_level(), "ERROR");
    }

    #[test]
    fn test_reload_without_backing_file_is_noop() {
        let config = ConfigManager::from_yaml_str(SAMPLE).unwrap();
        config.reload().unwrap();
        assert_eq!(config.get_str("plugins.llm.active").as_deref(), Some("qwen"));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.YAML")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("config")), ConfigFormat::Yaml);
    }
}
