//! Base plugin trait definition.
//!
//! All plugins implement [`Plugin`], which carries identity, lifecycle and liveness. The
//! capability traits ([`OcrEngine`](crate::plugins::OcrEngine),
//! [`LlmProvider`](crate::plugins::LlmProvider)) extend it.

use crate::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a plugin instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    Uninitialized,
    Initialized,
    Failed,
    CleanedUp,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PluginState::Uninitialized => "uninitialized",
            PluginState::Initialized => "initialized",
            PluginState::Failed => "failed",
            PluginState::CleanedUp => "cleaned_up",
        };
        f.write_str(s)
    }
}

/// Lock-free holder for a [`PluginState`], for plugins that only have `&self`.
#[derive(Debug)]
pub struct Lifecycle(AtomicU8);

impl Lifecycle {
    pub fn new() -> Self {
        Self(AtomicU8::new(PluginState::Uninitialized as u8))
    }

    pub fn get(&self) -> PluginState {
        match self.0.load(Ordering::Acquire) {
            1 => PluginState::Initialized,
            2 => PluginState::Failed,
            3 => PluginState::CleanedUp,
            _ => PluginState::Uninitialized,
        }
    }

    pub fn set(&self, state: PluginState) {
        self.0.store(state as u8, Ordering::Release);
    }

    pub fn is_initialized(&self) -> bool {
        self.get() == PluginState::Initialized
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Base trait that all plugins must implement.
///
/// # Thread Safety
///
/// Plugins are shared as `Arc<dyn ...>` across tasks, so they must be `Send + Sync` and use
/// interior mutability for anything set up in [`initialize`](Plugin::initialize).
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use docagent::plugins::{Lifecycle, Plugin, PluginState};
/// use docagent::Result;
/// use serde_json::Value;
///
/// struct EchoPlugin {
///     lifecycle: Lifecycle,
/// }
///
/// #[async_trait]
/// impl Plugin for EchoPlugin {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     fn version(&self) -> String {
///         "1.0.0".to_string()
///     }
///
///     fn state(&self) -> PluginState {
///         self.lifecycle.get()
///     }
///
///     fn initialize(&self, _config: &Value) -> Result<()> {
///         self.lifecycle.set(PluginState::Initialized);
///         Ok(())
///     }
///
///     fn shutdown(&self) -> Result<()> {
///         self.lifecycle.set(PluginState::CleanedUp);
///         Ok(())
///     }
///
///     async fn health_check(&self) -> bool {
///         self.lifecycle.is_initialized()
///     }
/// }
/// ```
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable identifier of the implementation (e.g. `glm-ocr`).
    ///
    /// The registry key comes from configuration, so two instances of the same
    /// implementation may be registered under different names.
    fn name(&self) -> &str;

    /// Semantic version string.
    fn version(&self) -> String;

    fn state(&self) -> PluginState;

    /// Initialize from the plugin's `config` block.
    ///
    /// Called exactly once, before the plugin becomes visible in the registry. An error here
    /// keeps the plugin out of the registry.
    fn initialize(&self, config: &Value) -> Result<()>;

    /// Release resources. Errors are logged by the registry and never abort a bulk shutdown.
    fn shutdown(&self) -> Result<()>;

    /// Liveness probe. May perform a bounded network call; must not panic on failure.
    async fn health_check(&self) -> bool;

    fn description(&self) -> &str {
        ""
    }
}
