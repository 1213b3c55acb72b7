//! Configuration file loading, interpolation and reload under concurrent readers.

use docagent::core::config::ConfigManager;
use serial_test::serial;
use std::fs;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn write_config(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn test_plugin_config_picks_up_environment() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "config.yaml",
        r#"
plugins:
  ocr:
    active: glm
    engines:
      glm:
        class: glm-ocr
        config:
          base_url: ${DOCAGENT_TEST_OLLAMA}
          model: ${DOCAGENT_TEST_UNSET_MODEL}
"#,
    );

    unsafe {
        std::env::set_var("DOCAGENT_TEST_OLLAMA", "http://gpu-box:11434");
        std::env::remove_var("DOCAGENT_TEST_UNSET_MODEL");
    }

    let config = ConfigManager::load(&path).unwrap();

    assert_eq!(
        config.get_str("plugins.ocr.engines.glm.config.base_url").as_deref(),
        Some("http://gpu-box:11434")
    );
    assert_eq!(
        config.get_str("plugins.ocr.engines.glm.config.model").as_deref(),
        Some("${DOCAGENT_TEST_UNSET_MODEL}")
    );
    assert_eq!(config.unresolved_vars(), vec!["DOCAGENT_TEST_UNSET_MODEL"]);

    unsafe {
        std::env::remove_var("DOCAGENT_TEST_OLLAMA");
    }
}

#[test]
fn test_toml_config_matches_yaml() {
    let dir = TempDir::new().unwrap();
    let yaml = write_config(
        &dir,
        "config.yaml",
        "plugins:\n  llm:\n    active: qwen\nlogging:\n  level: WARNING\n",
    );
    let toml = write_config(
        &dir,
        "config.toml",
        "[plugins.llm]\nactive = \"qwen\"\n\n[logging]\nlevel = \"WARNING\"\n",
    );

    let from_yaml = ConfigManager::load(&yaml).unwrap();
    let from_toml = ConfigManager::load(&toml).unwrap();

    assert_eq!(*from_yaml.snapshot(), *from_toml.snapshot());
    assert_eq!(from_toml.log_level(), "WARNING");
}

#[test]
fn test_readers_see_whole_documents_during_reload() {
    let dir = TempDir::new().unwrap();
    let old = "pair:\n  left: old\n  right: old\n";
    let new = "pair:\n  left: new\n  right: new\n";
    let path = write_config(&dir, "config.yaml", old);
    let config = Arc::new(ConfigManager::load(&path).unwrap());

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let config = Arc::clone(&config);
            thread::spawn(move || {
                for _ in 0..500 {
                    let tree = config.snapshot();
                    assert_eq!(tree["pair"]["left"], tree["pair"]["right"]);
                }
            })
        })
        .collect();

    for round in 0..50 {
        fs::write(&path, if round % 2 == 0 { new } else { old }).unwrap();
        config.reload().unwrap();
    }

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(config.get_str("pair.left").as_deref(), Some("old"));
}
