//! Configuration integration tests
//!
//! Loads `deepdive.toml` files from disk and wires a pipeline from them.

use deepdive::utils::progress::NullSink;
use deepdive::utils::toml_config::{ProviderConfig, SearchBackendKind};
use deepdive::{AppError, ConfigError, DeepdiveConfig, ResearchCoordinator};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const HOSTED_CONFIG: &str = r#"
log_level = "debug"

[providers.gateway]
type = "openai"
api_key_env = "DEEPDIVE_TEST_GATEWAY_KEY"
api_base = "https://gateway.example.com/v1"

[providers.local]
type = "ollama"

[models.planner]
provider = "gateway"
model = "gpt-4o"
temperature = 0.7

[models.decomposer]
provider = "gateway"
model = "gpt-4o-mini"

[models.coordinator]
provider = "local"
model = "llama3.1:8b"

[models.subagent]
provider = "local"
model = "llama3.1:8b"
max_tokens = 2048

[search]
backend = "serpapi"
api_key_env = "DEEPDIVE_TEST_SERP_KEY"
num_results = 5

[limits]
max_workers = 4
"#;

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("deepdive.toml");
    fs::write(&path, content).expect("Failed to write config");
    path
}

#[test]
fn test_hosted_config_loads_and_wires() {
    std::env::set_var("DEEPDIVE_TEST_GATEWAY_KEY", "sk-test");
    std::env::set_var("DEEPDIVE_TEST_SERP_KEY", "serp-test");

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = DeepdiveConfig::load(write_config(&dir, HOSTED_CONFIG)).unwrap();

    assert_eq!(config.log_level, "debug");
    assert_eq!(config.search.backend, SearchBackendKind::SerpApi);
    assert_eq!(config.search.num_results, 5);
    assert_eq!(config.limits.max_workers, 4);
    assert_eq!(config.limits.dispatch_max_iterations, 24);
    assert_eq!(config.get_model("subagent").unwrap().max_tokens, Some(2048));
    assert!(matches!(
        config.get_provider("local"),
        Some(ProviderConfig::Ollama { base_url }) if base_url == "http://localhost:11434"
    ));
    assert_eq!(config.search_api_key().unwrap().as_deref(), Some("serp-test"));

    assert!(ResearchCoordinator::from_config(&config, Arc::new(NullSink)).is_ok());
}

#[test]
fn test_missing_provider_key_is_a_config_error() {
    let content = HOSTED_CONFIG
        .replace("DEEPDIVE_TEST_GATEWAY_KEY", "DEEPDIVE_TEST_UNSET_GATEWAY_KEY")
        .replace("DEEPDIVE_TEST_SERP_KEY", "DEEPDIVE_TEST_UNSET_SERP_KEY");
    let dir = TempDir::new().expect("Failed to create temp dir");

    let err = DeepdiveConfig::load(write_config(&dir, &content)).unwrap_err();
    assert!(matches!(err, ConfigError::MissingEnvVar(name) if name.starts_with("DEEPDIVE_TEST_UNSET")));

    let config = DeepdiveConfig::from_toml_str(&content).unwrap();
    match ResearchCoordinator::from_config(&config, Arc::new(NullSink)) {
        Err(AppError::Config(message)) => assert!(message.contains("DEEPDIVE_TEST_UNSET")),
        Err(other) => panic!("expected a config error, got {:?}", other),
        Ok(_) => panic!("expected a config error"),
    }
}

#[test]
fn test_minimal_file_gets_defaults_for_every_section() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(
        &dir,
        r#"
[providers.local]
type = "ollama"

[models.planner]
provider = "local"
model = "qwen2.5:7b"
[models.decomposer]
provider = "local"
model = "qwen2.5:7b"
[models.coordinator]
provider = "local"
model = "qwen2.5:7b"
[models.subagent]
provider = "local"
model = "qwen2.5:7b"
"#,
    );

    let config = DeepdiveConfig::load(path).unwrap();
    assert_eq!(config.log_level, "info");
    assert!(config.planner.stream);
    assert_eq!(config.search.backend, SearchBackendKind::DuckDuckGo);
    assert!(!config.mcp.enabled);
    assert!(config.limits.parallel_workers);
    assert_eq!(
        config.output.path,
        std::path::PathBuf::from("research_result.md")
    );
}

#[test]
fn test_load_reports_parse_errors() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let err = DeepdiveConfig::load(write_config(&dir, "[models.planner\nprovider = 1")).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
}
