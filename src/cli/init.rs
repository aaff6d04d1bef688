//! Init command implementation
//!
//! Writes a default `deepdive.toml` and a `.env.example` into a directory.

use super::output::Output;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
#[derive(Debug, PartialEq, Eq)]
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// deepdive.toml already exists
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: PathBuf,
    /// Overwrite existing files
    pub force: bool,
}

/// Starter configuration: local Ollama, DuckDuckGo search, no MCP server.
pub const CONFIG_TEMPLATE: &str = r#"# deepdive configuration
log_level = "info"

# Ollama - local inference (no API key required)
[providers.local]
type = "ollama"
base_url = "http://localhost:11434"

# OpenAI or any OpenAI-compatible gateway (set OPENAI_API_KEY in .env)
# [providers.openai]
# type = "openai"
# api_key_env = "OPENAI_API_KEY"
# api_base = "https://api.openai.com/v1"

# One model per pipeline stage
[models.planner]
provider = "local"
model = "llama3.1:8b"
temperature = 0.7

[models.decomposer]
provider = "local"
model = "llama3.1:8b"
temperature = 0.2

[models.coordinator]
provider = "local"
model = "llama3.1:8b"
temperature = 0.3

[models.subagent]
provider = "local"
model = "llama3.1:8b"
temperature = 0.3

[planner]
stream = true

# "duckduckgo" needs no key; "serpapi" reads its key from api_key_env
[search]
backend = "duckduckgo"
# api_key_env = "SERP_API_KEY"
num_results = 10

# Scraping server exposing page retrieval tools over streamable HTTP.
# When disabled, workers use the built-in fetch_page tool instead.
[mcp]
enabled = false
url = "http://localhost:8000/mcp/"

[limits]
dispatch_max_iterations = 24
worker_max_iterations = 12
max_workers = 16
tool_timeout_secs = 120
parallel_workers = true

[output]
path = "research_result.md"
"#;

const ENV_EXAMPLE: &str = r#"# deepdive environment variables
# Copy this file to .env and fill in the values you need.

# Logging level (trace, debug, info, warn, error)
RUST_LOG=info,deepdive=debug

# OpenAI-compatible provider key (if a provider uses api_key_env = "OPENAI_API_KEY")
# OPENAI_API_KEY=sk-...

# SerpAPI key (if [search] backend = "serpapi")
# SERP_API_KEY=...
"#;

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing deepdive");

    let config_path = config.path.join("deepdive.toml");
    if config_path.exists() && !config.force {
        output.warning("deepdive.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    if !config.path.exists() {
        if let Err(e) = fs::create_dir_all(&config.path) {
            output.error(&format!("Failed to create {}: {}", config.path.display(), e));
            return InitResult::Error(e.to_string());
        }
    }

    if let Err(e) = write_file(&config_path, CONFIG_TEMPLATE, config.force) {
        output.error(&format!("Failed to create deepdive.toml: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", "deepdive.toml");

    let env_path = config.path.join(".env.example");
    match write_file(&env_path, ENV_EXAMPLE, config.force) {
        Ok(true) => output.created("env", ".env.example"),
        Ok(false) => output.skipped(".env.example", "already exists"),
        Err(e) => output.warning(&format!("Failed to create .env.example: {}", e)),
    }

    output.complete("deepdive initialized");
    output.header("Next Steps");
    output.info("1. Start Ollama and pull the default model:");
    output.command("ollama pull llama3.1:8b");
    output.info("2. Run a research query:");
    output.command("deepdive research \"ESG trends 2024\"");

    InitResult::Success
}

/// Write `content` unless the file exists and `force` is off. Returns whether it wrote.
fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    fs::write(path, content)?;
    Ok(true)
}
