//! Global configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.windlass/` in
//! production) and deserializes it into [`OrchestratorConfig`]. Falls back
//! to the built-in defaults when the file is missing or malformed.

use std::path::Path;

use windlass_types::config::OrchestratorConfig;

/// Load orchestrator configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`OrchestratorConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the
///   default.
/// - Otherwise returns the parsed config (partial files keep defaults for
///   omitted sections).
pub async fn load_config(data_dir: &Path) -> OrchestratorConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                "No config.toml found at {}, using defaults",
                config_path.display()
            );
            return OrchestratorConfig::default();
        }
        Err(err) => {
            tracing::warn!(
                "Failed to read {}: {err}, using defaults",
                config_path.display()
            );
            return OrchestratorConfig::default();
        }
    };

    match toml::from_str::<OrchestratorConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            OrchestratorConfig::default()
        }
    }
}
