// order-assistant/crates/order-assistant/src/config.rs

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::ingest::{ArtifactPaths, DEFAULT_BATCH_SIZE, DEFAULT_EMBEDDING_MODEL};
use crate::llm::ollama::DEFAULT_OLLAMA_HOST;
use crate::llm::DEFAULT_TEMPERATURE;

/// Process settings, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub records_file: PathBuf,
    pub index_file: PathBuf,
    pub metadata_file: PathBuf,
    pub settings_file: PathBuf,
    pub ollama_host: String,
    pub embedding_model: String,
    pub embed_batch_size: usize,
    pub llm_timeout_seconds: u64,
    pub history_window_turns: Option<usize>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("Failed to load .env file: {}. Using system environment variables.", e);
        } else {
            info!("Loaded environment variables from .env file");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = PathBuf::from(lookup("DATA_DIR").unwrap_or_else(|| "./data".into()));
        let path_or = |key: &str, default: PathBuf| lookup(key).map(PathBuf::from).unwrap_or(default);

        let history_window_turns: Option<usize> = match lookup("HISTORY_WINDOW_TURNS") {
            Some(raw) if !raw.trim().is_empty() => Some(parse_value("HISTORY_WINDOW_TURNS", &raw)?),
            _ => None,
        };
        if history_window_turns == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "HISTORY_WINDOW_TURNS".to_string(),
                message: "must be at least 1 (leave unset for the full history)".to_string(),
            }
            .into());
        }

        let embed_batch_size: usize = parse_value(
            "EMBED_BATCH_SIZE",
            &lookup("EMBED_BATCH_SIZE").unwrap_or_else(|| DEFAULT_BATCH_SIZE.to_string()),
        )?;
        if embed_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "EMBED_BATCH_SIZE".to_string(),
                message: "must be at least 1".to_string(),
            }
            .into());
        }

        Ok(Self {
            records_file: path_or("RECORDS_FILE", data_dir.join("pedidos.json")),
            index_file: path_or("INDEX_FILE", data_dir.join("faiss_index.bin")),
            metadata_file: path_or("METADATA_FILE", data_dir.join("metadata.json")),
            settings_file: path_or("SETTINGS_FILE", PathBuf::from("./settings.toml")),
            ollama_host: lookup("OLLAMA_HOST").unwrap_or_else(|| DEFAULT_OLLAMA_HOST.into()),
            embedding_model: lookup("EMBEDDING_MODEL").unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.into()),
            embed_batch_size,
            llm_timeout_seconds: parse_value(
                "LLM_TIMEOUT_SECONDS",
                &lookup("LLM_TIMEOUT_SECONDS").unwrap_or_else(|| "120".into()),
            )?,
            history_window_turns,
            data_dir,
        })
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths::new(&self.index_file, &self.metadata_file)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_seconds)
    }

    pub fn print_config(&self) {
        info!("Current Configuration:");
        info!("- Records File: {}", self.records_file.display());
        info!("- Index File: {}", self.index_file.display());
        info!("- Metadata File: {}", self.metadata_file.display());
        info!("- Settings File: {}", self.settings_file.display());
        info!("- Ollama Host: {}", self.ollama_host);
        info!("- Embedding Model: {} (batch {})", self.embedding_model, self.embed_batch_size);
        info!("- LLM Timeout: {}s", self.llm_timeout_seconds);
        match self.history_window_turns {
            Some(turns) => info!("- History Window: {} turns", turns),
            None => info!("- History Window: unlimited"),
        }
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| {
        ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{:?}: {}", raw, e),
        }
        .into()
    })
}

/// Directives and sampling settings for the chat model. Read once, then
/// shared read-only by every session.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptConfiguration {
    pub model: String,
    pub temperature: f32,
    pub role_prompt: String,
    pub instruction_prompt: String,
}

#[derive(Debug, Deserialize)]
struct SettingsFile {
    general: Option<GeneralSection>,
    prompts: Option<PromptsSection>,
}

#[derive(Debug, Deserialize)]
struct GeneralSection {
    model: Option<String>,
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct PromptsSection {
    role_prompt: Option<String>,
    instruction_prompt: Option<String>,
}

impl PromptConfiguration {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let prompts = Self::from_toml_str(&raw)
            .with_context(|| format!("invalid prompt settings in {}", path.display()))?;
        info!("Loaded prompt settings from {} (model: {})", path.display(), prompts.model);
        Ok(prompts)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let settings: SettingsFile = toml::from_str(raw)?;
        let (model, temperature) = match settings.general {
            Some(general) => (general.model, general.temperature),
            None => (None, None),
        };
        let (role_prompt, instruction_prompt) = match settings.prompts {
            Some(prompts) => (prompts.role_prompt, prompts.instruction_prompt),
            None => (None, None),
        };

        let temperature = temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !temperature.is_finite() || temperature < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "general.temperature".to_string(),
                message: format!("{} is not a valid sampling temperature", temperature),
            });
        }

        Ok(Self {
            model: required(model, "general.model")?,
            temperature,
            role_prompt: required(role_prompt, "prompts.role_prompt")?,
            instruction_prompt: required(instruction_prompt, "prompts.instruction_prompt")?,
        })
    }
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingKey(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const SETTINGS: &str = r#"
        [general]
        model = "llama3.2"
        temperature = 0.3

        [prompts]
        role_prompt = "Eres el asistente de EcoMarket."
        instruction_prompt = "Responde solo con datos del pedido."
    "#;

    // ===== Runtime Configuration Tests =====

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.records_file, PathBuf::from("./data").join("pedidos.json"));
        assert_eq!(config.index_file, PathBuf::from("./data").join("faiss_index.bin"));
        assert_eq!(config.metadata_file, PathBuf::from("./data").join("metadata.json"));
        assert_eq!(config.ollama_host, DEFAULT_OLLAMA_HOST);
        assert_eq!(config.embedding_model, "all-minilm");
        assert_eq!(config.embed_batch_size, 64);
        assert_eq!(config.llm_timeout(), Duration::from_secs(120));
        assert_eq!(config.history_window_turns, None);
    }

    #[test]
    fn test_data_dir_moves_artifacts() {
        let config = config_from(&[("DATA_DIR", "/srv/pedidos")]).unwrap();
        let paths = config.artifact_paths();

        assert_eq!(paths.index, PathBuf::from("/srv/pedidos/faiss_index.bin"));
        assert_eq!(paths.metadata, PathBuf::from("/srv/pedidos/metadata.json"));
    }

    #[test]
    fn test_explicit_paths_win() {
        let config = config_from(&[("DATA_DIR", "/srv"), ("RECORDS_FILE", "/tmp/orders.json")]).unwrap();
        assert_eq!(config.records_file, PathBuf::from("/tmp/orders.json"));
    }

    #[test]
    fn test_history_window_parsed() {
        let config = config_from(&[("HISTORY_WINDOW_TURNS", "10")]).unwrap();
        assert_eq!(config.history_window_turns, Some(10));
    }

    #[test]
    fn test_invalid_numbers_are_errors() {
        assert!(config_from(&[("LLM_TIMEOUT_SECONDS", "soon")]).is_err());
        assert!(config_from(&[("EMBED_BATCH_SIZE", "0")]).is_err());
        assert!(config_from(&[("HISTORY_WINDOW_TURNS", "-2")]).is_err());
    }

    #[test]
    fn test_zero_history_window_is_rejected() {
        let err = config_from(&[("HISTORY_WINDOW_TURNS", "0")]).unwrap_err();
        assert!(err.to_string().contains("HISTORY_WINDOW_TURNS"));
    }

    // ===== Prompt Configuration Tests =====

    #[test]
    fn test_prompt_settings_parse() {
        let prompts = PromptConfiguration::from_toml_str(SETTINGS).unwrap();

        assert_eq!(prompts.model, "llama3.2");
        assert!((prompts.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(prompts.role_prompt, "Eres el asistente de EcoMarket.");
    }

    #[test]
    fn test_temperature_defaults() {
        let raw = SETTINGS.replace("temperature = 0.3", "");
        let prompts = PromptConfiguration::from_toml_str(&raw).unwrap();
        assert!((prompts.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_missing_required_keys() {
        let no_model = SETTINGS.replace("model = \"llama3.2\"", "");
        assert!(matches!(
            PromptConfiguration::from_toml_str(&no_model),
            Err(ConfigError::MissingKey("general.model"))
        ));

        let no_prompts = "[general]\nmodel = \"llama3.2\"\n";
        assert!(matches!(
            PromptConfiguration::from_toml_str(no_prompts),
            Err(ConfigError::MissingKey("prompts.role_prompt"))
        ));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            PromptConfiguration::from_toml_str("[general\nmodel ="),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, SETTINGS).unwrap();

        let prompts = PromptConfiguration::load(&path).unwrap();
        assert_eq!(prompts.instruction_prompt, "Responde solo con datos del pedido.");
        assert!(PromptConfiguration::load(&dir.path().join("missing.toml")).is_err());
    }
}
