//! RQ Configuration Management
//!
//! Handles configuration from environment variables and TOML files with
//! sensible defaults for development. Credentials have no defaults and are
//! checked by [`AppConfig::validate`] before any client is built.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Pinecone vector database
    pub pinecone: PineconeConfig,

    /// LLM and embedding provider configuration
    pub llm: LlmConfig,

    /// RAG pipeline configuration
    pub rag: RagConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup, starting from defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_lookup(lookup)?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })?;
        // Unset models were filled with the OpenAI defaults
        config.llm.adopt_provider_defaults(LlmProvider::OpenAI);
        Ok(config)
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_lookup(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    /// Load from the TOML file named by `RQ_CONFIG` if set, then apply the environment
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var("RQ_CONFIG") {
            Ok(path) if !path.is_empty() => Self::from_file(path)?.with_env_override(),
            _ => Self::from_env(),
        }
    }

    /// Overwrite every field whose key is present in `lookup`
    fn apply_lookup<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(host) = lookup("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.server.port = parse_value("API_PORT", port)?;
        }
        // CORS origins (comma-separated)
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Pinecone
        if let Some(key) = lookup("PINECONE_API_KEY") {
            self.pinecone.api_key = key;
        }
        if let Some(env) = lookup("PINECONE_ENVIRONMENT") {
            self.pinecone.environment = env;
        }
        if let Some(index) = lookup("PINECONE_INDEX") {
            self.pinecone.index_name = index;
        }
        if let Some(namespace) = lookup("PINECONE_NAMESPACE") {
            self.pinecone.namespace = Some(namespace).filter(|s| !s.is_empty());
        }
        if let Some(text_key) = lookup("PINECONE_TEXT_KEY") {
            self.pinecone.text_key = text_key;
        }
        if let Some(url) = lookup("PINECONE_CONTROLLER_URL") {
            self.pinecone.controller_url = Some(url).filter(|s| !s.is_empty());
        }
        if let Some(host) = lookup("PINECONE_INDEX_HOST") {
            self.pinecone.index_host = Some(host).filter(|s| !s.is_empty());
        }

        // LLM
        if let Some(provider) = lookup("LLM_PROVIDER") {
            self.llm.set_provider(provider.parse()?);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.llm.openai_base_url = Some(url);
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.llm.ollama_url = url;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.llm.embedding_model = model;
        }
        if let Some(temperature) = lookup("LLM_TEMPERATURE") {
            self.llm.temperature = parse_value("LLM_TEMPERATURE", temperature)?;
        }
        if let Some(max_tokens) = lookup("LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_value("LLM_MAX_TOKENS", max_tokens)?;
        }
        if let Some(timeout) = lookup("LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_value("LLM_TIMEOUT_SECS", timeout)?;
        }

        // RAG
        if let Some(top_k) = lookup("RAG_TOP_K") {
            self.rag.top_k = parse_value("RAG_TOP_K", top_k)?;
        }
        if let Some(mode) = lookup("RAG_RETRIEVAL_MODE") {
            self.rag.retrieval_mode = mode.parse()?;
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.json_format = match format.to_lowercase().as_str() {
                "json" => true,
                "pretty" | "text" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "LOG_FORMAT".to_string(),
                        value: format,
                    })
                }
            };
        }

        Ok(())
    }

    /// Check that everything needed to build the pipeline is present
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pinecone.api_key.trim().is_empty() {
            return Err(ConfigError::MissingRequired("PINECONE_API_KEY".to_string()));
        }
        // Both Pinecone hosts are derived from the environment unless overridden
        let hosts_overridden =
            self.pinecone.controller_url.is_some() && self.pinecone.index_host.is_some();
        if self.pinecone.environment.trim().is_empty() && !hosts_overridden {
            return Err(ConfigError::MissingRequired(
                "PINECONE_ENVIRONMENT".to_string(),
            ));
        }
        if self.pinecone.index_name.trim().is_empty() {
            return Err(ConfigError::MissingRequired("PINECONE_INDEX".to_string()));
        }
        if self.pinecone.text_key.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "PINECONE_TEXT_KEY".to_string(),
                value: String::new(),
            });
        }

        match self.llm.provider {
            LlmProvider::OpenAI | LlmProvider::Azure => {
                let has_key = self
                    .llm
                    .openai_api_key
                    .as_deref()
                    .is_some_and(|k| !k.trim().is_empty());
                if !has_key {
                    return Err(ConfigError::MissingRequired("OPENAI_API_KEY".to_string()));
                }
            }
            LlmProvider::Ollama => {}
        }

        if self.rag.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RAG_TOP_K".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: vec![],
        }
    }
}

/// Pinecone connection configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PineconeConfig {
    /// API key sent as `Api-Key`
    pub api_key: String,

    /// Environment, e.g. `us-west1-gcp`
    pub environment: String,

    /// Name of an existing index
    pub index_name: String,

    /// Optional namespace inside the index
    pub namespace: Option<String>,

    /// Metadata key that holds the chunk text
    pub text_key: String,

    /// Controller base URL; derived from the environment when unset
    pub controller_url: Option<String>,

    /// Data-plane base URL; derived from index, project and environment when unset
    pub index_host: Option<String>,
}

impl PineconeConfig {
    /// Controller base URL for this environment
    pub fn controller_base_url(&self) -> String {
        self.controller_url
            .clone()
            .unwrap_or_else(|| format!("https://controller.{}.pinecone.io", self.environment))
    }
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            environment: String::new(),
            index_name: String::new(),
            namespace: None,
            text_key: "text".to_string(),
            controller_url: None,
            index_host: None,
        }
    }
}

// Keeps the API key out of logs.
impl std::fmt::Debug for PineconeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PineconeConfig")
            .field("api_key", &redact(&self.api_key))
            .field("environment", &self.environment)
            .field("index_name", &self.index_name)
            .field("namespace", &self.namespace)
            .field("text_key", &self.text_key)
            .field("controller_url", &self.controller_url)
            .field("index_host", &self.index_host)
            .finish()
    }
}

/// LLM provider configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// LLM provider to use
    pub provider: LlmProvider,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// OpenAI API base URL (for Azure or compatible APIs)
    pub openai_base_url: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Model name to use
    pub model: String,

    /// Embedding model name
    pub embedding_model: String,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// OpenAI base URL, falling back to the public endpoint
    pub fn openai_base_url(&self) -> String {
        self.openai_base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
    }

    /// Switch provider, moving models that are still at the old provider's defaults
    pub fn set_provider(&mut self, provider: LlmProvider) {
        let previous = self.provider;
        self.provider = provider;
        self.adopt_provider_defaults(previous);
    }

    fn adopt_provider_defaults(&mut self, previous: LlmProvider) {
        if self.model == previous.default_model() {
            self.model = self.provider.default_model().to_string();
        }
        if self.embedding_model == previous.default_embedding_model() {
            self.embedding_model = self.provider.default_embedding_model().to_string();
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            openai_api_key: None,
            openai_base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: LlmProvider::OpenAI.default_model().to_string(),
            embedding_model: LlmProvider::OpenAI.default_embedding_model().to_string(),
            max_tokens: 256,
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("openai_api_key", &self.openai_api_key.as_deref().map(redact))
            .field("openai_base_url", &self.openai_base_url)
            .field("ollama_url", &self.ollama_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    Ollama,
    Azure,
}

impl LlmProvider {
    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAI | Self::Azure => "gpt-3.5-turbo",
            Self::Ollama => "llama2",
        }
    }

    pub fn default_embedding_model(self) -> &'static str {
        match self {
            Self::OpenAI | Self::Azure => "text-embedding-ada-002",
            Self::Ollama => "nomic-embed-text",
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "azure" => Ok(Self::Azure),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Where the generator's context documents come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// The QA chain runs its own search with the rendered prompt
    #[default]
    Independent,
    /// The documents retrieved for the raw question are reused as context
    Shared,
}

impl std::str::FromStr for RetrievalMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "independent" => Ok(Self::Independent),
            "shared" => Ok(Self::Shared),
            _ => Err(ConfigError::InvalidValue {
                key: "RAG_RETRIEVAL_MODE".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// RAG pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Number of documents retrieved per query
    pub top_k: usize,

    /// Source of the generator's context documents
    pub retrieval_mode: RetrievalMode,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 2,
            retrieval_mode: RetrievalMode::Independent,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn complete_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("PINECONE_API_KEY", "pc-key"),
            ("PINECONE_ENVIRONMENT", "us-west1-gcp"),
            ("PINECONE_INDEX", "resumes"),
            ("OPENAI_API_KEY", "sk-test"),
        ]
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.rag.top_k, 2);
        assert_eq!(config.rag.retrieval_mode, RetrievalMode::Independent);
        assert_eq!(config.pinecone.text_key, "text");
    }

    #[test]
    fn test_complete_env_validates() {
        let config = AppConfig::from_lookup(lookup_from(&complete_env())).unwrap();
        assert_eq!(config.pinecone.index_name, "resumes");
        assert_eq!(
            config.pinecone.controller_base_url(),
            "https://controller.us-west1-gcp.pinecone.io"
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_each_pinecone_key_is_required() {
        for missing in ["PINECONE_API_KEY", "PINECONE_ENVIRONMENT", "PINECONE_INDEX"] {
            let env: Vec<_> = complete_env()
                .into_iter()
                .filter(|(k, _)| *k != missing)
                .collect();
            let config = AppConfig::from_lookup(lookup_from(&env)).unwrap();
            match config.validate() {
                Err(ConfigError::MissingRequired(key)) => assert_eq!(key, missing),
                other => panic!("expected missing {missing}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_openai_key_not_required_for_ollama() {
        let mut env: Vec<_> = complete_env()
            .into_iter()
            .filter(|(k, _)| *k != "OPENAI_API_KEY")
            .collect();
        let config = AppConfig::from_lookup(lookup_from(&env)).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(ref k)) if k == "OPENAI_API_KEY"
        ));

        env.push(("LLM_PROVIDER", "ollama"));
        let config = AppConfig::from_lookup(lookup_from(&env)).unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_ollama_uses_its_own_default_models() {
        let config = AppConfig::from_lookup(lookup_from(&[("LLM_PROVIDER", "ollama")])).unwrap();
        assert_eq!(config.llm.model, "llama2");
        assert_eq!(config.llm.embedding_model, "nomic-embed-text");

        let config = AppConfig::from_lookup(lookup_from(&[
            ("LLM_PROVIDER", "ollama"),
            ("LLM_MODEL", "mistral"),
        ]))
        .unwrap();
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.llm.embedding_model, "nomic-embed-text");

        let mut llm = LlmConfig {
            model: "gpt-4".to_string(),
            ..Default::default()
        };
        llm.set_provider(LlmProvider::Ollama);
        assert_eq!(llm.model, "gpt-4");
        llm.set_provider(LlmProvider::OpenAI);
        assert_eq!(llm.embedding_model, "text-embedding-ada-002");
    }

    #[test]
    fn test_environment_required_unless_both_hosts_set() {
        let mut env: Vec<_> = complete_env()
            .into_iter()
            .filter(|(k, _)| *k != "PINECONE_ENVIRONMENT")
            .collect();
        env.push(("PINECONE_CONTROLLER_URL", "http://127.0.0.1:9000"));
        let config = AppConfig::from_lookup(lookup_from(&env)).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(ref k)) if k == "PINECONE_ENVIRONMENT"
        ));

        env.push(("PINECONE_INDEX_HOST", "http://127.0.0.1:9001"));
        let config = AppConfig::from_lookup(lookup_from(&env)).unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_values() {
        assert!(AppConfig::from_lookup(lookup_from(&[("API_PORT", "http")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[("RAG_TOP_K", "-1")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[("LOG_FORMAT", "xml")])).is_err());
        assert!(
            AppConfig::from_lookup(lookup_from(&[("RAG_RETRIEVAL_MODE", "both")])).is_err()
        );

        let mut env = complete_env();
        env.push(("RAG_TOP_K", "0"));
        let config = AppConfig::from_lookup(lookup_from(&env)).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_optional_overrides() {
        let mut env = complete_env();
        env.extend([
            ("RAG_RETRIEVAL_MODE", "shared"),
            ("PINECONE_NAMESPACE", "2024"),
            ("PINECONE_CONTROLLER_URL", "http://127.0.0.1:9000"),
            ("CORS_ORIGINS", "http://a.test, ,http://b.test"),
            ("LOG_FORMAT", "json"),
        ]);
        let config = AppConfig::from_lookup(lookup_from(&env)).unwrap();
        assert_eq!(config.rag.retrieval_mode, RetrievalMode::Shared);
        assert_eq!(config.pinecone.namespace.as_deref(), Some("2024"));
        assert_eq!(config.pinecone.controller_base_url(), "http://127.0.0.1:9000");
        assert_eq!(config.server.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_llm_provider_parse() {
        assert_eq!(
            "openai".parse::<LlmProvider>().unwrap(),
            LlmProvider::OpenAI
        );
        assert_eq!(
            "Ollama".parse::<LlmProvider>().unwrap(),
            LlmProvider::Ollama
        );
        assert!("invalid".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AppConfig::from_lookup(lookup_from(&complete_env())).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("pc-key"));
        assert!(!debug.contains("sk-test"));
        assert!(debug.contains("resumes"));
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("rq-config-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[pinecone]
api_key = "file-key"
environment = "eu-west1-gcp"
index_name = "cv"

[llm]
provider = "ollama"
embedding_model = "all-minilm"

[rag]
top_k = 4
retrieval_mode = "shared"
"#
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.pinecone.index_name, "cv");
        assert_eq!(config.pinecone.text_key, "text");
        assert_eq!(config.rag.top_k, 4);
        assert_eq!(config.rag.retrieval_mode, RetrievalMode::Shared);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.llm.model, "llama2");
        assert_eq!(config.llm.embedding_model, "all-minilm");
    }

    #[test]
    fn test_from_file_missing() {
        assert!(matches!(
            AppConfig::from_file("/nonexistent/rq.toml"),
            Err(ConfigError::FileReadError { .. })
        ));
    }
}
