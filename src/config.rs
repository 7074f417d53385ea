use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Default description attached to the store tool.
pub const DEFAULT_TOOL_STORE_DESCRIPTION: &str =
    "Keep the memory for later use, when you are asked to remember something.";

/// Default description attached to the find tool.
pub const DEFAULT_TOOL_FIND_DESCRIPTION: &str = "Look up memories in the vector database. Use this tool when you need to: \n - Find memories by their content \n - Access memories for further analysis \n - Get some personal information about the user \n";

const DEFAULT_SEARCH_LIMIT: usize = 10;
const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
const DEFAULT_EMBEDDING_DIMENSION: usize = 768;
const DEFAULT_FASTEMBED_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
const DEFAULT_FASTEMBED_DIMENSION: usize = 384;
/// Qdrant target used when neither `QDRANT_URL` nor `QDRANT_LOCAL_PATH` is set.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";
/// `QDRANT_URL` value selecting the in-process store.
pub const QDRANT_IN_MEMORY: &str = ":memory:";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the server, built once at startup and passed into constructors.
#[derive(Debug, Clone)]
pub struct Config {
    /// Vector database family backing the connector.
    pub provider: VectorDbProvider,
    /// Default collection (or index) used when callers do not name one.
    pub collection_name: Option<String>,
    /// Connection settings for Qdrant, remote or local.
    pub qdrant: QdrantSettings,
    /// Connection settings for OpenSearch.
    pub opensearch: OpenSearchSettings,
    /// Tool registration settings.
    pub tools: ToolSettings,
    /// Embedding provider selection.
    pub embedding: EmbeddingSettings,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Optional file receiving a copy of the log stream.
    pub log_file: Option<PathBuf>,
}

/// Supported vector database families.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VectorDbProvider {
    /// Qdrant over REST, or the local on-disk store when no URL is set.
    Qdrant,
    /// OpenSearch (or Amazon OpenSearch Serverless) k-NN indexes.
    OpenSearch,
}

/// Qdrant connection target.
#[derive(Debug, Clone, Default)]
pub struct QdrantSettings {
    /// Base URL of a remote Qdrant instance, or `:memory:` for the in-process store.
    pub url: Option<String>,
    /// Optional API key sent with each request.
    pub api_key: Option<String>,
    /// Directory for the local store when no URL is configured.
    pub local_path: Option<PathBuf>,
}

/// OpenSearch connection target.
#[derive(Debug, Clone, Default)]
pub struct OpenSearchSettings {
    /// Base URL of the OpenSearch endpoint.
    pub url: Option<String>,
    /// Optional basic-auth user.
    pub username: Option<String>,
    /// Optional basic-auth password.
    pub password: Option<String>,
}

/// Settings controlling how the MCP tools are exposed.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    /// Default number of entries returned by the find tool.
    pub search_limit: usize,
    /// Hide the store tool when set.
    pub read_only: bool,
    /// Description attached to the store tool.
    pub store_description: String,
    /// Description attached to the find tool.
    pub find_description: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            search_limit: DEFAULT_SEARCH_LIMIT,
            read_only: false,
            store_description: DEFAULT_TOOL_STORE_DESCRIPTION.to_string(),
            find_description: DEFAULT_TOOL_FIND_DESCRIPTION.to_string(),
        }
    }
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProviderKind {
    /// ONNX models run in-process through `fastembed` (requires the `fastembed` feature).
    FastEmbed,
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI embeddings API (or any compatible endpoint).
    OpenAI,
    /// Deterministic offline encoder.
    Hash,
}

impl EmbeddingProviderKind {
    /// Lowercase label used in logs and derived vector names.
    pub fn label(self) -> &'static str {
        match self {
            Self::FastEmbed => "fastembed",
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
            Self::Hash => "hash",
        }
    }

    /// Prefix of derived vector names; FastEmbed vectors are named `fast-<model>`.
    pub fn vector_prefix(self) -> &'static str {
        match self {
            Self::FastEmbed => "fast",
            other => other.label(),
        }
    }

    /// Provider used when `EMBEDDING_PROVIDER` is unset: FastEmbed when compiled in.
    pub fn default_kind() -> Self {
        if cfg!(feature = "fastembed") {
            Self::FastEmbed
        } else {
            Self::Hash
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Self::FastEmbed => DEFAULT_FASTEMBED_MODEL,
            _ => DEFAULT_EMBEDDING_MODEL,
        }
    }

    fn default_dimension(self) -> usize {
        match self {
            Self::FastEmbed => DEFAULT_FASTEMBED_DIMENSION,
            _ => DEFAULT_EMBEDDING_DIMENSION,
        }
    }
}

/// Embedding provider selection and connection details.
#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    /// Which provider implementation to construct.
    pub provider: EmbeddingProviderKind,
    /// Model identifier passed to the provider.
    pub model: String,
    /// Dimensionality of the produced vectors.
    pub dimension: usize,
    /// Explicit named-vector override; derived from provider and model when absent.
    pub vector_name: Option<String>,
    /// Base URL of the Ollama runtime.
    pub ollama_url: String,
    /// API key for the OpenAI provider.
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        let provider = EmbeddingProviderKind::default_kind();
        Self {
            provider,
            model: provider.default_model().to_string(),
            dimension: provider.default_dimension(),
            vector_name: None,
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment (and `.env`, when present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| env::var(key).ok())?;
        tracing::debug!(
            provider = ?config.provider,
            collection = ?config.collection_name,
            qdrant_url = ?config.qdrant.url,
            has_qdrant_api_key = config.qdrant.api_key.is_some(),
            opensearch_url = ?config.opensearch.url,
            embedding_provider = config.embedding.provider.label(),
            embedding_model = %config.embedding.model,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Build configuration from an arbitrary key lookup, validating along the way.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |keys: &[&str]| load_optional(&lookup, keys);

        let provider = match get(&["VECTORDB_PROVIDER"]) {
            Some(value) => value
                .parse()
                .map_err(|()| ConfigError::InvalidValue("VECTORDB_PROVIDER".into()))?,
            None => VectorDbProvider::Qdrant,
        };

        let opensearch = OpenSearchSettings {
            url: get(&["OPENSEARCH_URL", "AOSS_HOST_URL"]),
            username: get(&["OPENSEARCH_USERNAME"]),
            password: get(&["OPENSEARCH_PASSWORD"]),
        };
        if provider == VectorDbProvider::OpenSearch && opensearch.url.is_none() {
            return Err(ConfigError::MissingVariable("OPENSEARCH_URL".into()));
        }

        let mut collection_name = get(&["COLLECTION_NAME"]);
        if collection_name.is_none() && provider == VectorDbProvider::OpenSearch {
            collection_name = get(&["OPENSEARCH_INDEX", "AOSS_INDEX_NAME"]);
        }

        let qdrant = QdrantSettings {
            url: get(&["QDRANT_URL"]),
            api_key: get(&["QDRANT_API_KEY"]),
            local_path: get(&["QDRANT_LOCAL_PATH"]).map(PathBuf::from),
        };

        let search_limit = parse_optional(&lookup, &["SEARCH_LIMIT", "QDRANT_SEARCH_LIMIT"])?
            .unwrap_or(DEFAULT_SEARCH_LIMIT);
        if search_limit == 0 {
            return Err(ConfigError::InvalidValue("SEARCH_LIMIT".into()));
        }
        let read_only = match get(&["READ_ONLY", "QDRANT_READ_ONLY"]) {
            Some(value) => {
                parse_bool(&value).ok_or_else(|| ConfigError::InvalidValue("READ_ONLY".into()))?
            }
            None => false,
        };
        let tools = ToolSettings {
            search_limit,
            read_only,
            store_description: get(&["TOOL_STORE_DESCRIPTION"])
                .unwrap_or_else(|| DEFAULT_TOOL_STORE_DESCRIPTION.to_string()),
            find_description: get(&["TOOL_FIND_DESCRIPTION"])
                .unwrap_or_else(|| DEFAULT_TOOL_FIND_DESCRIPTION.to_string()),
        };

        let embedding_provider = match get(&["EMBEDDING_PROVIDER"]) {
            Some(value) => value
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".into()))?,
            None => EmbeddingProviderKind::default_kind(),
        };
        let dimension = parse_optional(&lookup, &["EMBEDDING_DIMENSION"])?
            .unwrap_or_else(|| embedding_provider.default_dimension());
        if dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        let embedding = EmbeddingSettings {
            provider: embedding_provider,
            model: get(&["EMBEDDING_MODEL"])
                .unwrap_or_else(|| embedding_provider.default_model().into()),
            dimension,
            vector_name: get(&["EMBEDDING_VECTOR_NAME"]),
            ollama_url: get(&["OLLAMA_URL"]).unwrap_or_else(|| DEFAULT_OLLAMA_URL.into()),
            openai_api_key: get(&["OPENAI_API_KEY"]),
            openai_base_url: get(&["OPENAI_BASE_URL"])
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.into()),
        };
        if embedding.provider == EmbeddingProviderKind::OpenAI && embedding.openai_api_key.is_none()
        {
            return Err(ConfigError::MissingVariable("OPENAI_API_KEY".into()));
        }

        Ok(Self {
            provider,
            collection_name,
            qdrant,
            opensearch,
            tools,
            embedding,
            server_port: parse_optional(&lookup, &["SERVER_PORT"])?,
            log_file: get(&["VECTORDB_MCP_LOG_FILE"]).map(PathBuf::from),
        })
    }

    /// Prefix applied to tool names, mirroring the backend family.
    pub fn tool_prefix(&self) -> &'static str {
        match self.provider {
            VectorDbProvider::Qdrant => "qdrant",
            VectorDbProvider::OpenSearch => "opensearch",
        }
    }
}

fn load_optional<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .filter_map(|key| lookup(*key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn parse_optional<F, T>(lookup: &F, keys: &[&str]) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    load_optional(lookup, keys)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(keys[0].to_string()))
        })
        .transpose()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl std::str::FromStr for VectorDbProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "qdrant" => Ok(Self::Qdrant),
            "opensearch" | "aoss" => Ok(Self::OpenSearch),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for EmbeddingProviderKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fastembed" => Ok(Self::FastEmbed),
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}
