use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration file (`asof.toml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AsofConfig {
    pub connection: ConnectParams,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

/// Connection parameters for one named connection
///
/// Typed and validated: unrecognized keys in the config file are rejected
/// rather than silently ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectParams {
    /// Backend driver name (currently only "sqlite")
    #[serde(default = "default_backend")]
    pub backend: String,

    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,

    /// Database name; for sqlite, a file path or ":memory:"
    pub database: String,

    /// Register server-side vector distance functions on the connection
    #[serde(default)]
    pub vector_functions: bool,
}

impl ConnectParams {
    /// Parameters for a sqlite database file
    pub fn sqlite(database: &str) -> Self {
        Self {
            backend: default_backend(),
            host: None,
            port: None,
            user: None,
            password: None,
            database: database.to_string(),
            vector_functions: false,
        }
    }

    /// Parameters for an in-memory sqlite database
    pub fn in_memory() -> Self {
        Self::sqlite(":memory:")
    }

    pub fn with_vector_functions(mut self, enabled: bool) -> Self {
        self.vector_functions = enabled;
        self
    }
}

/// Process-wide embedding backend selector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { provider: default_provider(), model: default_model() }
    }
}

fn default_backend() -> String {
    "sqlite".to_string()
}

fn default_provider() -> String {
    "local".to_string()
}

fn default_model() -> String {
    crate::embedding::DEFAULT_MODEL.to_string()
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("asof.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<AsofConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: AsofConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &AsofConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}
