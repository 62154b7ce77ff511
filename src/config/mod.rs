// Configuration management module
// TOML settings plus a human-readable dump of the effective configuration

pub mod display;
pub mod settings;

pub use display::show_config;
pub use settings::{
    Config, ConfigError, EmbeddingConfig, EmbeddingProvider, GenerationConfig, OllamaConfig,
    RerankerConfig, RerankerProvider, RetrievalConfig, StorageConfig,
};

/// Resolve the base directory: an explicit override wins, otherwise the platform data dir
#[inline]
pub fn resolve_base_dir(
    override_dir: Option<std::path::PathBuf>,
) -> Result<std::path::PathBuf, ConfigError> {
    match override_dir {
        Some(dir) => Ok(dir),
        None => Config::default_base_dir(),
    }
}
