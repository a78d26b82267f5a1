//! Service configuration, loaded from an optional TOML file.

use anyhow::{ensure, Context};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Directory holding the persisted session.
    pub index_dir: PathBuf,
    /// Where uploads are staged before ingestion.
    pub upload_dir: PathBuf,
    /// Results returned by `/query` when the request omits `top_k`.
    pub default_top_k: usize,
    /// Reload the persisted session on `serve` instead of starting empty.
    pub restore_on_start: bool,
    /// Keep staged uploads after they were ingested successfully.
    pub keep_uploads: bool,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            index_dir: PathBuf::from("index/session_index"),
            upload_dir: PathBuf::from("data/pdfs"),
            default_top_k: 3,
            restore_on_start: false,
            keep_uploads: false,
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 350,
            chunk_overlap: 100,
            separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                ".".to_string(),
                " ".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { dimension: 384 }
    }
}

impl ServiceConfig {
    /// Load from `path`, or fall back to defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                Self::from_toml(&raw).with_context(|| format!("parsing config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.default_top_k > 0, "default_top_k must be positive");
        ensure!(self.chunking.chunk_size > 0, "chunking.chunk_size must be positive");
        ensure!(
            self.chunking.chunk_overlap < self.chunking.chunk_size,
            "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
            self.chunking.chunk_overlap,
            self.chunking.chunk_size
        );
        ensure!(self.embedding.dimension > 0, "embedding.dimension must be positive");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::load(None).unwrap();
        assert_eq!(config.index_dir, PathBuf::from("index/session_index"));
        assert_eq!(config.default_top_k, 3);
        assert_eq!(config.chunking.chunk_size, 350);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.embedding.dimension, 384);
    }

    #[test]
    fn test_partial_toml() {
        let config = ServiceConfig::from_toml(
            r#"
            bind_addr = "127.0.0.1:9000"
            keep_uploads = true

            [chunking]
            chunk_size = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert!(config.keep_uploads);
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.chunking.separators.len(), 4);
    }

    #[test]
    fn test_invalid_overlap() {
        let config = ServiceConfig::from_toml("[chunking]\nchunk_size = 50\nchunk_overlap = 50").unwrap();
        assert!(config.validate().is_err());
    }
}
