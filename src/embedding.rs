//! Embedding Provider
//!
//! Turns free text into fixed-dimension vectors using a local, in-process
//! fastembed model. The provider object is constructed once by the
//! application and injected wherever embeddings are needed; the model itself
//! is loaded lazily on the first embed call and at most once even under
//! concurrent first calls (the slot mutex is held across initialization).

use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::registry::lock;
use crate::{Error, Result};

/// Model identifier used when no backend selector is configured
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

pub struct EmbeddingProvider {
    model_name: EmbeddingModel,
    model: Mutex<Option<TextEmbedding>>,
}

impl EmbeddingProvider {
    /// Create a provider; `provider` selects the backend ("local" only)
    pub fn new(provider: &str, model: &str) -> Result<Self> {
        if provider != "local" {
            return Err(Error::EmbeddingProvider(format!("unknown provider '{}'", provider)));
        }

        let model_name = match model {
            "all-MiniLM-L6-v2" => EmbeddingModel::AllMiniLML6V2,
            "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
            other => {
                return Err(Error::EmbeddingProvider(format!(
                    "unknown embedding model '{}'",
                    other
                )))
            }
        };

        Ok(Self { model_name, model: Mutex::new(None) })
    }

    /// Local provider with the default model
    pub fn local() -> Result<Self> {
        Self::new("local", DEFAULT_MODEL)
    }

    /// Embed a batch of texts, one vector per input text, order preserved
    pub fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut slot = lock(&self.model);
        if slot.is_none() {
            tracing::info!("Loading embedding model {:?}", self.model_name);
            let mut options = InitOptions::default();
            options.model_name = self.model_name.clone();
            options.show_download_progress = false;

            let model = TextEmbedding::try_new(options).map_err(|e| {
                Error::EmbeddingProvider(format!("Failed to load embedding model: {}", e))
            })?;
            *slot = Some(model);
        }
        let model = slot.as_ref().expect("embedding model initialized above");

        model
            .embed(texts.to_vec(), None)
            .map_err(|e| Error::EmbeddingProvider(format!("Embedding generation failed: {}", e)))
    }

    /// Embed a single query text
    pub fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed(&[text.to_string()])?;
        if embeddings.is_empty() {
            return Err(Error::EmbeddingProvider("model returned no embedding".to_string()));
        }
        Ok(embeddings.remove(0))
    }
}
