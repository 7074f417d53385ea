use super::{EmbeddingError, EmbeddingProvider, validate_embeddings};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;

/// Embedding provider running an ONNX sentence-transformer in-process via `fastembed`.
///
/// The model is fetched into the fastembed cache on first use. Inference is CPU-bound, so every
/// batch runs on the blocking thread pool.
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    vector_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    /// Load `model_name` and check that it produces `dimension`-sized vectors.
    pub fn new(
        model_name: &str,
        vector_name: String,
        dimension: usize,
    ) -> Result<Self, EmbeddingError> {
        let (model, model_dimension) = resolve_model(model_name)?;
        if model_dimension != dimension {
            return Err(EmbeddingError::InvalidSettings(format!(
                "model `{model_name}` produces {model_dimension}-dimensional vectors, \
                 but EMBEDDING_DIMENSION is {dimension}"
            )));
        }

        tracing::info!(model = model_name, dimension, "Loading FastEmbed model");
        let embedding =
            TextEmbedding::try_new(InitOptions::new(model).with_show_download_progress(false))
                .map_err(|err| {
                    EmbeddingError::InvalidSettings(format!(
                        "failed to load FastEmbed model `{model_name}`: {err}"
                    ))
                })?;

        Ok(Self {
            model: Arc::new(embedding),
            model_name: model_name.to_string(),
            vector_name,
            dimension,
        })
    }
}

/// Find a supported model by its code, ignoring the publisher and an `-onnx` suffix.
///
/// `sentence-transformers/all-MiniLM-L6-v2` and `Qdrant/all-MiniLM-L6-v2-onnx` name the same
/// weights.
fn resolve_model(name: &str) -> Result<(EmbeddingModel, usize), EmbeddingError> {
    let supported = TextEmbedding::list_supported_models();
    let wanted = model_key(name);
    supported
        .iter()
        .find(|info| info.model_code.eq_ignore_ascii_case(name))
        .or_else(|| {
            supported
                .iter()
                .find(|info| model_key(&info.model_code) == wanted)
        })
        .map(|info| (info.model.clone(), info.dim))
        .ok_or_else(|| {
            EmbeddingError::InvalidSettings(format!("unsupported FastEmbed model `{name}`"))
        })
}

fn model_key(code: &str) -> String {
    let tail = code.rsplit('/').next().unwrap_or(code).to_lowercase();
    tail.strip_suffix("-onnx").map(str::to_string).unwrap_or(tail)
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let expected = texts.len();
        let model = Arc::clone(&self.model);
        let vectors = tokio::task::spawn_blocking(move || model.embed(texts, None))
            .await
            .map_err(|err| EmbeddingError::Local(format!("embedding task failed: {err}")))?
            .map_err(|err| {
                tracing::error!(model = %self.model_name, error = %err, "FastEmbed inference failed");
                EmbeddingError::Local(err.to_string())
            })?;

        validate_embeddings(expected, self.dimension, vectors)
    }

    fn vector_name(&self) -> &str {
        &self.vector_name
    }

    fn vector_size(&self) -> usize {
        self.dimension
    }
}
