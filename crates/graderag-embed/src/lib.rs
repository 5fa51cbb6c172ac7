//! Sentence embedders behind [`graderag_core::traits::Embedder`].
//!
//! [`XlmRobertaEmbedder`] runs an XLM-RoBERTa family encoder (e5, bge-m3)
//! locally with candle. [`HashEmbedder`] is a deterministic stand-in used by
//! tests and selected with `APP_USE_FAKE_EMBEDDINGS=1`.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use graderag_core::config::EmbeddingSettings;
use graderag_core::traits::Embedder;

mod device;
mod pool;
mod tokenize;

pub use device::select_device;
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_on_device;

/// Default embedding width of the multilingual large encoders.
pub const DEFAULT_DIM: usize = 1024;
const DEFAULT_MAX_LEN: usize = 512;

pub struct XlmRobertaEmbedder {
    id: String,
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
}

impl XlmRobertaEmbedder {
    /// Loads `tokenizer.json`, `config.json` and `pytorch_model.bin` from `model_dir`.
    pub fn load(id: &str, model_dir: &Path) -> Result<Self> {
        let device = select_device();
        info!("Loading embedding model {} from {}", id, model_dir.display());

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e)
        })?;

        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: XLMRobertaConfig = serde_json::from_str(&raw_config)?;
        let shape: serde_json::Value = serde_json::from_str(&raw_config)?;
        let dim = shape["hidden_size"].as_u64().map_or(DEFAULT_DIM, |d| d as usize);
        let max_len = shape["max_position_embeddings"]
            .as_u64()
            // two positions are reserved for the padding offset
            .map_or(DEFAULT_MAX_LEN, |p| (p as usize).saturating_sub(2).min(DEFAULT_MAX_LEN));

        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)
            .with_context(|| format!("reading weights {}", weights_path.display()))?;
        let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        info!(dim, max_len, "Embedding model loaded");

        Ok(Self { id: id.to_string(), model, tokenizer, device, dim, max_len })
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let (input_ids, attention_mask) =
            tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = Tensor::zeros((1, self.max_len), DType::I64, &self.device)?;
        let hidden_states =
            self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden_states, &attention_mask)?;
        let emb: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        if emb.len() != self.dim {
            return Err(anyhow!("model produced {} dims, expected {}", emb.len(), self.dim));
        }
        Ok(emb)
    }
}

impl Embedder for XlmRobertaEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let out = texts.iter().map(|t| self.embed_one(t)).collect::<Result<Vec<_>>>()?;
        let elapsed = start.elapsed();
        debug!("Embedded {} texts in {:?}", texts.len(), elapsed);
        if !texts.is_empty() && elapsed.as_millis() / texts.len() as u128 > 1000 {
            warn!("Slow embedding: {:?} per text", elapsed / texts.len() as u32);
        }
        Ok(out)
    }
}

/// Feature-hashing embedder: each whitespace token lands in a bucket chosen
/// by its xxhash. Identical text gives identical vectors and shared tokens
/// give positive cosine similarity.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIM)
    }
}

impl Embedder for HashEmbedder {
    fn embedder_id(&self) -> &str {
        "hash-embedder"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        usize::MAX
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;

        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0f32; self.dim];
                for (i, token) in text.split_whitespace().enumerate() {
                    let mut hasher = XxHash64::with_seed(0);
                    token.to_lowercase().hash(&mut hasher);
                    let h = hasher.finish();
                    let idx = (h as usize) % self.dim;
                    let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
                    v[idx] += 0.5 + val + (i as f32 % 3.0) * 0.01;
                }
                let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
                for x in &mut v {
                    *x /= norm;
                }
                v
            })
            .collect())
    }
}

fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// The configured model, or a [`HashEmbedder`] when `APP_USE_FAKE_EMBEDDINGS` is set.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    if use_fake_embeddings() {
        info!("Using HashEmbedder (APP_USE_FAKE_EMBEDDINGS)");
        return Ok(Box::new(HashEmbedder::default()));
    }
    let model_dir = resolve_model_dir(&settings.name)?;
    Ok(Box::new(XlmRobertaEmbedder::load(&settings.name, &model_dir)?))
}

/// `APP_MODEL_DIR`, then `MODEL_DIR`, then `models/<name>` and
/// `models/<last path segment of name>` relative to the working directory.
pub fn resolve_model_dir(model_name: &str) -> Result<PathBuf> {
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() {
                info!("Using {}: {}", var, p.display());
                return Ok(p);
            }
            warn!("{} points at missing directory {}", var, p.display());
        }
    }
    let short = model_name.rsplit('/').next().unwrap_or(model_name);
    for candidate in [Path::new("models").join(model_name), Path::new("models").join(short)] {
        if candidate.exists() {
            info!("Using model dir: {}", candidate.display());
            return Ok(candidate);
        }
    }
    Err(anyhow!("Could not locate model directory for '{}' (set APP_MODEL_DIR)", model_name))
}
