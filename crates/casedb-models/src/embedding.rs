use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use casedb_core::traits::Embedder;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::{encode_batch, load_tokenizer};

/// XLM-RoBERTa sentence encoder (BGE-M3 layout): masked mean pooling + L2.
pub struct EmbeddingModel {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    id: String,
    dim: usize,
    max_len: usize,
    batch_size: usize,
}

impl EmbeddingModel {
    pub fn load(model_dir: &Path, max_len: usize, batch_size: usize) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading embedding model");
        let tokenizer = load_tokenizer(&model_dir.join("tokenizer.json"), max_len)?;
        let (config, raw_config) = read_config::<XLMRobertaConfig>(model_dir)?;
        let dim = raw_config
            .get("hidden_size")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| anyhow!("config.json has no hidden_size"))? as usize;
        let vb = load_weights(model_dir, &device)?;
        let model = XLMRobertaModel::new(&config, vb)?;
        let name = model_dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| "xlm-roberta".into());
        info!(model = %name, dim, "embedding model loaded");
        Ok(Self { model, tokenizer, device, id: format!("{name}:d{dim}"), dim, max_len, batch_size: batch_size.max(1) })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let enc = encode_batch(&self.tokenizer, inputs, self.max_len, &self.device)?;
        let hidden = self.model.forward(&enc.input_ids, &enc.attention_mask, &enc.token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &enc.attention_mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?;
        debug!(batch = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(rows)
    }
}

impl Embedder for EmbeddingModel {
    fn model_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(self.embed_chunk(batch)?);
        }
        Ok(out)
    }
}

/// Parse `config.json` both into the model's typed config and as raw JSON for
/// fields the typed config does not carry (`id2label`, `hidden_size`).
pub(crate) fn read_config<C: serde::de::DeserializeOwned>(model_dir: &Path) -> Result<(C, serde_json::Value)> {
    let config_path = model_dir.join("config.json");
    let text = std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?;
    let raw: serde_json::Value = serde_json::from_str(&text)?;
    let config: C = serde_json::from_value(raw.clone())?;
    Ok((config, raw))
}

/// Load `model.safetensors` when present, otherwise `pytorch_model.bin`.
pub(crate) fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    let weights: HashMap<String, Tensor> = if safetensors.exists() {
        candle_core::safetensors::load(&safetensors, device)?
    } else {
        let bin = model_dir.join("pytorch_model.bin");
        candle_core::pickle::read_all(&bin)
            .with_context(|| format!("reading {}", bin.display()))?
            .into_iter()
            .collect()
    };
    Ok(VarBuilder::from_tensors(weights, DType::F32, device))
}
