use anyhow::{anyhow, bail, Result};
use std::path::Path;

use candle_core::{DType, Device};
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaForSequenceClassification};
use tokenizers::Tokenizer;
use tracing::info;

use casedb_core::traits::Classifier;
use casedb_core::types::NliProbs;

use crate::device::select_device;
use crate::embedding::{load_weights, read_config};
use crate::tokenize::{encode_batch, load_tokenizer};

/// Positions of the three NLI classes in the model's logits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelOrder {
    pub contradiction: usize,
    pub neutral: usize,
    pub entailment: usize,
}

impl Default for LabelOrder {
    /// MNLI convention.
    fn default() -> Self {
        Self { contradiction: 0, neutral: 1, entailment: 2 }
    }
}

impl LabelOrder {
    /// Read `id2label` from a HF `config.json`; falls back to the MNLI order
    /// when the mapping is absent.
    pub fn from_config(raw: &serde_json::Value) -> Result<Self> {
        let Some(map) = raw.get("id2label").and_then(|v| v.as_object()) else {
            return Ok(Self::default());
        };
        let (mut c, mut n, mut e) = (None, None, None);
        for (idx, label) in map {
            let idx: usize = idx.parse().map_err(|_| anyhow!("id2label key {idx:?} is not an index"))?;
            match label.as_str().unwrap_or_default().to_ascii_lowercase().as_str() {
                "contradiction" => c = Some(idx),
                "neutral" => n = Some(idx),
                "entailment" => e = Some(idx),
                other => bail!("unexpected NLI label {other:?}"),
            }
        }
        match (c, n, e) {
            (Some(contradiction), Some(neutral), Some(entailment)) => Ok(Self { contradiction, neutral, entailment }),
            _ => bail!("id2label must name contradiction, neutral and entailment"),
        }
    }

    fn pick(&self, logits: &[f32]) -> Result<[f32; 3]> {
        let get = |i: usize| logits.get(i).copied().ok_or_else(|| anyhow!("logit {i} missing"));
        Ok([get(self.contradiction)?, get(self.neutral)?, get(self.entailment)?])
    }
}

/// XLM-RoBERTa sequence-classification model fine-tuned on NLI.
pub struct NliModel {
    model: XLMRobertaForSequenceClassification,
    tokenizer: Tokenizer,
    /// Untruncated copy for counting tokens of long premises.
    counter: Tokenizer,
    labels: LabelOrder,
    device: Device,
    id: String,
    max_len: usize,
}

impl NliModel {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading NLI model");
        let tokenizer = load_tokenizer(&model_dir.join("tokenizer.json"), max_len)?;
        let counter = Tokenizer::from_file(model_dir.join("tokenizer.json"))
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;
        let (config, raw) = read_config::<XLMRobertaConfig>(model_dir)?;
        let labels = LabelOrder::from_config(&raw)?;
        let vb = load_weights(model_dir, &device)?;
        let model = XLMRobertaForSequenceClassification::new(3, &config, vb)?;
        let name = model_dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| "nli".into());
        Ok(Self { model, tokenizer, counter, labels, device, id: name, max_len })
    }
}

impl Classifier for NliModel {
    fn model_id(&self) -> &str { &self.id }

    fn count_tokens(&self, text: &str) -> Result<usize> {
        let enc = self.counter.encode(text, false).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        Ok(enc.get_ids().len())
    }

    fn classify(&self, premise: &str, hypothesis: &str) -> Result<NliProbs> {
        let enc = encode_batch(&self.tokenizer, vec![(premise, hypothesis)], self.max_len, &self.device)?;
        let logits = self.model.forward(&enc.input_ids, &enc.attention_mask, &enc.token_type_ids)?;
        let rows: Vec<Vec<f32>> = logits.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?;
        let row = rows.first().ok_or_else(|| anyhow!("model returned no logits"))?;
        Ok(NliProbs::from_logits(self.labels.pick(row)?))
    }
}
