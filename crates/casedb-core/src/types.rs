//! Domain types shared by the index, the stance classifier and the pipeline.
//!
//! Field names on the wire follow the upstream case corpus (`ChunkID`,
//! `Content`, `CaseNumber`, ...), so chunk files produced by the chunker can be
//! ingested without a mapping step.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

pub type ChunkId = String;

/// A bounded unit of case text. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(rename = "ChunkID")]
    pub chunk_id: ChunkId,
    #[serde(rename = "Content")]
    pub content: String,
    #[serde(flatten)]
    pub meta: ChunkMeta,
}

impl Chunk {
    pub fn new(chunk_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { chunk_id: chunk_id.into(), content: content.into(), meta: ChunkMeta::default() }
    }

    pub fn with_meta(mut self, meta: ChunkMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Rejects chunks that cannot be indexed: blank id or blank content.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_id.trim().is_empty() {
            return Err(Error::MalformedInput("chunk without ChunkID".to_string()));
        }
        if self.content.trim().is_empty() {
            return Err(Error::MalformedInput(format!("chunk {} has empty Content", self.chunk_id)));
        }
        Ok(())
    }
}

/// Optional case metadata carried by every chunk.
///
/// The set of fields is closed; unknown keys in the input are ignored. List
/// fields accept either a single scalar or an array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChunkMeta {
    #[serde(default, deserialize_with = "opt_scalar", skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, deserialize_with = "opt_scalar", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "opt_scalar", skip_serializing_if = "Option::is_none")]
    pub case_number: Option<String>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub industries: Vec<String>,
    #[serde(default, deserialize_with = "opt_scalar", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub party_nationalities: Vec<String>,
    #[serde(default, deserialize_with = "opt_scalar", skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, deserialize_with = "opt_scalar", skip_serializing_if = "Option::is_none")]
    pub rules_of_arbitration: Option<String>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub applicable_treaties: Vec<String>,
    #[serde(default, deserialize_with = "opt_scalar", skip_serializing_if = "Option::is_none")]
    pub decision_title: Option<String>,
    #[serde(default, deserialize_with = "opt_scalar", skip_serializing_if = "Option::is_none")]
    pub decision_type: Option<String>,
    #[serde(default, deserialize_with = "opt_scalar", skip_serializing_if = "Option::is_none")]
    pub decision_date: Option<String>,
    #[serde(default, deserialize_with = "opt_scalar", skip_serializing_if = "Option::is_none")]
    pub span: Option<String>,
}

impl ChunkMeta {
    /// Fill the gaps of `self` from `base`. Values already present on `self`
    /// win; list fields are taken whole from `base` only when `self` has none.
    pub fn overlay(self, base: &ChunkMeta) -> ChunkMeta {
        fn pick(own: Option<String>, base: &Option<String>) -> Option<String> {
            own.or_else(|| base.clone())
        }
        fn pick_list(own: Vec<String>, base: &[String]) -> Vec<String> {
            if own.is_empty() { base.to_vec() } else { own }
        }
        ChunkMeta {
            identifier: pick(self.identifier, &base.identifier),
            title: pick(self.title, &base.title),
            case_number: pick(self.case_number, &base.case_number),
            industries: pick_list(self.industries, &base.industries),
            status: pick(self.status, &base.status),
            party_nationalities: pick_list(self.party_nationalities, &base.party_nationalities),
            institution: pick(self.institution, &base.institution),
            rules_of_arbitration: pick(self.rules_of_arbitration, &base.rules_of_arbitration),
            applicable_treaties: pick_list(self.applicable_treaties, &base.applicable_treaties),
            decision_title: pick(self.decision_title, &base.decision_title),
            decision_type: pick(self.decision_type, &base.decision_type),
            decision_date: pick(self.decision_date, &base.decision_date),
            span: pick(self.span, &base.span),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Text(s) => s,
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(Scalar),
    Many(Vec<Scalar>),
}

fn opt_scalar<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(Option::<Scalar>::deserialize(de)?.map(Scalar::into_string))
}

fn one_or_many<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<Vec<String>, D::Error> {
    Ok(match Option::<OneOrMany>::deserialize(de)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s.into_string()],
        Some(OneOrMany::Many(v)) => v.into_iter().map(Scalar::into_string).collect(),
    })
}

/// One retrieved chunk with its full metadata and the retrieval score.
///
/// `fused_score` is the reciprocal-rank-fusion score for hybrid retrieval and
/// the cosine similarity for term-frequency retrieval. Higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "ChunkID")]
    pub chunk_id: ChunkId,
    #[serde(rename = "Content")]
    pub content: String,
    #[serde(flatten)]
    pub meta: ChunkMeta,
    pub fused_score: f64,
}

impl SearchHit {
    pub fn from_chunk(chunk: Chunk, fused_score: f64) -> Self {
        Self { chunk_id: chunk.chunk_id, content: chunk.content, meta: chunk.meta, fused_score }
    }
}

/// Three-way NLI distribution for one premise/hypothesis pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NliProbs {
    pub contradiction: f32,
    pub neutral: f32,
    pub entailment: f32,
}

impl NliProbs {
    /// Softmax over logits given in `[contradiction, neutral, entailment]` order.
    pub fn from_logits(logits: [f32; 3]) -> Self {
        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps = logits.map(|l| (l - max).exp());
        let sum: f32 = exps.iter().sum();
        Self { contradiction: exps[0] / sum, neutral: exps[1] / sum, entailment: exps[2] / sum }
    }
}
