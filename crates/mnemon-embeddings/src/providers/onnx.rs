//! ONNX embedding provider for local transformer models.
//!
//! A model lives in the offline cache as a directory holding `model.onnx`
//! and its WordPiece vocabulary `vocab.txt`; when either file is missing
//! the provider reports `ModelUnavailable` and nothing is fetched.
//! Tokenization is greedy longest-match WordPiece against that vocabulary,
//! pooling is a mean over the final hidden states, and the result is
//! L2-normalized. The configured dimension must match the model's output;
//! a mismatch is an error, never a silent truncation.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, warn};

use mnemon_core::errors::EmbeddingError;
use mnemon_core::traits::EmbeddingProvider;
use mnemon_core::MnemonResult;

use crate::l2_normalize;

/// Longest token sequence fed to the model; longer texts are truncated.
const MAX_TOKENS: usize = 256;
/// Words longer than this map straight to `[UNK]` instead of being split.
const MAX_WORD_CHARS: usize = 48;

/// WordPiece vocabulary loaded from `vocab.txt` (one piece per line, the
/// line number is the token id; continuation pieces carry a `##` prefix).
struct WordPieceVocab {
    ids: HashMap<String, i64>,
    cls: i64,
    sep: i64,
    unk: i64,
}

impl WordPieceVocab {
    fn load(path: &Path) -> Option<Self> {
        let text = fs::read_to_string(path).ok()?;
        let mut ids = HashMap::new();
        for (line_no, line) in text.lines().enumerate() {
            ids.insert(line.trim_end().to_string(), line_no as i64);
        }
        let cls = *ids.get("[CLS]")?;
        let sep = *ids.get("[SEP]")?;
        let unk = *ids.get("[UNK]")?;
        Some(Self { ids, cls, sep, unk })
    }

    /// Frame the text as `[CLS] ...pieces [SEP]`, truncated to
    /// `MAX_TOKENS`. Words are lowercased alphanumeric runs.
    fn encode(&self, text: &str) -> Vec<i64> {
        let lowered = text.to_lowercase();
        let mut ids = vec![self.cls];
        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            self.push_word(word, &mut ids);
            if ids.len() >= MAX_TOKENS - 1 {
                break;
            }
        }
        ids.truncate(MAX_TOKENS - 1);
        ids.push(self.sep);
        ids
    }

    /// Greedy longest-match split of one word. A word with any
    /// un-matchable remainder becomes a single `[UNK]`.
    fn push_word(&self, word: &str, out: &mut Vec<i64>) {
        let chars: Vec<char> = word.chars().collect();
        if chars.len() > MAX_WORD_CHARS {
            out.push(self.unk);
            return;
        }

        let mut pieces = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let mut matched = None;
            let mut end = chars.len();
            while end > start {
                let mut candidate: String = chars[start..end].iter().collect();
                if start > 0 {
                    candidate.insert_str(0, "##");
                }
                if let Some(&id) = self.ids.get(&candidate) {
                    matched = Some((id, end));
                    break;
                }
                end -= 1;
            }
            let Some((id, next)) = matched else {
                out.push(self.unk);
                return;
            };
            pieces.push(id);
            start = next;
        }
        out.extend(pieces);
    }
}

pub struct OnnxEmbedder {
    /// `Session::run` needs `&mut self`; the Mutex restores `&self` access.
    session: Mutex<Session>,
    vocab: WordPieceVocab,
    /// Whether the model's input signature includes `token_type_ids`.
    feeds_token_type_ids: bool,
    dimensions: usize,
    model_name: String,
}

// Safety: Session is Send; the Mutex provides the synchronization for Sync.
unsafe impl Sync for OnnxEmbedder {}

impl OnnxEmbedder {
    /// Load `<model_dir>/model.onnx` and `<model_dir>/vocab.txt`.
    pub fn load(model_dir: &Path, model_id: &str, dimensions: usize) -> MnemonResult<Self> {
        let model_path = model_dir.join("model.onnx");
        let vocab_path = model_dir.join("vocab.txt");
        let unavailable = || EmbeddingError::ModelUnavailable {
            model: model_id.to_string(),
            path: model_dir.display().to_string(),
        };

        if !model_path.is_file() || !vocab_path.is_file() {
            return Err(unavailable().into());
        }
        let Some(vocab) = WordPieceVocab::load(&vocab_path) else {
            warn!(model = model_id, "vocab.txt lacks [CLS]/[SEP]/[UNK] entries");
            return Err(unavailable().into());
        };

        let builder = Session::builder().map_err(|e| {
            warn!(model = model_id, error = %e, "ONNX session creation failed");
            unavailable()
        })?;
        let mut builder = builder.with_intra_threads(2).map_err(|e| {
            warn!(model = model_id, error = %e, "ONNX session creation failed");
            unavailable()
        })?;
        let session = builder.commit_from_file(&model_path).map_err(|e| {
            warn!(model = model_id, error = %e, "ONNX session creation failed");
            unavailable()
        })?;
        let feeds_token_type_ids = session
            .inputs
            .iter()
            .any(|input| input.name == "token_type_ids");

        debug!(
            model = model_id,
            dims = dimensions,
            vocab = vocab.ids.len(),
            "ONNX model loaded"
        );
        Ok(Self {
            session: Mutex::new(session),
            vocab,
            feeds_token_type_ids,
            dimensions,
            model_name: model_id.to_string(),
        })
    }

    fn infer(&self, text: &str) -> MnemonResult<Vec<f32>> {
        let token_ids = self.vocab.encode(text);
        let seq_len = token_ids.len();
        let shape = vec![1i64, seq_len as i64];

        let ids_tensor = Tensor::from_array((shape.clone(), token_ids))
            .map_err(|e| inference_err(format!("input_ids tensor: {e}")))?;
        let mask_tensor = Tensor::from_array((shape.clone(), vec![1i64; seq_len]))
            .map_err(|e| inference_err(format!("attention_mask tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| inference_err(format!("session lock poisoned: {e}")))?;

        // Single-sequence inference has no padding, so the mask is all
        // ones and plain mean pooling equals masked mean pooling.
        let outputs = if self.feeds_token_type_ids {
            let type_tensor = Tensor::from_array((shape, vec![0i64; seq_len]))
                .map_err(|e| inference_err(format!("token_type_ids tensor: {e}")))?;
            session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "token_type_ids" => type_tensor,
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
            ])
        }
        .map_err(|e| inference_err(e.to_string()))?;

        let hidden = outputs
            .iter()
            .next()
            .map(|(_, value)| value)
            .ok_or_else(|| inference_err("model produced no outputs".to_string()))?;
        let (out_shape, data) = hidden
            .try_extract_tensor::<f32>()
            .map_err(|e| inference_err(format!("output extraction: {e}")))?;

        let mut embedding = match out_shape.len() {
            // [batch, seq, hidden]: mean over the sequence axis.
            3 => {
                let seq = (out_shape[1] as usize).max(1);
                let width = out_shape[2] as usize;
                let mut pooled = vec![0.0f32; width];
                for row in data.chunks_exact(width).take(seq) {
                    for (acc, value) in pooled.iter_mut().zip(row) {
                        *acc += value;
                    }
                }
                let scale = 1.0 / seq as f32;
                for value in &mut pooled {
                    *value *= scale;
                }
                pooled
            }
            // [batch, hidden]: the model pooled for us.
            2 => data[..out_shape[1] as usize].to_vec(),
            other => {
                return Err(inference_err(format!(
                    "unexpected output rank {other} (shape {out_shape:?})"
                )));
            }
        };

        if embedding.len() != self.dimensions {
            return Err(inference_err(format!(
                "model `{}` emits {} dims but {} are configured",
                self.model_name,
                embedding.len(),
                self.dimensions
            )));
        }
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

fn inference_err(reason: String) -> mnemon_core::MnemonError {
    EmbeddingError::InferenceFailed { reason }.into()
}

impl EmbeddingProvider for OnnxEmbedder {
    fn embed(&self, text: &str) -> MnemonResult<Vec<f32>> {
        self.infer(text)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.model_name
    }

    fn is_available(&self) -> bool {
        true
    }
}
