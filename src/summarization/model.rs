//! # T5 Summarization Model
//!
//! Loads a T5-family conditional-generation model from HuggingFace and
//! runs greedy decoding to produce a summary for one transcript chunk.
//! Both summarizer slots (multilingual and English) load through this
//! type; only the repository id differs.

use crate::error::EngineError;
use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::t5;
use tokenizers::Tokenizer;

/// Maximum generated summary length, in tokens.
const MAX_SUMMARY_TOKENS: usize = 220;

/// Minimum generated summary length before end-of-sequence is honored.
const MIN_SUMMARY_TOKENS: usize = 60;

/// A loaded T5 summarization model.
pub struct T5Summarizer {
    model: t5::T5ForConditionalGeneration,
    config: t5::Config,
    tokenizer: Tokenizer,
    device: Device,
    repo_id: String,
}

impl T5Summarizer {
    /// Download (if needed) and load a summarization model.
    pub async fn load(repo_id: &str, device: Device) -> Result<Self, EngineError> {
        tracing::info!("Loading summarization model {}...", repo_id);
        let start_time = std::time::Instant::now();

        let api = hf_hub::api::tokio::ApiBuilder::new()
            .with_progress(false)
            .build()
            .map_err(|e| EngineError::ModelLoad(format!("HuggingFace API init: {}", e)))?;
        let repo = api.model(repo_id.to_string());

        let config_filename = repo
            .get("config.json")
            .await
            .map_err(|e| EngineError::ModelLoad(format!("config.json from {}: {}", repo_id, e)))?;
        let tokenizer_filename = repo
            .get("tokenizer.json")
            .await
            .map_err(|e| EngineError::ModelLoad(format!("tokenizer.json from {}: {}", repo_id, e)))?;
        let weights_filename = repo
            .get("model.safetensors")
            .await
            .map_err(|e| EngineError::ModelLoad(format!("weights from {}: {}", repo_id, e)))?;

        let config_file = std::fs::File::open(config_filename)
            .map_err(|e| EngineError::ModelLoad(format!("open config.json: {}", e)))?;
        let config: t5::Config = serde_json::from_reader(config_file)
            .map_err(|e| EngineError::ModelLoad(format!("parse config.json: {}", e)))?;

        let tokenizer = Tokenizer::from_file(tokenizer_filename)
            .map_err(|e| EngineError::ModelLoad(format!("load tokenizer: {}", e)))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_filename], DType::F32, &device)
                .map_err(|e| EngineError::ModelLoad(format!("map weights: {}", e)))?
        };
        let model = t5::T5ForConditionalGeneration::load(vb, &config)
            .map_err(|e| EngineError::ModelLoad(format!("init model: {}", e)))?;

        tracing::info!(
            "Summarization model {} loaded in {:.2}s",
            repo_id,
            start_time.elapsed().as_secs_f64()
        );

        Ok(Self {
            model,
            config,
            tokenizer,
            device,
            repo_id: repo_id.to_string(),
        })
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    /// Summarize one transcript chunk with greedy decoding.
    pub fn summarize(&mut self, text: &str) -> Result<String, EngineError> {
        if text.trim().is_empty() {
            return Err(EngineError::EmptyInput);
        }

        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EngineError::Inference(format!("tokenizer encode: {}", e)))?;
        let input_ids = Tensor::new(encoding.get_ids(), &self.device)?.unsqueeze(0)?;

        self.model.clear_kv_cache();
        let encoder_output = self.model.encode(&input_ids)?;

        let decoder_start = self
            .config
            .decoder_start_token_id
            .unwrap_or(self.config.pad_token_id) as u32;
        let eos = self.config.eos_token_id as u32;

        let mut output_tokens = vec![decoder_start];
        for step in 0..MAX_SUMMARY_TOKENS {
            // With the KV cache warm only the newest token is fed back in
            let decoder_input = if step == 0 {
                Tensor::new(output_tokens.as_slice(), &self.device)?.unsqueeze(0)?
            } else {
                let last = *output_tokens.last().unwrap();
                Tensor::new(&[last], &self.device)?.unsqueeze(0)?
            };

            let logits = self.model.decode(&decoder_input, &encoder_output)?;
            let (_, seq_len, _) = logits.dims3()?;
            let last_logits = logits.i((0, seq_len - 1))?;

            // End-of-sequence is suppressed until the minimum summary length
            let next_token = if output_tokens.len() <= MIN_SUMMARY_TOKENS {
                let mut scores = last_logits.to_vec1::<f32>()?;
                if (eos as usize) < scores.len() {
                    scores[eos as usize] = f32::NEG_INFINITY;
                }
                scores
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(i, _)| i as u32)
                    .unwrap_or(eos)
            } else {
                last_logits.argmax(0)?.to_scalar::<u32>()?
            };

            if next_token == eos {
                break;
            }
            output_tokens.push(next_token);
        }

        let text = self
            .tokenizer
            .decode(&output_tokens[1..], true)
            .map_err(|e| EngineError::Inference(format!("tokenizer decode: {}", e)))?;

        Ok(text.trim().to_string())
    }
}
