//! llama.cpp backend for [`CausalLm`] (GGUF models).

use std::num::NonZeroU32;

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel};
use llama_cpp_2::token::LlamaToken;
use tracing::{debug, info};

use crate::config::LogprobConfig;

use super::{CausalLm, LmError, TokenId};

pub struct LlamaLm {
    backend: LlamaBackend,
    model: LlamaModel,
    context_size: u32,
}

impl LlamaLm {
    pub fn load(cfg: &LogprobConfig) -> Result<Self, LmError> {
        let path = cfg.model_path.display().to_string();
        let load_err = |message: String| LmError::Load { path: path.clone(), message };

        let backend = LlamaBackend::init().map_err(|e| load_err(e.to_string()))?;
        let params = LlamaModelParams::default().with_n_gpu_layers(cfg.gpu_layers);
        let model = LlamaModel::load_from_file(&backend, &cfg.model_path, &params)
            .map_err(|e| load_err(e.to_string()))?;

        info!(
            model = %path,
            vocab = model.n_vocab(),
            context = cfg.context_size,
            gpu_layers = cfg.gpu_layers,
            "local model loaded"
        );
        Ok(Self { backend, model, context_size: cfg.context_size })
    }
}

impl CausalLm for LlamaLm {
    fn tokenize(&self, text: &str, add_bos: bool) -> Result<Vec<TokenId>, LmError> {
        let bos = if add_bos { AddBos::Always } else { AddBos::Never };
        let tokens = self
            .model
            .str_to_token(text, bos)
            .map_err(|e| LmError::Tokenize(e.to_string()))?;
        Ok(tokens.into_iter().map(|t| t.0 as TokenId).collect())
    }

    fn logits(&mut self, tokens: &[TokenId]) -> Result<Vec<Vec<f32>>, LmError> {
        let n = tokens.len();
        if n > self.context_size as usize {
            return Err(LmError::TooLong { tokens: n, context: self.context_size as usize });
        }

        // A fresh context per sequence keeps the KV cache empty.
        let params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(self.context_size))
            .with_n_batch(self.context_size);
        let mut ctx = self
            .model
            .new_context(&self.backend, params)
            .map_err(|e| LmError::Decode(e.to_string()))?;

        let mut batch = LlamaBatch::new(n.max(1), 1);
        for (pos, &id) in tokens.iter().enumerate() {
            batch
                .add(LlamaToken::new(id as i32), pos as i32, &[0], true)
                .map_err(|e| LmError::Decode(e.to_string()))?;
        }
        ctx.decode(&mut batch).map_err(|e| LmError::Decode(e.to_string()))?;
        debug!(tokens = n, "forward pass done");

        Ok((0..n).map(|i| ctx.get_logits_ith(i as i32).to_vec()).collect())
    }
}
