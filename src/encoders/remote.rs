//! HTTP encoder adapters
//!
//! Clients for an embedding inference server exposing the dense and sparse
//! models. The model handshake is performed lazily, exactly once per adapter
//! (guarded by `tokio::sync::OnceCell` so concurrent first calls race
//! safely), and verifies that the server-reported shape matches the local
//! configuration before any embedding is accepted.
//!
//! Failures surface as `EngineError::Encoding` and are not retried here;
//! retry policy belongs to the caller.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use super::{pool_masked_logits, DenseEncoder, SparseEncoder};
use crate::config::EmbeddingConfig;
use crate::errors::{EngineError, Result, VectorKind};
use crate::sparse::SparseVector;

#[derive(Serialize)]
struct EncodeRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct DenseResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct SparseResponse {
    /// One row of vocabulary logits per token position
    logits: Vec<Vec<f32>>,
    attention_mask: Vec<u8>,
}

#[derive(Deserialize)]
struct ModelInfo {
    #[serde(default)]
    dimension: usize,
}

fn build_client(config: &EmbeddingConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| EngineError::Configuration {
            message: format!("failed to build HTTP client: {}", e),
        })
}

fn encoding_error(model: &str, message: impl std::fmt::Display) -> EngineError {
    EngineError::Encoding {
        model: model.to_string(),
        message: message.to_string(),
    }
}

async fn fetch_model_info(
    client: &reqwest::Client,
    base_url: &str,
    model: &str,
) -> Result<ModelInfo> {
    let url = format!("{}/v1/models/{}", base_url.trim_end_matches('/'), model);
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| encoding_error(model, format!("model handshake failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(encoding_error(
            model,
            format!("model handshake returned {}: {}", status, body),
        ));
    }

    response
        .json()
        .await
        .map_err(|e| encoding_error(model, format!("malformed model info: {}", e)))
}

async fn post_encode<T: for<'de> Deserialize<'de>>(
    client: &reqwest::Client,
    url: &str,
    model: &str,
    text: &str,
) -> Result<T> {
    let response = client
        .post(url)
        .json(&EncodeRequest { model, input: text })
        .send()
        .await
        .map_err(|e| encoding_error(model, format!("request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(encoding_error(
            model,
            format!("backend returned {}: {}", status, body),
        ));
    }

    response
        .json()
        .await
        .map_err(|e| encoding_error(model, format!("malformed response: {}", e)))
}

/// Dense encoder backed by a remote inference server
pub struct RemoteDenseEncoder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
    handshake: OnceCell<()>,
}

impl RemoteDenseEncoder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            model: config.dense_model.clone(),
            dimension: config.dense_dimension,
            handshake: OnceCell::new(),
        })
    }

    async fn ensure_ready(&self) -> Result<()> {
        self.handshake
            .get_or_try_init(|| async {
                let info = fetch_model_info(&self.client, &self.base_url, &self.model).await?;
                if info.dimension != self.dimension {
                    return Err(EngineError::DimensionMismatch {
                        kind: VectorKind::Dense,
                        expected: self.dimension,
                        actual: info.dimension,
                    });
                }
                Ok(())
            })
            .await
            .map(|_| ())
    }
}

#[async_trait::async_trait]
impl DenseEncoder for RemoteDenseEncoder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        self.ensure_ready().await?;

        let url = format!("{}/v1/embed/dense", self.base_url);
        let response: DenseResponse =
            post_encode(&self.client, &url, &self.model, text).await?;

        if response.embedding.len() != self.dimension {
            return Err(EngineError::DimensionMismatch {
                kind: VectorKind::Dense,
                expected: self.dimension,
                actual: response.embedding.len(),
            });
        }
        Ok(response.embedding)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Sparse encoder backed by a remote masked-LM logit server. The SPLADE
/// saturation and max-pooling run client-side over the returned logits.
pub struct RemoteSparseEncoder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    vocab_size: usize,
    handshake: OnceCell<()>,
}

impl RemoteSparseEncoder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            model: config.sparse_model.clone(),
            vocab_size: config.sparse_vocab_size,
            handshake: OnceCell::new(),
        })
    }

    async fn ensure_ready(&self) -> Result<()> {
        self.handshake
            .get_or_try_init(|| async {
                let info = fetch_model_info(&self.client, &self.base_url, &self.model).await?;
                if info.dimension != self.vocab_size {
                    return Err(EngineError::DimensionMismatch {
                        kind: VectorKind::Sparse,
                        expected: self.vocab_size,
                        actual: info.dimension,
                    });
                }
                Ok(())
            })
            .await
            .map(|_| ())
    }
}

#[async_trait::async_trait]
impl SparseEncoder for RemoteSparseEncoder {
    async fn encode(&self, text: &str) -> Result<SparseVector> {
        self.ensure_ready().await?;

        let url = format!("{}/v1/embed/sparse", self.base_url);
        let response: SparseResponse =
            post_encode(&self.client, &url, &self.model, text).await?;

        pool_masked_logits(&response.logits, &response.attention_mask, self.vocab_size)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }
}
