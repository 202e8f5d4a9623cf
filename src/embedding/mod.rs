//! 임베딩 모듈 - Ollama API를 통한 텍스트 벡터화
//!
//! 텍스트를 고정 차원 벡터로 변환하는 임베딩 프로바이더입니다.
//! 벡터 차원은 모델이 결정하며 (빌드 내 모든 호출에서 동일),
//! 설정으로 고정하지 않습니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = OllamaEmbedding::new(base_url, "nomic-embed-text".into())?;
//! let vector = embedder.embed("creepers explode").await?;
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::knowledge::{EmbeddingRecord, Segment};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Ollama Embedding
// ============================================================================

/// 네트워크 에러 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 500;
/// HTTP 타임아웃
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Ollama 임베딩 구현체
///
/// ref: https://github.com/ollama/ollama/blob/main/docs/api.md#generate-embeddings
#[derive(Debug)]
pub struct OllamaEmbedding {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

/// Ollama 임베딩 요청 본문
#[derive(Debug, Serialize)]
struct EmbeddingsRequest {
    model: String,
    prompt: String,
}

/// Ollama 임베딩 응답
#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

/// Ollama 에러 응답
#[derive(Debug, Deserialize)]
struct OllamaError {
    error: String,
}

impl OllamaEmbedding {
    /// 새 Ollama 임베딩 인스턴스 생성
    ///
    /// # Arguments
    /// * `base_url` - Ollama 엔드포인트 (예: http://localhost:11434)
    /// * `model` - 임베딩 모델 이름 (예: nomic-embed-text)
    pub fn new(base_url: String, model: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    /// 설정에서 생성
    pub fn from_config(config: &crate::config::Config) -> Result<Self> {
        Self::new(
            config.ollama_base_url.clone(),
            config.embedding_model.clone(),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embeddings", self.base_url)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingsRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let mut last_error: Option<anyhow::Error> = None;

        // 재시도 루프 (네트워크 에러 시 지수 백오프)
        for attempt in 0..=MAX_RETRIES {
            let response = match self
                .client
                .post(self.endpoint())
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error =
                        Some(anyhow::anyhow!("Failed to send embedding request: {}", e));
                    if attempt < MAX_RETRIES {
                        let backoff =
                            Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            "Embedding request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read embedding response body")?;

            if status.is_success() {
                let parsed: EmbeddingsResponse = serde_json::from_str(&body)
                    .context("Failed to parse embedding response")?;

                if parsed.embedding.is_empty() {
                    anyhow::bail!("Ollama returned an empty embedding (model: {})", self.model);
                }

                return Ok(parsed.embedding);
            }

            // HTTP 에러 - 즉시 실패 (모델 미설치 등은 재시도 무의미)
            if let Ok(error) = serde_json::from_str::<OllamaError>(&body) {
                anyhow::bail!("Ollama API error ({}): {}", status, error.error);
            }
            anyhow::bail!("Ollama API error ({}): {}", status, body);
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Embedding failed after {} retries", MAX_RETRIES)))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Batch Build
// ============================================================================

/// 세그먼트 배치 임베딩
///
/// 정규화 텍스트를 순차적으로 임베딩해 레코드를 만듭니다.
/// 개별 세그먼트의 실패는 배치를 중단하지 않습니다: 해당 세그먼트만
/// 건너뛰고 진행하며, 건너뛴 개수를 함께 반환합니다.
pub async fn generate_embeddings(
    embedder: &dyn EmbeddingProvider,
    segments: &[Segment],
) -> (Vec<EmbeddingRecord>, usize) {
    let mut records = Vec::with_capacity(segments.len());
    let mut skipped = 0usize;

    for (i, segment) in segments.iter().enumerate() {
        tracing::debug!(
            "Embedding segment {}/{}: {}",
            i + 1,
            segments.len(),
            segment.id
        );

        match embedder.embed(&segment.normalized_content).await {
            Ok(embedding) => {
                records.push(EmbeddingRecord {
                    id: segment.id.clone(),
                    page: segment.page.clone(),
                    section: segment.section.clone(),
                    content: segment.content.clone(),
                    embedding,
                });
            }
            Err(e) => {
                tracing::warn!("Failed to embed segment {}: {}", segment.id, e);
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        tracing::warn!(
            "Embedding batch finished with {} skipped segments out of {}",
            skipped,
            segments.len()
        );
    }

    (records, skipped)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(id: &str, normalized: &str) -> Segment {
        Segment {
            id: id.to_string(),
            page: "Mobs".to_string(),
            section: "Hostile".to_string(),
            content: normalized.to_string(),
            normalized_content: normalized.to_string(),
            length: normalized.chars().count(),
        }
    }

    /// 특정 텍스트에서만 실패하는 테스트 임베더
    struct FlakyEmbedder {
        fail_on: String,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text == self.fail_on {
                anyhow::bail!("simulated embedding failure");
            }
            Ok(vec![text.chars().count() as f32, 1.0])
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    #[test]
    fn test_embeddings_request_shape() {
        let request = EmbeddingsRequest {
            model: "nomic-embed-text".to_string(),
            prompt: "creepers explode".to_string(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "nomic-embed-text");
        assert_eq!(json["prompt"], "creepers explode");
    }

    #[test]
    fn test_embeddings_response_parse() {
        let body = r#"{"embedding": [0.1, -0.2, 0.3]}"#;
        let parsed: EmbeddingsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.embedding.len(), 3);
    }

    #[test]
    fn test_endpoint_normalizes_trailing_slash() {
        let embedder =
            OllamaEmbedding::new("http://localhost:11434/".to_string(), "m".to_string()).unwrap();
        assert_eq!(embedder.endpoint(), "http://localhost:11434/api/embeddings");
    }

    #[tokio::test]
    async fn test_generate_embeddings_skips_failures_and_continues() {
        let segments = vec![
            segment("Mobs_Hostile_0", "creepers explode near players"),
            segment("Mobs_Hostile_1", "this one fails"),
            segment("Mobs_Hostile_2", "zombies attack at night"),
        ];

        let embedder = FlakyEmbedder {
            fail_on: "this one fails".to_string(),
        };

        let (records, skipped) = generate_embeddings(&embedder, &segments).await;

        assert_eq!(records.len(), 2);
        assert_eq!(skipped, 1);
        assert_eq!(records[0].id, "Mobs_Hostile_0");
        assert_eq!(records[1].id, "Mobs_Hostile_2");
    }

    #[tokio::test]
    async fn test_generate_embeddings_empty_input() {
        let embedder = FlakyEmbedder {
            fail_on: String::new(),
        };

        let (records, skipped) = generate_embeddings(&embedder, &[]).await;
        assert!(records.is_empty());
        assert_eq!(skipped, 0);
    }

    #[tokio::test]
    async fn test_embed_batch_default_impl() {
        let embedder = FlakyEmbedder {
            fail_on: "unused".to_string(),
        };

        let texts = vec!["abc".to_string(), "defgh".to_string()];
        let vectors = embedder.embed_batch(&texts).await.unwrap();

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0][0], 3.0);
        assert_eq!(vectors[1][0], 5.0);
    }
}
