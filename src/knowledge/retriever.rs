//! 검색 오케스트레이션 - 쿼리 임베딩 + 유사도 검색
//!
//! 이미 로드된 벡터 저장소와 임베딩 프로바이더를 주입받아
//! 쿼리당 한 번의 임베딩 호출과 전수 스캔으로 컨텍스트를 찾습니다.
//! 임베딩 실패는 타입 에러로 반환하며, 빈 컨텍스트로의 폴백 여부는
//! 호출자가 결정합니다.

use thiserror::Error;

use crate::embedding::EmbeddingProvider;

use super::store::VectorStore;

// ============================================================================
// Types
// ============================================================================

/// 검색 결과 컨텍스트
///
/// 일회성 결과이며 영속화되지 않습니다.
#[derive(Debug, Clone)]
pub struct ContextResult {
    /// 세그먼트 원본 텍스트
    pub content: String,
    /// 출처 페이지
    pub page: String,
    /// 출처 섹션
    pub section: String,
    /// 코사인 유사도 (-1.0 ~ 1.0)
    pub similarity: f32,
}

/// 검색 에러
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// 쿼리 임베딩 생성 실패 (네트워크/모델 에러)
    #[error("query embedding failed: {source}")]
    Embedding {
        #[source]
        source: anyhow::Error,
    },
}

// ============================================================================
// Retriever
// ============================================================================

/// 검색기
///
/// 로드 시점이 명시적입니다: 저장소는 생성자에서 이미 로드된 채로
/// 주입되며, 세션 동안 읽기 전용으로 재사용됩니다.
pub struct Retriever {
    store: VectorStore,
    embedder: Box<dyn EmbeddingProvider>,
    threshold: f32,
}

impl Retriever {
    /// 새 검색기 생성
    ///
    /// # Arguments
    /// * `store` - 로드된 벡터 저장소
    /// * `embedder` - 쿼리 임베딩 프로바이더
    /// * `threshold` - 유사도 임계값 (이하 결과 제외)
    pub fn new(store: VectorStore, embedder: Box<dyn EmbeddingProvider>, threshold: f32) -> Self {
        Self {
            store,
            embedder,
            threshold,
        }
    }

    /// 쿼리와 관련된 컨텍스트 검색
    ///
    /// 유사도 내림차순으로 최대 `top_k`개를 반환합니다.
    /// 임계값을 넘는 결과가 없으면 빈 목록입니다 (에러 아님).
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ContextResult>, RetrievalError> {
        let query_vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|source| RetrievalError::Embedding { source })?;

        let hits = self.store.query(&query_vector, top_k, self.threshold);

        let contexts = hits
            .into_iter()
            .filter_map(|(index, similarity)| {
                self.store.record(index).map(|record| ContextResult {
                    content: record.content.clone(),
                    page: record.page.clone(),
                    section: record.section.clone(),
                    similarity,
                })
            })
            .collect();

        Ok(contexts)
    }

    /// 내부 저장소 접근
    pub fn store(&self) -> &VectorStore {
        &self.store
    }
}

// ============================================================================
// Tests
// ============================================================================
