//! Knowledge 모듈 - 세그먼트 생성과 벡터 검색
//!
//! - Normalizer: 결정적 텍스트 클리닝 (소문자화, 약어 확장, 구두점 제거)
//! - Segmenter: 섹션 텍스트 → 길이 제한 청크 분할
//! - VectorStore: 플랫 JSON 임베딩 저장소 + 전수 스캔 코사인 검색
//! - Retriever: 쿼리 임베딩 → 검색 → 랭킹된 컨텍스트 목록

mod normalizer;
mod retriever;
mod segmenter;
mod store;

// Re-exports
pub use normalizer::Normalizer;
pub use retriever::{ContextResult, Retriever, RetrievalError};
pub use segmenter::{Segment, SegmentConfig, Segmenter};
pub use store::{
    cosine_similarity, load_segments, load_wiki_data, save_segments, save_wiki_data,
    EmbeddingRecord, SectionBlocks, StoreError, VectorStore, WikiData,
};
