//! mcwiki-rag - 마인크래프트 위키 RAG 챗봇
//!
//! 위키 문서를 정규화된 텍스트 세그먼트로 변환하고, 세그먼트별
//! 임베딩을 플랫 JSON 벡터 저장소에 보관한 뒤, 질문 시 코사인
//! 유사도 상위 세그먼트를 찾아 Ollama 생성 호출의 근거로 씁니다.

pub mod chat;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod knowledge;
pub mod scraper;

// Re-exports
pub use chat::{build_prompt, GenerationProvider, OllamaGenerator, WikiChatbot};
pub use config::Config;
pub use embedding::{generate_embeddings, EmbeddingProvider, OllamaEmbedding};
pub use knowledge::{
    cosine_similarity, load_segments, load_wiki_data, save_segments, save_wiki_data,
    ContextResult, EmbeddingRecord, Normalizer, RetrievalError, Retriever, SectionBlocks,
    Segment, SegmentConfig, Segmenter, StoreError, VectorStore, WikiData,
};
pub use scraper::WikiScraper;
