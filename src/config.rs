//! 설정 모듈 - 파이프라인 전역 설정
//!
//! 전역 가변 상태 대신 명시적 설정 구조체를 사용합니다.
//! 각 컴포넌트는 생성 시점에 필요한 값을 전달받습니다.

use std::path::PathBuf;

// ============================================================================
// Defaults
// ============================================================================

/// 기본 위키 API 엔드포인트
/// ref: https://minecraft.wiki/api.php
pub const DEFAULT_WIKI_BASE_URL: &str = "https://minecraft.wiki/api.php";

/// 기본 Ollama 엔드포인트
/// ref: https://github.com/ollama/ollama/blob/main/docs/api.md
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// 세그먼트 최소 길이 (문자 수) - 이보다 짧은 청크는 버림
pub const MIN_TEXT_LENGTH: usize = 50;

/// 청크 최대 길이 (문자 수) - greedy 패킹 기준값
pub const MAX_CHUNK_LENGTH: usize = 500;

/// 유사도 임계값 - 이하인 결과는 제외
pub const SIMILARITY_THRESHOLD: f32 = 0.1;

/// 검색 결과 기본 개수
pub const DEFAULT_TOP_K: usize = 3;

// ============================================================================
// Config
// ============================================================================

/// 파이프라인 설정
///
/// 수집 대상 위키 페이지, 청킹 파라미터, 모델 이름, 데이터 경로를 담습니다.
#[derive(Debug, Clone)]
pub struct Config {
    /// MediaWiki API 엔드포인트
    pub wiki_base_url: String,
    /// 수집할 위키 페이지 제목 목록
    pub wiki_pages: Vec<String>,
    /// 세그먼트 최소 길이 (문자 수)
    pub min_text_length: usize,
    /// 청크 최대 길이 (문자 수)
    pub max_chunk_length: usize,
    /// 검색 유사도 임계값
    pub similarity_threshold: f32,
    /// 검색 결과 개수
    pub top_k: usize,
    /// 생성 모델 이름 (Ollama)
    pub generation_model: String,
    /// 임베딩 모델 이름 (Ollama)
    pub embedding_model: String,
    /// Ollama API 엔드포인트
    pub ollama_base_url: String,
    /// 데이터 루트 디렉토리
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wiki_base_url: DEFAULT_WIKI_BASE_URL.to_string(),
            wiki_pages: [
                "Minecraft",
                "Gameplay",
                "Items",
                "Blocks",
                "Mobs",
                "Crafting",
                "Biomes",
                "Enchanting",
                "Redstone",
                "Commands",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            min_text_length: MIN_TEXT_LENGTH,
            max_chunk_length: MAX_CHUNK_LENGTH,
            similarity_threshold: SIMILARITY_THRESHOLD,
            top_k: DEFAULT_TOP_K,
            generation_model: "deepseek-r1:7b".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl Config {
    /// 환경변수를 반영한 설정 생성
    ///
    /// `OLLAMA_HOST`가 설정되어 있으면 Ollama 엔드포인트로 사용합니다.
    pub fn from_env() -> Self {
        Self {
            ollama_base_url: ollama_base_url(),
            ..Self::default()
        }
    }

    /// 원본 위키 데이터 경로 (data/raw/all_wiki_data.json)
    pub fn raw_data_path(&self) -> PathBuf {
        self.data_dir.join("raw").join("all_wiki_data.json")
    }

    /// 세그먼트 파일 경로 (data/processed/processed_segments.json)
    pub fn segments_path(&self) -> PathBuf {
        self.data_dir
            .join("processed")
            .join("processed_segments.json")
    }

    /// 임베딩 저장소 경로 (data/embeddings/wiki_embeddings.json)
    pub fn embeddings_path(&self) -> PathBuf {
        self.data_dir.join("embeddings").join("wiki_embeddings.json")
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Ollama 엔드포인트 결정
///
/// 우선순위: `OLLAMA_HOST` 환경변수 > 기본값(localhost:11434)
pub fn ollama_base_url() -> String {
    match std::env::var("OLLAMA_HOST") {
        Ok(host) if !host.trim().is_empty() => {
            let host = host.trim().trim_end_matches('/');
            if host.starts_with("http://") || host.starts_with("https://") {
                host.to_string()
            } else {
                format!("http://{}", host)
            }
        }
        _ => DEFAULT_OLLAMA_BASE_URL.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
