//! 세그먼트 분할 모듈
//!
//! 위키 섹션 텍스트를 문장 단위로 쪼갠 뒤 길이 제한 내에서
//! greedy 패킹해 검색 단위인 세그먼트를 만듭니다.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{MAX_CHUNK_LENGTH, MIN_TEXT_LENGTH};

use super::normalizer::Normalizer;
use super::store::WikiData;

// ============================================================================
// Segment Configuration
// ============================================================================

/// 세그먼트 분할 설정
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// 최소 세그먼트 길이 (문자 수) - 미달 청크는 버림
    pub min_text_length: usize,
    /// 청크 최대 길이 (문자 수) - greedy 패킹 기준값
    pub max_chunk_length: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            min_text_length: MIN_TEXT_LENGTH,
            max_chunk_length: MAX_CHUNK_LENGTH,
        }
    }
}

impl SegmentConfig {
    /// 전역 설정에서 생성
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            min_text_length: config.min_text_length,
            max_chunk_length: config.max_chunk_length,
        }
    }
}

// ============================================================================
// Segment
// ============================================================================

/// 세그먼트 - 검색의 원자 단위
///
/// 분할 시점에 한 번 생성되며 이후 불변입니다.
/// `id`는 `페이지_섹션_인덱스` 형식이고, 인덱스는 길이 필터를
/// 통과한 청크 기준으로 섹션마다 0부터 다시 시작합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub page: String,
    pub section: String,
    /// 원본 청크 텍스트 (정규화 전)
    pub content: String,
    /// 임베딩 입력용 정규화 텍스트 (content에서 재계산 가능)
    pub normalized_content: String,
    /// content의 문자 수
    pub length: usize,
}

// ============================================================================
// Segmenter
// ============================================================================

/// 세그먼트 분할기
///
/// 섹션별 처리 순서:
/// 1. 텍스트 블록을 공백 하나로 연결
/// 2. 문장 종결 문자(`.`, `!`, `?` 연속)로 분리, 빈 후보 제거
/// 3. 길이 제한 내 greedy 패킹 (아래 경계 규칙 참고)
/// 4. 최소 길이 미달 청크 제거 후 세그먼트 생성
///
/// 경계 규칙: 패킹 판정은 문장을 붙이기 *전* 청크 길이와 비교하므로
/// 긴 문장이 붙으면 개별 청크가 max_chunk_length를 넘을 수 있습니다.
/// 의도된 동작입니다 (문장을 중간에 자르지 않음).
pub struct Segmenter {
    config: SegmentConfig,
    normalizer: Normalizer,
    sentence_re: Regex,
}

impl Segmenter {
    /// 설정으로 생성
    pub fn new(config: SegmentConfig) -> Self {
        Self {
            config,
            normalizer: Normalizer::new(),
            sentence_re: Regex::new(r"[.!?]+").expect("sentence regex"),
        }
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self::new(SegmentConfig::default())
    }

    /// 위키 데이터 전체를 세그먼트로 분할
    pub fn segment_all(&self, data: &WikiData) -> Vec<Segment> {
        let mut segments = Vec::new();

        for (page, sections) in data {
            for (section, blocks) in sections {
                segments.extend(self.segment_section(page, section, blocks));
            }
        }

        tracing::info!(
            "Segmented {} pages into {} segments",
            data.len(),
            segments.len()
        );

        segments
    }

    /// 한 섹션을 세그먼트로 분할
    pub fn segment_section(&self, page: &str, section: &str, blocks: &[String]) -> Vec<Segment> {
        let full_text = blocks.join(" ");
        let chunks = self.split_into_chunks(&full_text);

        let mut segments = Vec::new();

        for chunk in chunks {
            let length = chunk.chars().count();
            if length < self.config.min_text_length {
                continue;
            }

            // 인덱스는 생존 청크 기준 (섹션 내 연속)
            let index = segments.len();

            segments.push(Segment {
                id: format!("{}_{}_{}", page, section, index),
                page: page.to_string(),
                section: section.to_string(),
                normalized_content: self.normalizer.normalize(&chunk),
                content: chunk,
                length,
            });
        }

        segments
    }

    /// 문장들을 길이 제한 내에서 greedy 패킹
    ///
    /// 각 문장은 `". "`를 붙여 이어지며, 종결 문자는 `.` 하나로
    /// 통일됩니다. 종결 문자가 전혀 없는 텍스트는 통째로 한 문장이
    /// 되어 청크 하나(끝에 `.` 추가)로 나옵니다.
    fn split_into_chunks(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize; // 문자 수 (구분자 ". " 포함)

        for candidate in self.sentence_re.split(text) {
            let sentence = candidate.trim();
            if sentence.is_empty() {
                continue;
            }

            let sentence_len = sentence.chars().count();

            if current_len + sentence_len < self.config.max_chunk_length {
                current.push_str(sentence);
                current.push_str(". ");
                current_len += sentence_len + 2;
            } else {
                if !current.is_empty() {
                    chunks.push(current.trim_end().to_string());
                }
                current = format!("{}. ", sentence);
                current_len = sentence_len + 2;
            }
        }

        if !current.is_empty() {
            chunks.push(current.trim_end().to_string());
        }

        chunks
    }
}

// ============================================================================
// Tests
// ============================================================================
