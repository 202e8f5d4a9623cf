//! 텍스트 정규화 모듈
//!
//! 임베딩 입력용 텍스트 클리닝을 제공합니다.
//! 소문자화, 게임 용어 약어 확장, 구두점 제거를 순서대로 적용하는
//! 순수 결정적 변환이며, 같은 입력은 항상 같은 출력을 냅니다.

use std::collections::HashMap;

use regex::Regex;

// ============================================================================
// Abbreviation Table
// ============================================================================

/// 게임 용어 약어 테이블
///
/// 토큰 단위 완전 일치일 때만 확장합니다. 구두점이 붙은 토큰("hp,")은
/// 확장 대상이 아닙니다 (구두점 제거가 확장 이후에 수행되므로).
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("lvl", "level"),
    ("def", "defense"),
    ("atk", "attack"),
    ("dmg", "damage"),
    ("hp", "health"),
    ("exp", "experience"),
    ("inv", "inventory"),
    ("mob", "monster"),
    ("npc", "non-player character"),
    ("biome", "environment type"),
    ("ench", "enchantment"),
    ("pve", "player versus environment"),
    ("pvp", "player versus player"),
];

// ============================================================================
// Normalizer
// ============================================================================

/// 텍스트 정규화기
///
/// 변환 순서:
/// 1. 소문자화
/// 2. 공백 토큰화 후 약어 확장
/// 3. 영숫자/공백 외 문자를 공백으로 치환
/// 4. 연속 공백 정리 및 트림
pub struct Normalizer {
    abbreviations: HashMap<&'static str, &'static str>,
    punct_re: Regex,
    space_re: Regex,
}

impl Normalizer {
    /// 새 정규화기 생성
    pub fn new() -> Self {
        Self {
            abbreviations: ABBREVIATIONS.iter().copied().collect(),
            punct_re: Regex::new(r"[^\w\s]").expect("punct regex"),
            space_re: Regex::new(r"\s+").expect("space regex"),
        }
    }

    /// 텍스트 정규화
    ///
    /// 어떤 입력 문자열이든 예외 없이 문자열(빈 문자열 가능)로 매핑됩니다.
    /// 멱등성 보장: `normalize(normalize(s)) == normalize(s)`
    pub fn normalize(&self, text: &str) -> String {
        // 1. 소문자화
        let text = text.to_lowercase();

        // 2. 약어 확장 (공백 토큰 단위)
        let expanded: Vec<&str> = text
            .split_whitespace()
            .map(|word| self.abbreviations.get(word).copied().unwrap_or(word))
            .collect();
        let text = expanded.join(" ");

        // 3. 구두점 제거 (공백으로 치환)
        let text = self.punct_re.replace_all(&text, " ");

        // 4. 연속 공백 정리
        self.space_re.replace_all(&text, " ").trim().to_string()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
