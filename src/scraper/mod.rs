//! 위키 스크래퍼 모듈 - MediaWiki API 페이지 수집
//!
//! MediaWiki parse API로 페이지 HTML을 받아 섹션 구조
//! `{섹션 제목 → [텍스트 블록]}`으로 변환합니다.
//! ref: https://minecraft.wiki/api.php

use anyhow::{Context, Result};
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

use crate::knowledge::{SectionBlocks, WikiData};

/// 블록으로 수집할 최소 텍스트 길이 (문자 수)
const MIN_BLOCK_LENGTH: usize = 20;

/// 첫 헤딩 전 텍스트가 들어가는 기본 섹션
const INTRO_SECTION: &str = "Introduction";

// ============================================================================
// API Payloads
// ============================================================================

/// MediaWiki parse API 응답
/// ref: https://www.mediawiki.org/wiki/API:Parsing_wikitext
#[derive(Debug, Deserialize)]
struct ParseResponse {
    parse: Option<ParseResult>,
}

#[derive(Debug, Deserialize)]
struct ParseResult {
    text: Option<ParseText>,
}

#[derive(Debug, Deserialize)]
struct ParseText {
    #[serde(rename = "*")]
    html: Option<String>,
}

// ============================================================================
// WikiScraper
// ============================================================================

/// 위키 스크래퍼
pub struct WikiScraper {
    client: reqwest::Client,
    base_url: String,
    block_selector: Selector,
}

impl WikiScraper {
    /// 새 스크래퍼 생성
    ///
    /// # Arguments
    /// * `base_url` - MediaWiki API 엔드포인트
    pub fn new(base_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("mcwiki-rag/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            block_selector: Selector::parse("h1, h2, h3, h4, p, ul, ol")
                .expect("block selector"),
        })
    }

    /// 단일 페이지 수집
    ///
    /// 페이지가 없거나 응답 형식이 다르면 에러입니다.
    pub async fn scrape_page(&self, title: &str) -> Result<SectionBlocks> {
        tracing::info!("Scraping wiki page: {}", title);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("action", "parse"),
                ("page", title),
                ("format", "json"),
                ("prop", "text"),
                ("contentmodel", "wikitext"),
            ])
            .send()
            .await
            .context("Wiki API request failed")?;

        let parsed: ParseResponse = response
            .error_for_status()
            .context("Wiki API returned an error status")?
            .json()
            .await
            .context("Failed to parse wiki API response")?;

        let html = parsed
            .parse
            .and_then(|p| p.text)
            .and_then(|t| t.html)
            .ok_or_else(|| anyhow::anyhow!("Unexpected wiki API response for page '{}'", title))?;

        Ok(self.extract_sections(&html))
    }

    /// 설정된 모든 페이지 수집
    ///
    /// 개별 페이지 실패는 경고 후 건너뛰고 계속합니다.
    pub async fn scrape_all(&self, pages: &[String]) -> WikiData {
        let mut all_data = WikiData::new();

        for page in pages {
            match self.scrape_page(page).await {
                Ok(sections) => {
                    all_data.insert(page.clone(), sections);
                }
                Err(e) => {
                    tracing::warn!("Failed to scrape page '{}': {}", page, e);
                }
            }
        }

        tracing::info!("Scraped {}/{} wiki pages", all_data.len(), pages.len());
        all_data
    }

    /// HTML에서 섹션 구조 추출
    ///
    /// h1~h4는 새 섹션을 열고, p/ul/ol의 텍스트는 현재 섹션의 블록이
    /// 됩니다. script/style/nav/footer/table 하위 요소는 제외하며,
    /// 최소 길이 미만 블록도 버립니다. 같은 제목의 헤딩이 다시 나오면
    /// 해당 섹션은 비워지고 새로 시작합니다.
    fn extract_sections(&self, html: &str) -> SectionBlocks {
        let document = Html::parse_document(html);

        let mut sections = SectionBlocks::new();
        let mut current = INTRO_SECTION.to_string();
        sections.insert(current.clone(), Vec::new());

        for element in document.select(&self.block_selector) {
            if has_excluded_ancestor(&element) {
                continue;
            }

            let text = collect_text(&element);
            let tag = element.value().name();

            if matches!(tag, "h1" | "h2" | "h3" | "h4") {
                if text.is_empty() {
                    continue;
                }
                current = text;
                sections.insert(current.clone(), Vec::new());
            } else if text.chars().count() > MIN_BLOCK_LENGTH {
                sections.entry(current.clone()).or_default().push(text);
            }
        }

        sections
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 제외 대상 조상 요소 확인 (script/style/nav/footer/table)
fn has_excluded_ancestor(element: &ElementRef) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| {
            matches!(
                ancestor.value().name(),
                "script" | "style" | "nav" | "footer" | "table"
            )
        })
}

/// 요소 텍스트 수집 (공백 정리 포함)
fn collect_text(element: &ElementRef) -> String {
    let mut text = String::new();

    for node in element.text() {
        let trimmed = node.trim();
        if !trimmed.is_empty() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(trimmed);
        }
    }

    text
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn scraper() -> WikiScraper {
        WikiScraper::new("https://minecraft.wiki/api.php".to_string()).unwrap()
    }

    #[test]
    fn test_scraper_creation() {
        assert!(WikiScraper::new("https://minecraft.wiki/api.php".to_string()).is_ok());
    }

    #[test]
    fn test_extract_sections_basic_structure() {
        let html = r#"
            <div>
                <p>This introduction paragraph describes the page topic.</p>
                <h2>Behavior</h2>
                <p>Creepers approach players silently and explode when close.</p>
                <h2>Drops</h2>
                <p>Creepers drop gunpowder when killed by the player.</p>
            </div>
        "#;

        let sections = scraper().extract_sections(html);

        assert_eq!(
            sections["Introduction"],
            vec!["This introduction paragraph describes the page topic.".to_string()]
        );
        assert_eq!(
            sections["Behavior"],
            vec!["Creepers approach players silently and explode when close.".to_string()]
        );
        assert_eq!(
            sections["Drops"],
            vec!["Creepers drop gunpowder when killed by the player.".to_string()]
        );
    }

    #[test]
    fn test_extract_sections_skips_table_content() {
        let html = r#"
            <div>
                <h2>Stats</h2>
                <table><tr><td><p>This paragraph lives inside a table and must be skipped.</p></td></tr></table>
                <p>This paragraph is real section content outside the table.</p>
            </div>
        "#;

        let sections = scraper().extract_sections(html);

        assert_eq!(sections["Stats"].len(), 1);
        assert!(sections["Stats"][0].contains("outside the table"));
    }

    #[test]
    fn test_extract_sections_drops_short_blocks() {
        let html = r#"
            <div>
                <h2>Notes</h2>
                <p>Too short.</p>
                <p>This block is comfortably longer than the minimum length.</p>
            </div>
        "#;

        let sections = scraper().extract_sections(html);

        assert_eq!(sections["Notes"].len(), 1);
        assert!(sections["Notes"][0].starts_with("This block"));
    }

    #[test]
    fn test_extract_sections_list_items_collected() {
        let html = r#"
            <div>
                <h2>Uses</h2>
                <ul>
                    <li>Gunpowder is used for crafting TNT blocks</li>
                    <li>It is also used for firework rockets</li>
                </ul>
            </div>
        "#;

        let sections = scraper().extract_sections(html);

        assert_eq!(sections["Uses"].len(), 1);
        assert!(sections["Uses"][0].contains("TNT"));
        assert!(sections["Uses"][0].contains("firework"));
    }

    #[test]
    fn test_extract_sections_empty_html() {
        let sections = scraper().extract_sections("");
        assert_eq!(sections.len(), 1);
        assert!(sections["Introduction"].is_empty());
    }

    #[test]
    fn test_parse_response_shape() {
        let body = r#"{"parse":{"title":"Mobs","text":{"*":"<p>html here</p>"}}}"#;
        let parsed: ParseResponse = serde_json::from_str(body).unwrap();
        let html = parsed.parse.unwrap().text.unwrap().html.unwrap();
        assert_eq!(html, "<p>html here</p>");
    }

    #[test]
    fn test_parse_response_missing_parse_key() {
        let body = r#"{"error":{"code":"missingtitle"}}"#;
        let parsed: ParseResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.parse.is_none());
    }
}
