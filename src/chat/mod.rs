//! 챗봇 모듈 - 컨텍스트 기반 응답 생성 + 대화 루프
//!
//! 검색된 컨텍스트를 프롬프트에 삽입해 Ollama 생성 모델을 호출하고,
//! 표준 입력 기반 대화 루프를 제공합니다.
//! 어떤 에러도 대화 세션을 종료시키지 않습니다: 검색 실패는 빈
//! 컨텍스트로, 생성 실패는 인라인 에러 메시지로 처리됩니다.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::knowledge::{ContextResult, Retriever};

// ============================================================================
// GenerationProvider Trait
// ============================================================================

/// 응답 생성 프로바이더 트레이트
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// 프롬프트로부터 응답 텍스트 생성
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Ollama Generator
// ============================================================================

/// 생성 HTTP 타임아웃 (로컬 모델은 첫 토큰까지 오래 걸릴 수 있음)
const GENERATE_TIMEOUT: Duration = Duration::from_secs(300);

/// Ollama 생성 구현체
///
/// ref: https://github.com/ollama/ollama/blob/main/docs/api.md#generate-a-completion
#[derive(Debug)]
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    options: GenerateOptions,
}

/// 생성 샘플링 옵션
#[derive(Debug, Clone, Serialize)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            top_k: 40,
            top_p: 0.9,
        }
    }
}

/// Ollama 생성 요청 본문
#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

/// Ollama 생성 응답
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Ollama 에러 응답
#[derive(Debug, Deserialize)]
struct OllamaError {
    error: String,
}

impl OllamaGenerator {
    /// 새 생성기 생성
    ///
    /// # Arguments
    /// * `base_url` - Ollama 엔드포인트
    /// * `model` - 생성 모델 이름 (예: deepseek-r1:7b)
    pub fn new(base_url: String, model: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(GENERATE_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            options: GenerateOptions::default(),
        })
    }

    /// 설정에서 생성
    pub fn from_config(config: &crate::config::Config) -> Result<Self> {
        Self::new(
            config.ollama_base_url.clone(),
            config.generation_model.clone(),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

#[async_trait]
impl GenerationProvider for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: self.options.clone(),
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .context("Failed to send generation request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read generation response body")?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<OllamaError>(&body) {
                anyhow::bail!("Ollama API error ({}): {}", status, error.error);
            }
            anyhow::bail!("Ollama API error ({}): {}", status, body);
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).context("Failed to parse generation response")?;

        Ok(parsed.response)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Prompt
// ============================================================================

/// 컨텍스트 기반 프롬프트 구성
///
/// 각 컨텍스트의 page, section, content를 유사도 내림차순 그대로
/// 프롬프트에 삽입합니다. 컨텍스트 밖 답변 금지와 "모른다" 폴백
/// 지시를 포함합니다.
pub fn build_prompt(query: &str, contexts: &[ContextResult]) -> String {
    let context_str = contexts
        .iter()
        .map(|ctx| format!("From {} - {}:\n{}", ctx.page, ctx.section, ctx.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a helpful Minecraft wiki assistant. Use the following context to answer \
         the user's question accurately and concisely.\n\
         \n\
         Context:\n\
         {context_str}\n\
         \n\
         User Question: {query}\n\
         \n\
         Instructions:\n\
         - Answer based only on the provided context\n\
         - Be specific and factual about Minecraft mechanics\n\
         - If the context doesn't contain the answer, say you don't know\n\
         - Keep answers focused and game-relevant\n\
         \n\
         Answer:"
    )
}

// ============================================================================
// Chatbot
// ============================================================================

/// 위키 챗봇 - 대화형 세션
pub struct WikiChatbot {
    retriever: Retriever,
    generator: Box<dyn GenerationProvider>,
    top_k: usize,
}

impl WikiChatbot {
    /// 새 챗봇 생성
    pub fn new(retriever: Retriever, generator: Box<dyn GenerationProvider>, top_k: usize) -> Self {
        Self {
            retriever,
            generator,
            top_k,
        }
    }

    /// 대화 루프 시작
    ///
    /// quit/exit으로 종료, reset으로 초기화합니다.
    /// 검색/생성 실패는 메시지로 알리고 루프를 계속합니다.
    pub async fn chat(&self) -> Result<()> {
        println!("[*] 마인크래프트 위키 챗봇 시작");
        println!("    종료: quit 또는 exit / 초기화: reset");

        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();

        loop {
            print!("\n당신: ");
            std::io::stdout().flush().context("Failed to flush stdout")?;

            let Some(line) = lines.next_line().await? else {
                break; // EOF
            };

            let input = line.trim();
            if input.is_empty() {
                continue;
            }

            match input.to_lowercase().as_str() {
                "quit" | "exit" => break,
                "reset" => {
                    println!("[*] 대화를 초기화했습니다.");
                    continue;
                }
                _ => {}
            }

            println!("[*] 위키 검색 중...");

            // 검색 실패는 빈 컨텍스트로 폴백 (세션은 계속)
            let contexts = match self.retriever.retrieve(input, self.top_k).await {
                Ok(contexts) => contexts,
                Err(e) => {
                    tracing::error!("Retrieval failed: {}", e);
                    Vec::new()
                }
            };

            if contexts.is_empty() {
                println!("봇: 위키에서 관련 정보를 찾지 못했습니다.");
                continue;
            }

            println!("[*] 응답 생성 중...");

            let prompt = build_prompt(input, &contexts);

            match self.generator.generate(&prompt).await {
                Ok(answer) => println!("봇: {}", answer.trim()),
                Err(e) => println!("봇: 응답 생성 중 오류가 발생했습니다: {}", e),
            }
        }

        println!("[*] 챗봇을 종료합니다.");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
