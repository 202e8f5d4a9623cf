//! CLI 모듈
//!
//! mcwiki-rag CLI 명령어 정의 및 구현

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::chat::{OllamaGenerator, WikiChatbot};
use crate::config::Config;
use crate::embedding::{generate_embeddings, OllamaEmbedding};
use crate::knowledge::{
    load_segments, load_wiki_data, save_segments, save_wiki_data, RetrievalError, Retriever,
    SegmentConfig, Segmenter, StoreError, VectorStore,
};
use crate::scraper::WikiScraper;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "mcwiki-rag")]
#[command(version, about = "마인크래프트 위키 RAG 챗봇", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 위키 수집 → 세그먼트 분할 → 임베딩 생성
    Setup {
        /// 수집 단계 건너뛰기 (기존 raw 데이터 재사용)
        #[arg(long)]
        skip_scrape: bool,

        /// 데이터 디렉토리
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// 대화형 챗봇 시작
    Chat {
        /// 데이터 디렉토리
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// 단발 검색 (검색 품질 확인용)
    Query {
        /// 검색 쿼리
        query: String,

        /// 결과 개수
        #[arg(short, long, default_value = "3")]
        top_k: usize,

        /// 데이터 디렉토리
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// 상태 확인
    Status {
        /// 데이터 디렉토리
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Setup {
            skip_scrape,
            data_dir,
        } => cmd_setup(make_config(data_dir), skip_scrape).await,
        Commands::Chat { data_dir } => cmd_chat(make_config(data_dir)).await,
        Commands::Query {
            query,
            top_k,
            data_dir,
        } => cmd_query(make_config(data_dir), &query, top_k).await,
        Commands::Status { data_dir } => cmd_status(make_config(data_dir)).await,
    }
}

/// 설정 구성 (환경변수 반영 + data_dir 오버라이드)
fn make_config(data_dir: Option<PathBuf>) -> Config {
    let mut config = Config::from_env();
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    config
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 셋업 명령어 (setup)
///
/// 위키 수집, 세그먼트 분할, 임베딩 생성을 순서대로 수행합니다.
/// 개별 세그먼트의 임베딩 실패는 건너뛰고, 원본 데이터 부재 등
/// 빌드를 진행할 수 없는 경우에만 중단합니다.
async fn cmd_setup(config: Config, skip_scrape: bool) -> Result<()> {
    println!("[*] 마인크래프트 위키 챗봇 셋업");

    // 1단계: 위키 데이터 수집
    println!("[*] 1단계: 위키 데이터 수집");

    let wiki_data = if skip_scrape {
        println!("    수집 단계 건너뜀 (기존 데이터 사용)");
        load_wiki_data(&config.raw_data_path()).context("기존 위키 데이터 로드 실패")?
    } else {
        let scraper =
            WikiScraper::new(config.wiki_base_url.clone()).context("WikiScraper 생성 실패")?;

        let data = scraper.scrape_all(&config.wiki_pages).await;
        if data.is_empty() {
            bail!("수집된 페이지가 없습니다. 네트워크 상태를 확인하세요.");
        }

        save_wiki_data(&config.raw_data_path(), &data).context("위키 데이터 저장 실패")?;
        println!("    {} 페이지 수집 완료", data.len());
        data
    };

    // 2단계: 세그먼트 분할
    println!("[*] 2단계: 텍스트 세그먼트 분할");

    let segmenter = Segmenter::new(SegmentConfig::from_config(&config));
    let segments = segmenter.segment_all(&wiki_data);

    if segments.is_empty() {
        bail!("생성된 세그먼트가 없습니다. 수집된 데이터를 확인하세요.");
    }

    save_segments(&config.segments_path(), &segments).context("세그먼트 저장 실패")?;
    println!("    {} 세그먼트 생성 완료", segments.len());

    // 3단계: 임베딩 생성
    println!("[*] 3단계: 임베딩 생성 ({} 세그먼트)", segments.len());

    let embedder = OllamaEmbedding::from_config(&config).context("임베딩 프로바이더 생성 실패")?;
    let (records, skipped) = generate_embeddings(&embedder, &segments).await;

    if records.is_empty() {
        bail!(
            "모든 세그먼트의 임베딩 생성에 실패했습니다. \
             Ollama 서버({})와 모델({})을 확인하세요.",
            config.ollama_base_url,
            config.embedding_model
        );
    }

    let mut store = VectorStore::new(config.embeddings_path());
    let added = store.append(records).context("임베딩 저장소 쓰기 실패")?;

    println!("    {} 임베딩 저장 완료", added);
    if skipped > 0 {
        println!("[!] {} 세그먼트는 임베딩 실패로 건너뜀", skipped);
    }

    println!("[OK] 셋업 완료");
    Ok(())
}

/// 챗봇 명령어 (chat)
async fn cmd_chat(config: Config) -> Result<()> {
    let store = match VectorStore::load(&config.embeddings_path()) {
        Ok(store) => store,
        Err(StoreError::NotBuilt { .. }) => {
            println!("[!] 임베딩 저장소가 없습니다.");
            println!("    먼저 실행하세요: mcwiki-rag setup");
            return Ok(());
        }
        Err(e) => return Err(e).context("임베딩 저장소 로드 실패"),
    };

    println!(
        "[*] 임베딩 저장소 로드 완료 ({} 레코드, 차원 {})",
        store.len(),
        store.dimension().unwrap_or(0)
    );

    let embedder = OllamaEmbedding::from_config(&config).context("임베딩 프로바이더 생성 실패")?;
    let generator = OllamaGenerator::from_config(&config).context("생성 프로바이더 생성 실패")?;

    let retriever = Retriever::new(store, Box::new(embedder), config.similarity_threshold);
    let chatbot = WikiChatbot::new(retriever, Box::new(generator), config.top_k);

    chatbot.chat().await
}

/// 검색 명령어 (query)
///
/// 생성 단계 없이 검색 결과만 출력합니다.
async fn cmd_query(config: Config, query: &str, top_k: usize) -> Result<()> {
    let store = match VectorStore::load(&config.embeddings_path()) {
        Ok(store) => store,
        Err(StoreError::NotBuilt { .. }) => {
            println!("[!] 임베딩 저장소가 없습니다.");
            println!("    먼저 실행하세요: mcwiki-rag setup");
            return Ok(());
        }
        Err(e) => return Err(e).context("임베딩 저장소 로드 실패"),
    };

    println!("[*] 검색 중: \"{}\"", query);

    let embedder = OllamaEmbedding::from_config(&config).context("임베딩 프로바이더 생성 실패")?;
    let retriever = Retriever::new(store, Box::new(embedder), config.similarity_threshold);

    let contexts = match retriever.retrieve(query, top_k).await {
        Ok(contexts) => contexts,
        Err(RetrievalError::Embedding { source }) => {
            println!("[!] 쿼리 임베딩 실패: {}", source);
            println!("    Ollama 서버({})를 확인하세요.", config.ollama_base_url);
            return Ok(());
        }
    };

    if contexts.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", contexts.len());

    for (i, context) in contexts.iter().enumerate() {
        println!(
            "{}. [유사도: {:.4}] {} - {}",
            i + 1,
            context.similarity,
            context.page,
            context.section
        );
        println!("   {}", truncate_text(&context.content, 200));
        println!();
    }

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(config: Config) -> Result<()> {
    println!("mcwiki-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());
    println!("[*] Ollama 엔드포인트: {}", config.ollama_base_url);
    println!(
        "[*] 모델: 생성 {} / 임베딩 {}",
        config.generation_model, config.embedding_model
    );
    println!();

    // 원본 데이터
    match load_wiki_data(&config.raw_data_path()) {
        Ok(data) => println!("[OK] 위키 데이터: {} 페이지", data.len()),
        Err(StoreError::SourceUnavailable { .. }) => println!("[!] 위키 데이터: 없음"),
        Err(e) => println!("[!] 위키 데이터 읽기 실패: {}", e),
    }

    // 세그먼트
    match load_segments(&config.segments_path()) {
        Ok(segments) => println!("[OK] 세그먼트: {} 건", segments.len()),
        Err(StoreError::SourceUnavailable { .. }) => println!("[!] 세그먼트: 없음"),
        Err(e) => println!("[!] 세그먼트 읽기 실패: {}", e),
    }

    // 임베딩 저장소
    match VectorStore::load(&config.embeddings_path()) {
        Ok(store) => println!(
            "[OK] 임베딩 저장소: {} 레코드 (차원 {})",
            store.len(),
            store.dimension().unwrap_or(0)
        ),
        Err(StoreError::NotBuilt { .. }) => {
            println!("[!] 임베딩 저장소: 미생성 (setup 실행 필요)")
        }
        Err(e) => println!("[!] 임베딩 저장소 읽기 실패: {}", e),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

// ============================================================================
// Tests
// ============================================================================
