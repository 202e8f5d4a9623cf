//! 저장소 모듈 - 파이프라인 산출물의 영속화 및 벡터 검색
//!
//! 세 가지 JSON 파일 스키마를 관리합니다:
//! - raw: `{페이지 → {섹션 → [텍스트 블록]}}` 위키 데이터
//! - processed: 세그먼트 목록
//! - embeddings: 임베딩 레코드 목록 (벡터 저장소)
//!
//! 벡터 저장소는 전수 스캔 코사인 유사도 검색을 제공합니다.
//! 코퍼스 규모가 작아 ANN 인덱스는 사용하지 않습니다.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use super::segmenter::Segment;

// ============================================================================
// Types
// ============================================================================

/// 섹션 제목 → 텍스트 블록 목록 (블록 순서 유지)
pub type SectionBlocks = BTreeMap<String, Vec<String>>;

/// 페이지 제목 → 섹션 맵
///
/// BTreeMap이므로 순회 순서가 키 정렬로 고정되어 재빌드 간 결정적입니다.
pub type WikiData = BTreeMap<String, SectionBlocks>;

/// 임베딩 레코드 - 벡터 저장소의 단위
///
/// `id`는 세그먼트 id의 외래키입니다. 모든 레코드의 벡터 차원은
/// 저장소 내에서 동일해야 합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    pub page: String,
    pub section: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

// ============================================================================
// Errors
// ============================================================================

/// 저장소 에러
#[derive(Debug, Error)]
pub enum StoreError {
    /// 원본/중간 데이터 파일 없음 - 빌드 단계 진행 불가
    #[error("source data not found: {path} (run `mcwiki-rag setup` first)")]
    SourceUnavailable { path: PathBuf },

    /// 임베딩 저장소가 아직 빌드되지 않음
    #[error("embedding store not built: {path} (run `mcwiki-rag setup` first)")]
    NotBuilt { path: PathBuf },

    /// 벡터 차원 불일치
    #[error("embedding dimension mismatch: expected {expected}, got {actual} (id: {id})")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        id: String,
    },

    #[error("store I/O failed")]
    Io(#[from] std::io::Error),

    #[error("store format invalid")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// File Helpers
// ============================================================================

/// JSON 파일 원자적 쓰기
///
/// 같은 디렉토리의 임시 파일에 쓴 뒤 rename으로 교체합니다.
/// 실패 시 기존 파일은 손상되지 않습니다.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(value)?;

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;

    Ok(())
}

/// JSON 파일 읽기 (파일 없음은 `missing` 에러로 매핑)
fn read_json<T: DeserializeOwned>(
    path: &Path,
    missing: impl FnOnce(PathBuf) -> StoreError,
) -> Result<T, StoreError> {
    if !path.exists() {
        return Err(missing(path.to_path_buf()));
    }

    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// 위키 데이터 저장
pub fn save_wiki_data(path: &Path, data: &WikiData) -> Result<(), StoreError> {
    write_json_atomic(path, data)
}

/// 위키 데이터 로드
///
/// 파일이 없으면 `SourceUnavailable` - 빌드 단계는 여기서 중단됩니다.
pub fn load_wiki_data(path: &Path) -> Result<WikiData, StoreError> {
    read_json(path, |path| StoreError::SourceUnavailable { path })
}

/// 세그먼트 목록 저장
pub fn save_segments(path: &Path, segments: &[Segment]) -> Result<(), StoreError> {
    write_json_atomic(path, &segments)
}

/// 세그먼트 목록 로드 (임베딩 빌드 단계 입력)
pub fn load_segments(path: &Path) -> Result<Vec<Segment>, StoreError> {
    read_json(path, |path| StoreError::SourceUnavailable { path })
}

// ============================================================================
// Cosine Similarity
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다. 영벡터 또는 차원 불일치는
/// NaN 대신 0.0을 반환해 검색이 항상 전체 함수가 되도록 합니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// VectorStore
// ============================================================================

/// 벡터 저장소 - 플랫 JSON 파일 기반
///
/// `(id, 메타데이터, 벡터)` 레코드 목록을 보관합니다.
/// 빌드 단계에서 append로 채워지고, 채팅 세션에서는 load 후
/// 읽기 전용으로 사용됩니다.
pub struct VectorStore {
    records: Vec<EmbeddingRecord>,
    path: PathBuf,
}

impl VectorStore {
    /// 빈 저장소 생성 (빌드 단계용, 파일은 append 시점에 생성)
    pub fn new(path: PathBuf) -> Self {
        Self {
            records: Vec::new(),
            path,
        }
    }

    /// 저장소 로드
    ///
    /// 파일이 없으면 `NotBuilt` - 호출자는 setup 실행을 안내해야 합니다.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let records: Vec<EmbeddingRecord> =
            read_json(path, |path| StoreError::NotBuilt { path })?;

        // 차원 균일성 검증
        if let Some(first) = records.first() {
            let expected = first.embedding.len();
            for record in &records {
                if record.embedding.len() != expected {
                    return Err(StoreError::DimensionMismatch {
                        expected,
                        actual: record.embedding.len(),
                        id: record.id.clone(),
                    });
                }
            }
        }

        tracing::debug!("Loaded {} embedding records from {:?}", records.len(), path);

        Ok(Self {
            records,
            path: path.to_path_buf(),
        })
    }

    /// 레코드 추가 및 전체 영속화
    ///
    /// 차원 균일성을 검증한 뒤 전체 컬렉션을 원자적으로 다시 씁니다.
    /// 부분 쓰기는 발생하지 않습니다.
    pub fn append(&mut self, records: Vec<EmbeddingRecord>) -> Result<usize, StoreError> {
        let expected = self
            .records
            .first()
            .or_else(|| records.first())
            .map(|r| r.embedding.len());

        if let Some(expected) = expected {
            for record in &records {
                if record.embedding.len() != expected {
                    return Err(StoreError::DimensionMismatch {
                        expected,
                        actual: record.embedding.len(),
                        id: record.id.clone(),
                    });
                }
            }
        }

        let added = records.len();
        self.records.extend(records);

        write_json_atomic(&self.path, &self.records)?;

        tracing::info!(
            "Persisted {} embedding records to {:?} (+{})",
            self.records.len(),
            self.path,
            added
        );

        Ok(added)
    }

    /// 유사도 검색 (전수 스캔)
    ///
    /// 모든 레코드와의 코사인 유사도를 계산해 내림차순 상위 `top_k`개의
    /// `(인덱스, 유사도)`를 반환합니다. `threshold` 이하는 제외하며,
    /// 동점은 저장 순서를 유지합니다 (stable sort).
    /// 빈 저장소는 에러가 아니라 빈 결과를 냅니다.
    pub fn query(&self, vector: &[f32], top_k: usize, threshold: f32) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .records
            .iter()
            .enumerate()
            .map(|(i, record)| (i, cosine_similarity(vector, &record.embedding)))
            .collect();

        // stable sort - 동점은 원래 저장 순서 유지
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        scored.retain(|&(_, similarity)| similarity > threshold);
        scored.truncate(top_k);

        scored
    }

    /// 인덱스로 레코드 조회
    pub fn record(&self, index: usize) -> Option<&EmbeddingRecord> {
        self.records.get(index)
    }

    /// 전체 레코드 접근
    pub fn records(&self) -> &[EmbeddingRecord] {
        &self.records
    }

    /// 레코드 수
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 저장소가 비어있는지 여부
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 벡터 차원 (빈 저장소는 None)
    pub fn dimension(&self) -> Option<usize> {
        self.records.first().map(|r| r.embedding.len())
    }

    /// 저장 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str, embedding: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            id: id.to_string(),
            page: "Mobs".to_string(),
            section: "Hostile".to_string(),
            content: format!("content for {}", id),
            embedding,
        }
    }

    #[test]
    fn test_append_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("embeddings").join("wiki_embeddings.json");

        let records = vec![
            record("Mobs_Hostile_0", vec![0.1, 0.2, 0.3]),
            record("Mobs_Hostile_1", vec![0.4, 0.5, 0.6]),
        ];

        let mut store = VectorStore::new(path.clone());
        let added = store.append(records.clone()).unwrap();
        assert_eq!(added, 2);

        let loaded = VectorStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);

        for (original, loaded) in records.iter().zip(loaded.records()) {
            assert_eq!(original.id, loaded.id);
            assert_eq!(original.page, loaded.page);
            assert_eq!(original.section, loaded.section);
            assert_eq!(original.content, loaded.content);
            for (a, b) in original.embedding.iter().zip(&loaded.embedding) {
                assert!((a - b).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_load_not_built() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.json");

        let result = VectorStore::load(&path);
        assert!(matches!(result, Err(StoreError::NotBuilt { .. })));
    }

    #[test]
    fn test_append_rejects_dimension_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        let mut store = VectorStore::new(path);
        store.append(vec![record("a", vec![1.0, 0.0])]).unwrap();

        let result = store.append(vec![record("b", vec![1.0, 0.0, 0.0])]);
        assert!(matches!(
            result,
            Err(StoreError::DimensionMismatch {
                expected: 2,
                actual: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_query_empty_store() {
        let store = VectorStore::new(PathBuf::from("/nonexistent/store.json"));
        let results = store.query(&[1.0, 0.0], 3, 0.1);
        assert!(results.is_empty());
    }

    #[test]
    fn test_query_orders_descending_and_bounds_top_k() {
        let dir = TempDir::new().unwrap();
        let mut store = VectorStore::new(dir.path().join("store.json"));
        store
            .append(vec![
                record("a", vec![1.0, 0.0]), // sim 1.0
                record("b", vec![0.0, 1.0]), // sim 0.0
                record("c", vec![1.0, 1.0]), // sim ~0.707
                record("d", vec![1.0, 0.1]), // sim ~0.995
            ])
            .unwrap();

        let results = store.query(&[1.0, 0.0], 2, 0.1);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 0);
        assert_eq!(results[1].0, 3);
        assert!(results[0].1 >= results[1].1);
    }

    #[test]
    fn test_query_excludes_at_or_below_threshold() {
        let dir = TempDir::new().unwrap();
        let mut store = VectorStore::new(dir.path().join("store.json"));
        store
            .append(vec![
                record("a", vec![1.0, 0.0]), // sim 1.0
                record("b", vec![0.0, 1.0]), // sim 0.0 - 임계값 이하
            ])
            .unwrap();

        // threshold와 정확히 같은 유사도도 제외
        let results = store.query(&[1.0, 0.0], 10, 0.0);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, 0);

        let results = store.query(&[1.0, 0.0], 10, 1.0);
        assert!(results.is_empty());
    }

    #[test]
    fn test_query_ties_keep_storage_order() {
        let dir = TempDir::new().unwrap();
        let mut store = VectorStore::new(dir.path().join("store.json"));
        store
            .append(vec![
                record("first", vec![1.0, 0.0]),
                record("second", vec![2.0, 0.0]), // 같은 방향 = 같은 유사도
                record("third", vec![3.0, 0.0]),
            ])
            .unwrap();

        let results = store.query(&[1.0, 0.0], 3, 0.1);
        let indices: Vec<usize> = results.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_query_zero_vector_is_total() {
        let dir = TempDir::new().unwrap();
        let mut store = VectorStore::new(dir.path().join("store.json"));
        store
            .append(vec![record("a", vec![1.0, 0.0]), record("z", vec![0.0, 0.0])])
            .unwrap();

        // 영벡터 쿼리: 모든 유사도 0.0, NaN 없음, 임계값에 걸러짐
        let results = store.query(&[0.0, 0.0], 10, 0.1);
        assert!(results.is_empty());

        // 저장된 영벡터도 0.0으로 처리됨
        let results = store.query(&[1.0, 0.0], 10, -1.0);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, s)| s.is_finite()));
    }

    #[test]
    fn test_cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_wiki_data_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("raw").join("all_wiki_data.json");

        let mut sections = SectionBlocks::new();
        sections.insert(
            "Introduction".to_string(),
            vec!["First block.".to_string(), "Second block.".to_string()],
        );

        let mut data = WikiData::new();
        data.insert("Mobs".to_string(), sections);

        save_wiki_data(&path, &data).unwrap();
        let loaded = load_wiki_data(&path).unwrap();
        assert_eq!(loaded, data);
    }

    #[test]
    fn test_load_wiki_data_missing() {
        let result = load_wiki_data(Path::new("/nonexistent/raw.json"));
        assert!(matches!(result, Err(StoreError::SourceUnavailable { .. })));
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        let mut store = VectorStore::new(path.clone());
        store.append(vec![record("a", vec![1.0])]).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
