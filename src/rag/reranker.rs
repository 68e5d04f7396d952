//! Second-pass relevance scoring of retrieval candidates
//!
//! Rerankers score each passage against the query independently of the
//! vector store's similarity metric.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::AppConfig;
use crate::config::RerankerKind;
use crate::errors::LuminaError;
use crate::errors::Result;
use crate::models::Candidate;
use crate::models::ScoreSource;

/// Scores passages for relevance to a query; higher is more relevant
#[async_trait]
pub trait Reranker: Send + Sync {
    /// One score per passage, in passage order
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>>;

    /// Recorded on every candidate this reranker scores
    fn score_source(&self) -> ScoreSource;
}

/// Score `candidates` against `query`, sort descending, keep `top_k`
///
/// The sort is stable: equal scores keep their incoming (vector similarity)
/// order.
pub async fn rerank_candidates(
    reranker: &dyn Reranker,
    query: &str,
    candidates: Vec<Candidate>,
    top_k: usize,
) -> Result<Vec<Candidate>> {
    if candidates.is_empty() || top_k == 0 {
        return Ok(Vec::new());
    }

    let passages: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
    let scores = reranker.score(query, &passages).await?;
    if scores.len() != candidates.len() {
        return Err(LuminaError::Rerank(format!(
            "reranker returned {} scores for {} passages",
            scores.len(),
            candidates.len()
        )));
    }

    let score_source = reranker.score_source();
    let mut ranked: Vec<Candidate> = candidates
        .into_iter()
        .zip(scores)
        .map(|(candidate, score)| Candidate {
            relevance_score: score,
            score_source,
            ..candidate
        })
        .collect();

    ranked.sort_by(|a, b| descending(a.relevance_score, b.relevance_score));
    ranked.truncate(top_k);

    debug!("Reranked to {} candidates", ranked.len());
    Ok(ranked)
}

fn descending(a: f32, b: f32) -> Ordering {
    b.total_cmp(&a)
}

/// Deterministic term-overlap scorer
///
/// BM25-style saturation over the candidate pool: a query term contributes
/// more when it is rare across the passages being reranked.
#[derive(Debug, Clone)]
pub struct LexicalReranker {
    k1: f32,
    b: f32,
}

impl Default for LexicalReranker {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

impl LexicalReranker {
    pub fn new() -> Self {
        Self::default()
    }

    fn score_all(&self, query: &str, passages: &[String]) -> Vec<f32> {
        let query_terms: HashSet<String> = tokenize(query).collect();
        if query_terms.is_empty() || passages.is_empty() {
            return vec![0.0; passages.len()];
        }

        let docs: Vec<Vec<String>> = passages.iter().map(|p| tokenize(p).collect()).collect();
        let n = docs.len() as f32;
        let avg_len = docs.iter().map(Vec::len).sum::<usize>() as f32 / n;

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for doc in &docs {
            let unique: HashSet<&str> = doc.iter().map(String::as_str).collect();
            for term in unique {
                if query_terms.contains(term) {
                    *doc_freq.entry(term).or_default() += 1;
                }
            }
        }

        docs.iter()
            .map(|doc| {
                let mut tf: HashMap<&str, usize> = HashMap::new();
                for term in doc {
                    if query_terms.contains(term.as_str()) {
                        *tf.entry(term.as_str()).or_default() += 1;
                    }
                }

                let len_norm = if avg_len > 0.0 {
                    doc.len() as f32 / avg_len
                } else {
                    1.0
                };

                tf.iter()
                    .map(|(term, &count)| {
                        let df = doc_freq.get(term).copied().unwrap_or(0) as f32;
                        let idf = ((n - df + 0.5) / (df + 0.5)).ln_1p();
                        let count = count as f32;
                        idf * (count * (self.k1 + 1.0))
                            / (count + self.k1 * (1.0 - self.b + self.b * len_norm))
                    })
                    .sum()
            })
            .collect()
    }
}

/// Lowercased alphanumeric terms
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl Reranker for LexicalReranker {
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        Ok(self.score_all(query, passages))
    }

    fn score_source(&self) -> ScoreSource {
        ScoreSource::Lexical
    }
}

/// Build the reranker selected by `[retrieval] reranker`
pub fn build_reranker(config: &AppConfig) -> Result<Arc<dyn Reranker>> {
    match config.retrieval.reranker {
        RerankerKind::Lexical => Ok(Arc::new(LexicalReranker::new())),
        #[cfg(feature = "cross-encoder")]
        RerankerKind::CrossEncoder => Ok(Arc::new(CrossEncoderReranker::new(
            config.retrieval.rerank_model.as_deref(),
        )?)),
        #[cfg(not(feature = "cross-encoder"))]
        RerankerKind::CrossEncoder => Err(LuminaError::Config(
            "cross-encoder reranker requires building with --features cross-encoder".to_string(),
        )),
    }
}

#[cfg(feature = "cross-encoder")]
pub use cross_encoder::CrossEncoderReranker;

#[cfg(feature = "cross-encoder")]
mod cross_encoder {
    use std::sync::Arc;

    use async_trait::async_trait;
    use fastembed::RerankInitOptions;
    use fastembed::RerankerModel;
    use fastembed::TextRerank;
    use tracing::info;

    use super::Reranker;
    use crate::errors::LuminaError;
    use crate::errors::Result;
    use crate::models::ScoreSource;

    /// Local ONNX cross-encoder run on the blocking thread pool
    pub struct CrossEncoderReranker {
        model: Arc<TextRerank>,
    }

    impl CrossEncoderReranker {
        /// Load (downloading on first use) the named reranker model
        pub fn new(model_name: Option<&str>) -> Result<Self> {
            let model = match model_name {
                None | Some("jina-reranker-v1-turbo-en") => RerankerModel::JINARerankerV1TurboEn,
                Some("bge-reranker-base") => RerankerModel::BGERerankerBase,
                Some(other) => {
                    return Err(LuminaError::Config(format!(
                        "unknown rerank model: {other}"
                    )))
                }
            };
            info!("Loading cross-encoder reranker {:?}", model);

            let reranker = TextRerank::try_new(RerankInitOptions::new(model))
                .map_err(|e| LuminaError::Rerank(e.to_string()))?;
            Ok(Self {
                model: Arc::new(reranker),
            })
        }
    }

    #[async_trait]
    impl Reranker for CrossEncoderReranker {
        async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
            let model = Arc::clone(&self.model);
            let query = query.to_string();
            let documents = passages.to_vec();
            let count = documents.len();

            let results = tokio::task::spawn_blocking(move || {
                model.rerank(query, documents, false, None)
            })
            .await
            .map_err(|e| LuminaError::Rerank(e.to_string()))?
            .map_err(|e| LuminaError::Rerank(e.to_string()))?;

            // Results come back sorted by score; put them back in passage order
            let mut scores = vec![f32::NEG_INFINITY; count];
            for result in results {
                if let Some(slot) = scores.get_mut(result.index) {
                    *slot = result.score;
                }
            }
            Ok(scores)
        }

        fn score_source(&self) -> ScoreSource {
            ScoreSource::CrossEncoder
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        #[ignore = "Downloads the ONNX reranker model"]
        async fn test_scores_follow_passage_order() {
            let reranker = CrossEncoderReranker::new(None).unwrap();
            let passages = vec![
                "Bananas are yellow and rich in potassium.".to_string(),
                "The sky appears blue because of Rayleigh scattering.".to_string(),
                "The stock market closed higher on Friday.".to_string(),
            ];

            let scores = reranker
                .score("Why is the sky blue?", &passages)
                .await
                .unwrap();

            assert_eq!(scores.len(), passages.len());
            assert!(scores.iter().all(|s| s.is_finite()));
            assert!(scores[1] > scores[0]);
            assert!(scores[1] > scores[2]);
            assert_eq!(reranker.score_source(), ScoreSource::CrossEncoder);
        }

        #[test]
        fn test_unknown_model_is_config_error() {
            let result = CrossEncoderReranker::new(Some("no-such-model"));
            assert!(matches!(result, Err(LuminaError::Config(_))));
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::models::RecordMetadata;

    fn candidate(text: &str, similarity: f32) -> Candidate {
        Candidate {
            id: Uuid::new_v4(),
            text: text.to_string(),
            metadata: RecordMetadata {
                source: "doc".to_string(),
                chunk_index: 0,
            },
            relevance_score: similarity,
            score_source: ScoreSource::VectorSimilarity,
        }
    }

    /// Scores by the leading number in each passage
    struct NumericReranker;

    #[async_trait]
    impl Reranker for NumericReranker {
        async fn score(&self, _query: &str, passages: &[String]) -> Result<Vec<f32>> {
            Ok(passages
                .iter()
                .map(|p| {
                    p.split_whitespace()
                        .next()
                        .and_then(|n| n.parse().ok())
                        .unwrap_or(0.0)
                })
                .collect())
        }

        fn score_source(&self) -> ScoreSource {
            ScoreSource::CrossEncoder
        }
    }

    struct BrokenReranker;

    #[async_trait]
    impl Reranker for BrokenReranker {
        async fn score(&self, _query: &str, _passages: &[String]) -> Result<Vec<f32>> {
            Ok(vec![1.0])
        }

        fn score_source(&self) -> ScoreSource {
            ScoreSource::CrossEncoder
        }
    }

    fn texts(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.text.as_str()).collect()
    }

    #[tokio::test]
    async fn test_sorts_descending_and_truncates() {
        let candidates = vec![
            candidate("1 low", 0.9),
            candidate("3 high", 0.8),
            candidate("2 mid", 0.7),
        ];

        let ranked = rerank_candidates(&NumericReranker, "q", candidates, 2)
            .await
            .unwrap();

        assert_eq!(texts(&ranked), vec!["3 high", "2 mid"]);
        assert!(ranked
            .iter()
            .all(|c| c.score_source == ScoreSource::CrossEncoder));
        assert!((ranked[0].relevance_score - 3.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_ties_keep_similarity_order() {
        let candidates = vec![
            candidate("5 first", 0.9),
            candidate("5 second", 0.8),
            candidate("7 top", 0.6),
            candidate("5 third", 0.55),
        ];

        let ranked = rerank_candidates(&NumericReranker, "q", candidates, 10)
            .await
            .unwrap();

        assert_eq!(texts(&ranked), vec!["7 top", "5 first", "5 second", "5 third"]);
    }

    #[tokio::test]
    async fn test_reranking_sorted_list_is_idempotent() {
        let candidates = vec![
            candidate("9 a", 0.6),
            candidate("4 b", 0.9),
            candidate("4 c", 0.7),
            candidate("1 d", 0.8),
        ];

        let once = rerank_candidates(&NumericReranker, "q", candidates, 10)
            .await
            .unwrap();
        let twice = rerank_candidates(&NumericReranker, "q", once.clone(), 10)
            .await
            .unwrap();

        assert_eq!(texts(&once), texts(&twice));
    }

    #[tokio::test]
    async fn test_score_count_mismatch_is_error() {
        let candidates = vec![candidate("a", 0.9), candidate("b", 0.8)];
        let result = rerank_candidates(&BrokenReranker, "q", candidates, 5).await;
        assert!(matches!(result, Err(LuminaError::Rerank(_))));
    }

    #[tokio::test]
    async fn test_empty_pool() {
        let ranked = rerank_candidates(&NumericReranker, "q", Vec::new(), 5)
            .await
            .unwrap();
        assert!(ranked.is_empty());
    }

    #[tokio::test]
    async fn test_lexical_prefers_matching_passages() {
        let reranker = LexicalReranker::new();
        let passages = vec![
            "Bananas are yellow and rich in potassium.".to_string(),
            "The sky is blue because of Rayleigh scattering.".to_string(),
            "Grass is green.".to_string(),
        ];

        let scores = reranker
            .score("What color is the sky?", &passages)
            .await
            .unwrap();

        assert_eq!(scores.len(), 3);
        assert!(scores[1] > scores[0]);
        assert!(scores[1] > scores[2]);
    }

    #[tokio::test]
    async fn test_lexical_is_deterministic() {
        let reranker = LexicalReranker::new();
        let passages = vec!["alpha beta".to_string(), "beta gamma beta".to_string()];
        let first = reranker.score("beta", &passages).await.unwrap();
        let second = reranker.score("beta", &passages).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_lexical_scores_are_labelled_lexical() {
        let candidates = vec![candidate("The sky is blue.", 0.9)];

        let ranked = rerank_candidates(&LexicalReranker::new(), "sky", candidates, 5)
            .await
            .unwrap();

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].score_source, ScoreSource::Lexical);
        assert_ne!(ranked[0].score_source, ScoreSource::CrossEncoder);
    }

    #[test]
    fn test_build_lexical_reranker() {
        let mut config = AppConfig::default();
        config.retrieval.reranker = RerankerKind::Lexical;
        let reranker = build_reranker(&config).unwrap();
        assert_eq!(reranker.score_source(), ScoreSource::Lexical);
    }

    #[cfg(not(feature = "cross-encoder"))]
    #[test]
    fn test_cross_encoder_requires_feature() {
        let mut config = AppConfig::default();
        config.retrieval.reranker = RerankerKind::CrossEncoder;
        assert!(matches!(build_reranker(&config), Err(LuminaError::Config(_))));
    }

    #[tokio::test]
    async fn test_lexical_empty_query_scores_zero() {
        let reranker = LexicalReranker::new();
        let passages = vec!["anything".to_string()];
        assert_eq!(reranker.score("?!", &passages).await.unwrap(), vec![0.0]);
    }
}
