//! Recommendation Orchestrator
//!
//! Two-phase pipeline per request:
//!
//! 1. embed the query, over-fetch `top_k * over_fetch_factor` hits from the
//!    index, drop hits below the similarity threshold, truncate to `top_k`;
//! 2. enrich, score and explain only the survivors, then sort by the
//!    reported score.
//!
//! Enrichment and rationale failures degrade to fallbacks here and nowhere
//! else. Embedding failures fail the request.

use crate::config::RecommenderConfig;
use crate::embedding::EmbeddingModel;
use crate::encoder::QueryEncoder;
use crate::error::Result;
use crate::generation::RationaleGenerator;
use crate::source::{EnrichmentSource, NoEnrichment};
use crate::store::EntityStore;
use futures_util::future::join_all;
use resrank_core::index::Hit;
use resrank_core::EntityRecord;
use resrank_scoring::{
    fallback_rationale, CandidateScorer, EnrichmentContext, QueryTokens, RationalePrompt,
    RationaleSource, Recommendation, RecommendationStats, ScoredCandidate,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Keep hits whose similarity is at least `threshold`, preserving order.
pub fn apply_threshold(hits: Vec<Hit>, threshold: f32) -> Vec<Hit> {
    hits.into_iter().filter(|h| h.similarity >= threshold).collect()
}

pub struct Recommender {
    store: Arc<EntityStore>,
    encoder: QueryEncoder,
    enrichment: Arc<dyn EnrichmentSource>,
    generator: Option<Arc<dyn RationaleGenerator>>,
    scorer: CandidateScorer,
    config: RecommenderConfig,
}

impl Recommender {
    /// Fails when the configuration is invalid or no embedding model is
    /// given; both are startup errors.
    pub fn new(
        store: Arc<EntityStore>,
        model: Option<Arc<dyn EmbeddingModel>>,
        config: RecommenderConfig,
    ) -> Result<Self> {
        config.validate()?;
        let encoder =
            QueryEncoder::new(model, store.snapshot().dim())?.with_timeout(config.embed_timeout);
        let scorer = CandidateScorer::new(config.scoring_weights(), config.language_priority());
        Ok(Self {
            store,
            encoder,
            enrichment: Arc::new(NoEnrichment),
            generator: None,
            scorer,
            config,
        })
    }

    pub fn with_enrichment(mut self, source: Arc<dyn EnrichmentSource>) -> Self {
        self.enrichment = source;
        self
    }

    /// Without a generator every rationale comes from the template.
    pub fn with_generator(mut self, generator: Arc<dyn RationaleGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    pub fn encoder(&self) -> &QueryEncoder {
        &self.encoder
    }

    /// Ranked recommendations for `query`; `top_k` defaults to the
    /// configured value.
    pub async fn recommend(&self, query: &str, top_k: Option<usize>) -> Result<Vec<Recommendation>> {
        self.recommend_with_stats(query, top_k)
            .await
            .map(|(results, _)| results)
    }

    pub async fn recommend_with_stats(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<(Vec<Recommendation>, RecommendationStats)> {
        let start = Instant::now();
        let top_k = top_k.unwrap_or(self.config.top_k);
        if query.trim().is_empty() || top_k == 0 {
            return Ok((Vec::new(), RecommendationStats::compute(&[], 0, 0)));
        }

        // One snapshot for the whole request, even if a reload lands meanwhile.
        let catalog = self.store.snapshot();
        let vector = self.encoder.encode_to(query, catalog.dim()).await?;

        let hits = catalog.index().query(&vector, self.config.fetch_size(top_k))?;
        let candidates_count = hits.len();
        let mut eligible = apply_threshold(hits, self.config.similarity_threshold);
        let eligible_count = eligible.len();
        eligible.truncate(top_k);
        debug!(
            candidates = candidates_count,
            eligible = eligible_count,
            threshold = self.config.similarity_threshold,
            "Coarse filter done"
        );

        let tokens = QueryTokens::parse(query);
        let pending = eligible.iter().filter_map(|hit| {
            catalog
                .entity_at(hit.position)
                .map(|entity| self.explain(query, &tokens, entity, hit.similarity))
        });
        let mut results: Vec<Recommendation> = join_all(pending).await;

        // Stable: equal scores keep similarity order from the coarse filter.
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);

        let stats = RecommendationStats::compute(&results, candidates_count, eligible_count);
        info!(
            top_k,
            candidates = stats.candidates_count,
            eligible = stats.eligible_count,
            results = stats.results_count,
            best_score = stats.best_score,
            fallback_rationales = stats.fallback_rationales,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Recommendation complete"
        );
        Ok((results, stats))
    }

    async fn explain(
        &self,
        query: &str,
        tokens: &QueryTokens,
        entity: &EntityRecord,
        similarity: f32,
    ) -> Recommendation {
        let context = self.fetch_context(entity).await;
        let candidate = self.scorer.score(
            &entity.id,
            &entity.display_name,
            &entity.keywords,
            similarity,
            tokens,
            context,
        );
        let (rationale, source) = self.rationale(query, tokens, &candidate).await;
        Recommendation::from_candidate(candidate, rationale, source, self.config.top_documents)
    }

    async fn fetch_context(&self, entity: &EntityRecord) -> EnrichmentContext {
        let limit = self.config.enrichment_limit;
        let lookup = self.enrichment.documents(&entity.id, limit);
        match timeout(self.config.enrichment_timeout, lookup).await {
            Ok(Ok(mut documents)) => {
                documents.truncate(limit);
                EnrichmentContext::new(documents)
            }
            Ok(Err(e)) => {
                warn!(entity_id = %entity.id, source = self.enrichment.name(), error = %e,
                    "Enrichment lookup failed, scoring without documents");
                EnrichmentContext::empty()
            }
            Err(_) => {
                warn!(entity_id = %entity.id, source = self.enrichment.name(),
                    after_ms = self.config.enrichment_timeout.as_millis() as u64,
                    "Enrichment lookup timed out, scoring without documents");
                EnrichmentContext::empty()
            }
        }
    }

    async fn rationale(
        &self,
        query: &str,
        tokens: &QueryTokens,
        candidate: &ScoredCandidate,
    ) -> (String, RationaleSource) {
        let Some(generator) = &self.generator else {
            return (fallback_rationale(candidate, tokens), RationaleSource::Fallback);
        };

        let prompt = RationalePrompt::for_candidate(
            query,
            candidate,
            &self.config.rationale_language,
            self.config.rationale_max_chars,
        );
        match timeout(self.config.rationale_timeout, generator.generate(&prompt)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                return (text.trim().to_string(), RationaleSource::Generated)
            }
            Ok(Ok(_)) => {
                warn!(entity_id = %candidate.entity_id, generator = generator.name(),
                    "Generator returned no text, using fallback rationale");
            }
            Ok(Err(e)) => {
                warn!(entity_id = %candidate.entity_id, generator = generator.name(), error = %e,
                    "Rationale generation failed, using fallback rationale");
            }
            Err(_) => {
                warn!(entity_id = %candidate.entity_id, generator = generator.name(),
                    after_ms = self.config.rationale_timeout.as_millis() as u64,
                    "Rationale generation timed out, using fallback rationale");
            }
        }
        (fallback_rationale(candidate, tokens), RationaleSource::Fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;
    use crate::error::Error;
    use crate::generation::GenerationError;
    use crate::source::{InMemoryEnrichmentSource, InMemoryEntitySource, SourceError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use resrank_core::{EntityId, IndexOptions, KeywordSets, Vector};
    use resrank_scoring::EnrichmentDocument;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Returns the vector registered for a query, or a fixed default.
    struct TableModel {
        table: HashMap<String, Vec<f32>>,
        default: Vec<f32>,
        calls: AtomicUsize,
    }

    impl TableModel {
        fn new(default: Vec<f32>) -> Self {
            Self {
                table: HashMap::new(),
                default,
                calls: AtomicUsize::new(0),
            }
        }

        fn with(mut self, query: &str, vector: Vec<f32>) -> Self {
            self.table.insert(query.to_string(), vector);
            self
        }
    }

    #[async_trait]
    impl EmbeddingModel for TableModel {
        async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.table.get(text).cloned().unwrap_or_else(|| self.default.clone()))
        }

        fn model_name(&self) -> &str {
            "table"
        }
    }

    struct FailingModel;

    #[async_trait]
    impl EmbeddingModel for FailingModel {
        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::Api("503 Service Unavailable".into()))
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    enum GeneratorBehavior {
        Echo,
        Fail,
        Empty,
        Hang,
    }

    struct FakeGenerator {
        behavior: GeneratorBehavior,
        prompts: Mutex<Vec<RationalePrompt>>,
    }

    impl FakeGenerator {
        fn new(behavior: GeneratorBehavior) -> Self {
            Self {
                behavior,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RationaleGenerator for FakeGenerator {
        async fn generate(
            &self,
            prompt: &RationalePrompt,
        ) -> std::result::Result<String, GenerationError> {
            self.prompts.lock().push(prompt.clone());
            match self.behavior {
                GeneratorBehavior::Echo => Ok(format!("{} fits the request.", prompt.entity_name)),
                GeneratorBehavior::Fail => Err(GenerationError::Api("429".into())),
                GeneratorBehavior::Empty => Ok("   ".to_string()),
                GeneratorBehavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok("too late".to_string())
                }
            }
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    struct BrokenEnrichment;

    #[async_trait]
    impl EnrichmentSource for BrokenEnrichment {
        async fn documents(
            &self,
            _entity_id: &EntityId,
            _limit: usize,
        ) -> std::result::Result<Vec<EnrichmentDocument>, SourceError> {
            Err(SourceError::Unavailable("database down".into()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn entity(id: &str, embedding: Vec<f32>, primary: &[&str], secondary: &[&str]) -> EntityRecord {
        EntityRecord::new(
            id,
            format!("Dr. {}", id),
            Vector::new(embedding),
            KeywordSets::new(
                primary.iter().map(|s| s.to_string()).collect(),
                secondary.iter().map(|s| s.to_string()).collect(),
            ),
        )
    }

    fn three_entity_store() -> Arc<EntityStore> {
        let records = vec![
            entity("e0", vec![1.0, 0.0], &["battery", "electrolyte"], &[]),
            entity("e1", vec![0.0, 1.0], &["poetry"], &[]),
            entity("e2", vec![0.7, 0.7], &[], &["battery"]),
        ];
        Arc::new(
            EntityStore::init(
                Arc::new(InMemoryEntitySource::new(records)),
                IndexOptions::exact(),
            )
            .unwrap(),
        )
    }

    fn config(threshold: f32) -> RecommenderConfig {
        RecommenderConfig {
            similarity_threshold: threshold,
            ..Default::default()
        }
    }

    fn recommender(model: TableModel, threshold: f32) -> Recommender {
        Recommender::new(three_entity_store(), Some(Arc::new(model)), config(threshold)).unwrap()
    }

    fn ids(results: &[Recommendation]) -> Vec<&str> {
        results.iter().map(|r| r.entity_id.as_str()).collect()
    }

    #[test]
    fn test_threshold_keeps_at_or_above() {
        let hits: Vec<Hit> = [0.9f32, 0.4, 0.6, 0.5]
            .iter()
            .enumerate()
            .map(|(position, &similarity)| Hit {
                position,
                similarity,
            })
            .collect();
        let kept: Vec<f32> = apply_threshold(hits, 0.5)
            .iter()
            .map(|h| h.similarity)
            .collect();
        assert_eq!(kept, vec![0.9, 0.6, 0.5]);
    }

    #[test]
    fn test_missing_encoder_is_fatal() {
        let err = Recommender::new(three_entity_store(), None, RecommenderConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::EncoderUnavailable));
    }

    #[tokio::test]
    async fn test_end_to_end_order() {
        let rec = recommender(TableModel::new(vec![1.0, 0.0]), 0.0);
        let results = rec.recommend("anything", Some(2)).await.unwrap();

        assert_eq!(ids(&results), vec!["e0", "e2"]);
        assert_eq!(results[0].base_score, 100.0);
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
        assert_eq!(results[1].base_score, 70.71);
        assert!(results.iter().all(|r| r.rationale_source == RationaleSource::Fallback));
    }

    #[tokio::test]
    async fn test_threshold_filters_before_truncation() {
        // Query [1, 0]: e0 = 1.0, e2 ~ 0.707, e1 = 0.0
        let rec = recommender(TableModel::new(vec![1.0, 0.0]), 0.8);
        let results = rec.recommend("anything", Some(3)).await.unwrap();
        assert_eq!(ids(&results), vec!["e0"]);

        let rec = recommender(TableModel::new(vec![-1.0, 0.0]), 0.3);
        assert!(rec.recommend("anything", Some(3)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keyword_bonus_applied() {
        // Query halfway between e0 and e1; only e1 matches the query token.
        let model = TableModel::new(vec![0.0, 0.0]).with("poetry", vec![1.0, 0.9]);
        let rec = recommender(model, 0.0);
        let (results, stats) = rec.recommend_with_stats("poetry", Some(3)).await.unwrap();

        assert_eq!(stats.candidates_count, 3);
        let e1 = results.iter().find(|r| r.entity_id.as_str() == "e1").unwrap();
        assert_eq!(e1.keyword_bonus, 0.3);
        assert!((e1.score - (e1.base_score + 0.3)).abs() < 1e-9);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_blank_query_or_zero_k_skips_encoder() {
        let model = Arc::new(TableModel::new(vec![1.0, 0.0]));
        let rec = Recommender::new(
            three_entity_store(),
            Some(model.clone() as Arc<dyn EmbeddingModel>),
            config(0.0),
        )
        .unwrap();

        assert!(rec.recommend("   ", None).await.unwrap().is_empty());
        assert!(rec.recommend("battery", Some(0)).await.unwrap().is_empty());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_fails_request() {
        let rec = Recommender::new(three_entity_store(), Some(Arc::new(FailingModel)), config(0.0))
            .unwrap();
        let err = rec.recommend("battery", None).await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[tokio::test]
    async fn test_generated_rationale_and_prompt() {
        let generator = Arc::new(FakeGenerator::new(GeneratorBehavior::Echo));
        let rec = recommender(TableModel::new(vec![1.0, 0.0]), 0.0)
            .with_generator(generator.clone());
        let results = rec.recommend("battery", Some(2)).await.unwrap();

        assert_eq!(results[0].rationale, "Dr. e0 fits the request.");
        assert_eq!(results[0].rationale_source, RationaleSource::Generated);

        let prompts = generator.prompts.lock();
        assert_eq!(prompts.len(), 2);
        assert!(prompts.iter().all(|p| p.query == "battery"));
        assert!(prompts.iter().all(|p| p.language == "English"));
    }

    #[tokio::test]
    async fn test_generator_failure_falls_back_with_keyword() {
        for behavior in [GeneratorBehavior::Fail, GeneratorBehavior::Empty] {
            let rec = recommender(TableModel::new(vec![1.0, 0.0]), 0.0)
                .with_generator(Arc::new(FakeGenerator::new(behavior)));
            let results = rec.recommend("battery storage", Some(2)).await.unwrap();

            assert_eq!(results.len(), 2);
            for r in &results {
                assert_eq!(r.rationale_source, RationaleSource::Fallback);
                assert!(!r.rationale.is_empty());
                assert!(r.rationale.contains("battery"));
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_generator_timeout_falls_back() {
        let rec = recommender(TableModel::new(vec![1.0, 0.0]), 0.0)
            .with_generator(Arc::new(FakeGenerator::new(GeneratorBehavior::Hang)));
        let results = rec.recommend("battery", Some(1)).await.unwrap();
        assert_eq!(results[0].rationale_source, RationaleSource::Fallback);
        assert!(results[0].rationale.contains("battery"));
    }

    #[tokio::test]
    async fn test_enrichment_bonus_and_documents() {
        let mut docs = HashMap::new();
        docs.insert(
            EntityId::from("e2"),
            (0..5)
                .map(|i| EnrichmentDocument {
                    id: format!("p{}", i),
                    title: format!("Paper {}", i),
                    impact: 100.0,
                    keywords: Vec::new(),
                    venue: Some("Nature".to_string()),
                })
                .collect(),
        );
        let rec = recommender(TableModel::new(vec![1.0, 0.0]), 0.0)
            .with_enrichment(Arc::new(InMemoryEnrichmentSource::new(docs)));
        let results = rec.recommend("anything", Some(2)).await.unwrap();

        // 5 * 100 * 0.2 = 100 impact bonus lifts e2 above e0
        assert_eq!(ids(&results), vec!["e2", "e0"]);
        assert_eq!(results[0].impact_bonus, 100.0);
        assert_eq!(results[0].top_documents.len(), 3);
        assert_eq!(results[0].references.len(), 5);
    }

    #[tokio::test]
    async fn test_enrichment_failure_is_local() {
        let rec = recommender(TableModel::new(vec![1.0, 0.0]), 0.0)
            .with_enrichment(Arc::new(BrokenEnrichment));
        let results = rec.recommend("anything", Some(2)).await.unwrap();
        assert_eq!(ids(&results), vec!["e0", "e2"]);
        assert!(results.iter().all(|r| r.impact_bonus == 0.0 && r.top_documents.is_empty()));
    }

    #[tokio::test]
    async fn test_repeated_queries_are_identical() {
        let rec = recommender(TableModel::new(vec![0.3, 0.5]), 0.0);
        let first = rec.recommend("battery", Some(3)).await.unwrap();
        for _ in 0..3 {
            assert_eq!(rec.recommend("battery", Some(3)).await.unwrap(), first);
        }
    }

    #[tokio::test]
    async fn test_equal_scores_keep_load_order() {
        let records = vec![
            entity("a", vec![0.6, 0.8], &[], &[]),
            entity("b", vec![0.6, 0.8], &[], &[]),
            entity("c", vec![0.6, 0.8], &[], &[]),
        ];
        let store = EntityStore::init(
            Arc::new(InMemoryEntitySource::new(records)),
            IndexOptions::exact(),
        )
        .unwrap();
        let rec = Recommender::new(
            Arc::new(store),
            Some(Arc::new(TableModel::new(vec![1.0, 0.0]))),
            config(0.0),
        )
        .unwrap();

        let results = rec.recommend("battery", Some(3)).await.unwrap();
        assert_eq!(ids(&results), vec!["a", "b", "c"]);
        assert!(results.iter().all(|r| r.score == results[0].score));
    }

    #[tokio::test]
    async fn test_query_dimension_is_reconciled() {
        // Model emits four components for a two-dimensional index.
        let rec = recommender(TableModel::new(vec![0.0, 1.0, 5.0, 5.0]), 0.0);
        let results = rec.recommend("anything", Some(1)).await.unwrap();
        assert_eq!(ids(&results), vec!["e1"]);
    }
}
