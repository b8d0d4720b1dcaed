//! Explanation resolution.
//!
//! The read path is side-effect-minimal: a cache hit only bumps a
//! restaurant counter. A miss spends one generator call, then re-checks
//! for a near-duplicate before writing, so the corpus does not grow a row
//! per spelling variant. Corpus failures never fail a request that has an
//! answer: reads degrade to "no match", writes are logged and dropped.

use chrono::Utc;
use menu_common::language::detect_menu_language;
use menu_common::{DishRecord, DisplayLanguage};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::generator::Generator;
use crate::matcher::CorpusMatcher;
use crate::prompts;
use crate::quota::{QuotaContext, QuotaService};
use crate::store::CorpusStore;

/// Explanations longer than this are clipped at write time.
const MAX_EXPLANATION_CHARS: usize = 300;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("unsupported language code: {0}")]
    UnsupportedLanguage(String),

    #[error("dish name must not be empty")]
    MissingInput,

    #[error("daily explanation quota exhausted")]
    QuotaExceeded,

    #[error("generation failed: {0}")]
    GenerationFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplanationSource {
    Cache,
    Generated,
}

impl ExplanationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExplanationSource::Cache => "cache",
            ExplanationSource::Generated => "generated",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedExplanation {
    pub explanation: String,
    pub tags: Vec<String>,
    pub allergens: Vec<String>,
    pub cuisine: String,
    pub source: ExplanationSource,
    /// Match score when served from cache.
    pub match_score: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub dish_name: String,
    /// Raw language code from the wire; validated here.
    pub language: String,
    pub restaurant_id: Option<i64>,
    pub restaurant_name: Option<String>,
}

pub struct ExplanationResolver {
    store: Arc<dyn CorpusStore>,
    generator: Arc<dyn Generator>,
    quota: Arc<dyn QuotaService>,
    matcher: CorpusMatcher,
    persist_non_food: bool,
}

impl ExplanationResolver {
    pub fn new(
        store: Arc<dyn CorpusStore>,
        generator: Arc<dyn Generator>,
        quota: Arc<dyn QuotaService>,
        matcher: CorpusMatcher,
        persist_non_food: bool,
    ) -> Self {
        Self {
            store,
            generator,
            quota,
            matcher,
            persist_non_food,
        }
    }

    pub async fn resolve(
        &self,
        req: &ResolveRequest,
        ctx: &QuotaContext,
    ) -> Result<ResolvedExplanation, ResolveError> {
        let language = DisplayLanguage::from_str(&req.language)
            .map_err(|e| ResolveError::UnsupportedLanguage(e.0))?;
        let dish_name = req.dish_name.trim();
        if dish_name.is_empty() {
            return Err(ResolveError::MissingInput);
        }

        // Read failures degrade to an empty slice: fail open toward
        // generation, never toward erroring.
        let slice = self.corpus_slice(language).await;
        let outcome = self
            .matcher
            .find_best_match(dish_name, &slice, req.restaurant_id);

        if let Some((record, score)) = outcome.best {
            info!(
                "Cache hit for '{}' ({}) score {:.3}",
                dish_name, language, score
            );
            if let Some(restaurant_id) = record.restaurant_id {
                self.bump_restaurant(restaurant_id).await;
            }
            return Ok(ResolvedExplanation {
                explanation: record.explanation,
                tags: record.tags,
                allergens: record.allergens,
                cuisine: record.cuisine,
                source: ExplanationSource::Cache,
                match_score: Some(score),
            });
        }

        info!(
            "Cache miss for '{}' ({}), best sub-threshold score {:.3}",
            dish_name, language, outcome.best_score
        );

        // Quota gates the generation spend, never the cache.
        if !self.quota.can_explain(ctx) {
            return Err(ResolveError::QuotaExceeded);
        }

        let prompt = prompts::explanation_prompt(dish_name, language);
        let generated = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|e| ResolveError::GenerationFailed(e.to_string()))?;
        self.quota.record_explain(ctx);

        let not_food = generated.cuisine.trim().eq_ignore_ascii_case(language.not_food_cuisine());
        if !not_food || self.persist_non_food {
            self.dedup_and_store(dish_name, language, req, &generated)
                .await;
        }

        if let Some(restaurant_id) = req.restaurant_id {
            self.bump_restaurant(restaurant_id).await;
        }

        Ok(ResolvedExplanation {
            explanation: generated.explanation,
            tags: generated.tags,
            allergens: generated.allergens,
            cuisine: generated.cuisine,
            source: ExplanationSource::Generated,
            match_score: None,
        })
    }

    async fn corpus_slice(&self, language: DisplayLanguage) -> Vec<DishRecord> {
        match self.store.query_by_language(language).await {
            Ok(slice) => slice,
            Err(e) => {
                warn!("Corpus read failed, treating as empty slice: {e}");
                Vec::new()
            }
        }
    }

    /// Re-check for a near-duplicate on a fresh slice, then insert. A
    /// concurrent miss for the same dish can still slip through between
    /// the check and the insert; that race is accepted and merged offline.
    async fn dedup_and_store(
        &self,
        dish_name: &str,
        language: DisplayLanguage,
        req: &ResolveRequest,
        generated: &crate::generator::GeneratedDish,
    ) {
        let fresh_slice = self.corpus_slice(language).await;
        let dedup = self
            .matcher
            .find_best_match(dish_name, &fresh_slice, req.restaurant_id);
        if dedup.is_hit() {
            info!(
                "Skipping insert for '{}' ({}): near-duplicate at {:.3}",
                dish_name, language, dedup.best_score
            );
            return;
        }

        let record = DishRecord {
            id: None,
            name: dish_name.to_string(),
            display_language: language,
            menu_language: detect_menu_language(dish_name).to_string(),
            explanation: clip_chars(&generated.explanation, MAX_EXPLANATION_CHARS),
            tags: generated.tags.clone(),
            allergens: generated.allergens.clone(),
            cuisine: generated.cuisine.clone(),
            restaurant_id: req.restaurant_id,
            restaurant_name: req.restaurant_name.clone(),
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.insert(&record).await {
            // A failed cache write never fails the user-visible request.
            warn!("Corpus write failed for '{}': {e}", dish_name);
        }
    }

    async fn bump_restaurant(&self, restaurant_id: i64) {
        if let Err(e) = self
            .store
            .increment_restaurant_explanations(restaurant_id)
            .await
        {
            warn!("Restaurant counter bump failed for {restaurant_id}: {e}");
        }
    }
}

fn clip_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchingConfig;
    use crate::generator::{GeneratedDish, GeneratorError};
    use crate::quota::UnlimitedQuota;
    use crate::store::StoreError;
    use async_trait::async_trait;
    use menu_common::similarity::LevenshteinStrategy;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    // ------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------

    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<Vec<DishRecord>>,
        counter_bumps: Mutex<Vec<i64>>,
        fail_reads: std::sync::atomic::AtomicBool,
        fail_writes: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl CorpusStore for MemoryStore {
        async fn query_by_language(
            &self,
            language: DisplayLanguage,
        ) -> Result<Vec<DishRecord>, StoreError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(StoreError::Database("read refused".into()));
            }
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.display_language == language)
                .cloned()
                .collect())
        }

        async fn insert(&self, record: &DishRecord) -> Result<(), StoreError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Database("write refused".into()));
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn increment_restaurant_explanations(
            &self,
            restaurant_id: i64,
        ) -> Result<(), StoreError> {
            self.counter_bumps.lock().unwrap().push(restaurant_id);
            Ok(())
        }

        async fn count(&self) -> Result<u64, StoreError> {
            Ok(self.records.lock().unwrap().len() as u64)
        }
    }

    /// Store that misses on the first read and returns a duplicate on every
    /// read after it, like a concurrent miss that wrote first.
    struct RacingStore {
        reads: AtomicU32,
        existing: DishRecord,
        inserted: Mutex<Vec<DishRecord>>,
    }

    impl RacingStore {
        fn new(existing: DishRecord) -> Self {
            Self {
                reads: AtomicU32::new(0),
                existing,
                inserted: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CorpusStore for RacingStore {
        async fn query_by_language(
            &self,
            _language: DisplayLanguage,
        ) -> Result<Vec<DishRecord>, StoreError> {
            if self.reads.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(Vec::new())
            } else {
                Ok(vec![self.existing.clone()])
            }
        }

        async fn insert(&self, record: &DishRecord) -> Result<(), StoreError> {
            self.inserted.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn increment_restaurant_explanations(
            &self,
            _restaurant_id: i64,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn count(&self) -> Result<u64, StoreError> {
            Ok(self.inserted.lock().unwrap().len() as u64)
        }
    }

    struct ScriptedGenerator {
        dish: GeneratedDish,
        calls: AtomicU32,
        fail: bool,
    }

    impl ScriptedGenerator {
        fn ok(dish: GeneratedDish) -> Self {
            Self {
                dish,
                calls: AtomicU32::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                dish: carbonara(),
                calls: AtomicU32::new(0),
                fail: true,
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<GeneratedDish, GeneratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(GeneratorError::Http("upstream 503".into()))
            } else {
                Ok(self.dish.clone())
            }
        }
    }

    fn carbonara() -> GeneratedDish {
        GeneratedDish {
            explanation: "Roman pasta with egg, pecorino and cured pork.".to_string(),
            tags: vec!["Pasta".to_string()],
            allergens: vec!["Contains egg".to_string(), "Contains dairy".to_string()],
            cuisine: "Italian".to_string(),
        }
    }

    fn not_food_sentinel() -> GeneratedDish {
        GeneratedDish {
            explanation: DisplayLanguage::En.not_food_explanation().to_string(),
            tags: Vec::new(),
            allergens: Vec::new(),
            cuisine: DisplayLanguage::En.not_food_cuisine().to_string(),
        }
    }

    fn matcher() -> CorpusMatcher {
        let m = MatchingConfig::default();
        CorpusMatcher::new(Box::new(LevenshteinStrategy), m.match_threshold, m.restaurant_bonus)
    }

    fn resolver_with(
        store: Arc<MemoryStore>,
        generator: Arc<ScriptedGenerator>,
        persist_non_food: bool,
    ) -> ExplanationResolver {
        ExplanationResolver::new(
            store,
            generator,
            Arc::new(UnlimitedQuota),
            matcher(),
            persist_non_food,
        )
    }

    fn request(dish: &str, language: &str) -> ResolveRequest {
        ResolveRequest {
            dish_name: dish.to_string(),
            language: language.to_string(),
            restaurant_id: None,
            restaurant_name: None,
        }
    }

    fn ctx() -> QuotaContext {
        QuotaContext::anonymous("test")
    }

    // ------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn rejects_unsupported_language() {
        let resolver = resolver_with(
            Arc::new(MemoryStore::default()),
            Arc::new(ScriptedGenerator::ok(carbonara())),
            true,
        );
        let err = resolver.resolve(&request("Pho", "de"), &ctx()).await;
        assert!(matches!(err, Err(ResolveError::UnsupportedLanguage(_))));
    }

    #[tokio::test]
    async fn rejects_empty_dish_name() {
        let resolver = resolver_with(
            Arc::new(MemoryStore::default()),
            Arc::new(ScriptedGenerator::ok(carbonara())),
            true,
        );
        let err = resolver.resolve(&request("   ", "en"), &ctx()).await;
        assert!(matches!(err, Err(ResolveError::MissingInput)));
    }

    #[tokio::test]
    async fn miss_generates_and_stores_exactly_one_record() {
        let store = Arc::new(MemoryStore::default());
        let generator = Arc::new(ScriptedGenerator::ok(carbonara()));
        let resolver = resolver_with(store.clone(), generator.clone(), true);

        let resolved = resolver
            .resolve(&request("Spaghetti Carbonara", "en"), &ctx())
            .await
            .unwrap();

        assert_eq!(resolved.source, ExplanationSource::Generated);
        assert_eq!(generator.call_count(), 1);
        let records = store.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].display_language, DisplayLanguage::En);
        assert_eq!(records[0].menu_language, "en");
    }

    #[tokio::test]
    async fn normalized_variant_hits_cache_without_generator() {
        let store = Arc::new(MemoryStore::default());
        let generator = Arc::new(ScriptedGenerator::ok(carbonara()));
        let resolver = resolver_with(store.clone(), generator.clone(), true);

        resolver
            .resolve(&request("Spaghetti Carbonara", "en"), &ctx())
            .await
            .unwrap();
        let second = resolver
            .resolve(&request("Spaghetti  carbonara!", "en"), &ctx())
            .await
            .unwrap();

        assert_eq!(second.source, ExplanationSource::Cache);
        assert_eq!(second.match_score, Some(1.0));
        assert_eq!(generator.call_count(), 1);
        assert_eq!(store.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn language_isolation_forces_fresh_generation() {
        let store = Arc::new(MemoryStore::default());
        let generator = Arc::new(ScriptedGenerator::ok(carbonara()));
        let resolver = resolver_with(store.clone(), generator.clone(), true);

        resolver
            .resolve(&request("Spaghetti Carbonara", "en"), &ctx())
            .await
            .unwrap();
        let es = resolver
            .resolve(&request("Spaghetti Carbonara", "es"), &ctx())
            .await
            .unwrap();

        assert_eq!(es.source, ExplanationSource::Generated);
        assert_eq!(generator.call_count(), 2);
        assert_eq!(store.records.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn generator_failure_propagates_typed() {
        let resolver = resolver_with(
            Arc::new(MemoryStore::default()),
            Arc::new(ScriptedGenerator::failing()),
            true,
        );
        let err = resolver
            .resolve(&request("Spaghetti Carbonara", "en"), &ctx())
            .await;
        match err {
            Err(ResolveError::GenerationFailed(msg)) => assert!(msg.contains("503")),
            other => panic!("expected GenerationFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_failure_fails_open_to_generation() {
        let store = Arc::new(MemoryStore::default());
        let generator = Arc::new(ScriptedGenerator::ok(carbonara()));
        let resolver = resolver_with(store.clone(), generator.clone(), true);

        // Seed a record, then refuse reads: the resolver must regenerate
        // rather than error.
        resolver
            .resolve(&request("Spaghetti Carbonara", "en"), &ctx())
            .await
            .unwrap();
        store.fail_reads.store(true, Ordering::SeqCst);

        let resolved = resolver
            .resolve(&request("Spaghetti Carbonara", "en"), &ctx())
            .await
            .unwrap();
        assert_eq!(resolved.source, ExplanationSource::Generated);
        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test]
    async fn write_failure_never_fails_the_request() {
        let store = Arc::new(MemoryStore::default());
        store.fail_writes.store(true, Ordering::SeqCst);
        let generator = Arc::new(ScriptedGenerator::ok(carbonara()));
        let resolver = resolver_with(store.clone(), generator.clone(), true);

        let resolved = resolver
            .resolve(&request("Spaghetti Carbonara", "en"), &ctx())
            .await
            .unwrap();
        assert_eq!(resolved.source, ExplanationSource::Generated);
        assert_eq!(store.records.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn duplicate_found_at_dedup_recheck_is_not_inserted() {
        let existing = DishRecord {
            id: Some(1),
            name: "Spaghetti Carbonara".to_string(),
            display_language: DisplayLanguage::En,
            menu_language: "en".to_string(),
            explanation: "Already stored.".to_string(),
            tags: Vec::new(),
            allergens: Vec::new(),
            cuisine: "Italian".to_string(),
            restaurant_id: None,
            restaurant_name: None,
            created_at: Utc::now(),
        };
        let store = Arc::new(RacingStore::new(existing));
        let generator = Arc::new(ScriptedGenerator::ok(carbonara()));
        let resolver = ExplanationResolver::new(
            store.clone(),
            generator.clone(),
            Arc::new(UnlimitedQuota),
            matcher(),
            true,
        );

        let resolved = resolver
            .resolve(&request("Spaghetti Carbonara", "en"), &ctx())
            .await
            .unwrap();

        // The first scan missed, so this request paid for a generation,
        // but the re-check saw the concurrent write and must not add a row.
        assert_eq!(resolved.source, ExplanationSource::Generated);
        assert_eq!(generator.call_count(), 1);
        assert!(store.inserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn quota_gates_generation_but_not_cache() {
        struct DenyAll;
        impl QuotaService for DenyAll {
            fn can_explain(&self, _ctx: &QuotaContext) -> bool {
                false
            }
            fn record_explain(&self, _ctx: &QuotaContext) {}
        }

        let store = Arc::new(MemoryStore::default());
        let seeded = resolver_with(
            store.clone(),
            Arc::new(ScriptedGenerator::ok(carbonara())),
            true,
        );
        seeded
            .resolve(&request("Spaghetti Carbonara", "en"), &ctx())
            .await
            .unwrap();

        let generator = Arc::new(ScriptedGenerator::ok(carbonara()));
        let gated = ExplanationResolver::new(
            store,
            generator.clone(),
            Arc::new(DenyAll),
            matcher(),
            true,
        );

        // Cache hit works despite the quota denying everything.
        let hit = gated
            .resolve(&request("Spaghetti Carbonara", "en"), &ctx())
            .await
            .unwrap();
        assert_eq!(hit.source, ExplanationSource::Cache);

        // A miss is refused before spending a generation call.
        let err = gated.resolve(&request("Miso Soup", "en"), &ctx()).await;
        assert!(matches!(err, Err(ResolveError::QuotaExceeded)));
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn cache_hit_bumps_record_restaurant_counter() {
        let store = Arc::new(MemoryStore::default());
        let generator = Arc::new(ScriptedGenerator::ok(carbonara()));
        let resolver = resolver_with(store.clone(), generator, true);

        let mut req = request("Spaghetti Carbonara", "en");
        req.restaurant_id = Some(11);
        resolver.resolve(&req, &ctx()).await.unwrap();
        // Miss path bumps the requested restaurant.
        assert_eq!(*store.counter_bumps.lock().unwrap(), vec![11]);

        resolver.resolve(&req, &ctx()).await.unwrap();
        // Hit path bumps the restaurant stored on the record.
        assert_eq!(*store.counter_bumps.lock().unwrap(), vec![11, 11]);
    }

    #[tokio::test]
    async fn not_food_sentinel_is_cached_when_policy_allows() {
        let store = Arc::new(MemoryStore::default());
        let generator = Arc::new(ScriptedGenerator::ok(not_food_sentinel()));
        let resolver = resolver_with(store.clone(), generator.clone(), true);

        let resolved = resolver
            .resolve(&request("Association Football Player", "en"), &ctx())
            .await
            .unwrap();
        assert_eq!(resolved.cuisine, "Not applicable");
        assert!(resolved.tags.is_empty());
        assert!(resolved.allergens.is_empty());
        assert_eq!(store.records.lock().unwrap().len(), 1);

        // Second identical submission is a cache hit, not a second spend.
        resolver
            .resolve(&request("Association Football Player", "en"), &ctx())
            .await
            .unwrap();
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn not_food_sentinel_skips_corpus_when_policy_forbids() {
        let store = Arc::new(MemoryStore::default());
        let generator = Arc::new(ScriptedGenerator::ok(not_food_sentinel()));
        let resolver = resolver_with(store.clone(), generator.clone(), false);

        resolver
            .resolve(&request("Association Football Player", "en"), &ctx())
            .await
            .unwrap();
        assert_eq!(store.records.lock().unwrap().len(), 0);

        // Without persistence every repeat costs a generation.
        resolver
            .resolve(&request("Association Football Player", "en"), &ctx())
            .await
            .unwrap();
        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test]
    async fn long_explanations_are_clipped_on_write() {
        let store = Arc::new(MemoryStore::default());
        let mut dish = carbonara();
        dish.explanation = "x".repeat(400);
        let resolver = resolver_with(store.clone(), Arc::new(ScriptedGenerator::ok(dish)), true);

        resolver
            .resolve(&request("Spaghetti Carbonara", "en"), &ctx())
            .await
            .unwrap();
        let records = store.records.lock().unwrap();
        assert_eq!(records[0].explanation.chars().count(), 300);
    }

    #[test]
    fn clip_respects_char_boundaries() {
        assert_eq!(clip_chars("四川麻婆豆腐", 4), "四川麻婆");
        assert_eq!(clip_chars("short", 300), "short");
    }
}
