//! menud - dish explanation daemon entry point.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use menud::config::MenudConfig;
use menud::generator::GeminiClient;
use menud::governor::RequestGovernor;
use menud::matcher::CorpusMatcher;
use menud::quota::DailyQuota;
use menud::resolver::ExplanationResolver;
use menud::server::{self, AppState};
use menud::store::{CorpusStore, SqliteCorpus};

use menu_common::similarity::{LevenshteinStrategy, OverlapStrategy};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("menud v{} starting", env!("CARGO_PKG_VERSION"));

    // Optional config path as the first argument.
    let config_path: Option<PathBuf> = std::env::args().nth(1).map(PathBuf::from);
    let config = MenudConfig::load(config_path.as_deref());

    let store = Arc::new(
        SqliteCorpus::open(Path::new(&config.corpus.db_path))
            .with_context(|| format!("opening corpus at {}", config.corpus.db_path))?,
    );
    info!(
        "Corpus open at {} ({} entries)",
        config.corpus.db_path,
        store.count().await.unwrap_or(0)
    );

    let generator = GeminiClient::from_config(&config.generator)?;
    if config.generator.resolve_api_key().is_none() {
        warn!(
            "No generator API key found (set {} or generator.api_key); cache misses will fail",
            config.generator.api_key_env
        );
    }

    let resolver = ExplanationResolver::new(
        store.clone(),
        Arc::new(generator),
        Arc::new(DailyQuota::new(config.quota.clone())),
        CorpusMatcher::new(
            Box::new(LevenshteinStrategy),
            config.matching.match_threshold,
            config.matching.restaurant_bonus,
        ),
        config.corpus.persist_non_food,
    );

    let search_matcher = CorpusMatcher::new(
        Box::new(OverlapStrategy),
        config.matching.overlap_threshold,
        0.0,
    );

    let state = AppState::new(
        resolver,
        RequestGovernor::new(config.governor.clone()),
        store,
        search_matcher,
        config.auth.tokens.clone(),
    );

    server::run(state, &config).await
}
