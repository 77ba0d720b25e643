use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::core::config::{AppConfig, AppPaths};
use crate::ingest::{Ingestor, LoaderRegistry};
use crate::llm::{self, LlmProvider};
use crate::rag::types::SessionMetrics;
use crate::rag::{HybridRetriever, RagChain};
use crate::search::{WebSearch, WebSearchClient};
use crate::store::{SqliteVectorStore, VectorStore};

pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: AppConfig,
    pub llm: Arc<dyn LlmProvider>,
    pub web: Arc<dyn WebSearch>,
    pub store: Arc<dyn VectorStore>,
    pub chain: Arc<RagChain>,
    pub ingestor: Ingestor,
    /// Session aggregate owned by this caller layer, not by the chain.
    pub metrics: Mutex<SessionMetrics>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub async fn initialize() -> anyhow::Result<Arc<Self>> {
        let paths = Arc::new(AppPaths::new());
        let config = AppConfig::load(&paths)?;

        let llm = llm::select_provider(&config.llm).await;
        let web: Arc<dyn WebSearch> = Arc::new(WebSearchClient::new(config.search.clone()));
        let store: Arc<dyn VectorStore> =
            Arc::new(SqliteVectorStore::open(paths.db_path.clone()).await?);

        let retriever = HybridRetriever::new(
            llm.clone(),
            store.clone(),
            web.clone(),
            config.retriever.clone(),
        );
        let chain = Arc::new(RagChain::new(
            retriever,
            llm.clone(),
            web.clone(),
            config.chain.clone(),
        ));
        let ingestor = Ingestor::new(
            LoaderRegistry::with_defaults(),
            llm.clone(),
            store.clone(),
            config.ingest.clone(),
        );

        Ok(Arc::new(AppState {
            paths,
            config,
            llm,
            web,
            store,
            chain,
            ingestor,
            metrics: Mutex::new(SessionMetrics::default()),
            started_at: Utc::now(),
        }))
    }
}
