use crate::aggregator::Aggregator;
use crate::config::Config;
use crate::db::{self, MemoryStore, PgStore, Store};
use crate::error::AppError;
use crate::question_board::QuestionBoard;
use crate::sse::{Broadcaster, relay};
use std::sync::Arc;
use tokio::time::interval;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Aggregator,
    pub questions: QuestionBoard,
    pub broadcaster: Broadcaster,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, AppError> {
        let (store, broadcaster): (Arc<dyn Store>, Broadcaster) = match &config.database_url {
            Some(database_url) => {
                info!("Using Postgres store");
                let pool = db::init_db(database_url).await?;
                let broadcaster = Broadcaster::with_relay(config.broadcast_capacity, pool.clone());
                relay::spawn_listener(&pool, broadcaster.clone()).await?;
                let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
                (store, broadcaster)
            }
            None => {
                info!("DATABASE_URL not set, using in-memory store");
                let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
                (store, Broadcaster::new(config.broadcast_capacity))
            }
        };

        if config.reset_on_start {
            store.reset().await?;
            info!("Aggregate reset for a new session");
        }

        let health_store = store.clone();
        let period = config.health_check_interval;
        tokio::spawn(async move {
            let mut interval = interval(period);
            loop {
                interval.tick().await;
                if let Err(e) = health_store.ping().await {
                    error!("Store health check failed: {}", e);
                }
            }
        });

        Ok(Self::assemble(store, broadcaster, config))
    }

    pub fn assemble(store: Arc<dyn Store>, broadcaster: Broadcaster, config: Config) -> Self {
        AppState {
            aggregator: Aggregator::new(store.clone(), broadcaster.clone()),
            questions: QuestionBoard::new(store, broadcaster.clone()),
            broadcaster,
            config: Arc::new(config),
        }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        let config = Config::default();
        let broadcaster = Broadcaster::new(config.broadcast_capacity);
        Self::assemble(Arc::new(MemoryStore::new()), broadcaster, config)
    }
}
