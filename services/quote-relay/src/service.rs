//! Process lifecycle
//!
//! Bootstrap: open the pool, ensure the schema, seed and load the catalog.
//! Shutdown runs strictly in order: refuse new connections, stop the
//! ingestion loop, disconnect every subscriber, close the pool.

use crate::config::RelayConfig;
use crate::dispatcher::BroadcastDispatcher;
use crate::error::RelayError;
use crate::ingestion::IngestionLoop;
use crate::router::create_router;
use crate::source::HttpQuoteSource;
use crate::state::{AppState, DisplaySettings};
use crate::store::postgres::PgStore;
use crate::store::{schema, TimeSeriesStore};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use types::instrument::{InstrumentCatalog, Symbol};

pub struct RelayService {
    config: RelayConfig,
    store: Arc<PgStore>,
    state: AppState,
}

/// Insert the configured symbols and load the resulting catalog.
pub async fn seed_catalog(
    store: &dyn TimeSeriesStore,
    symbols: &[String],
) -> Result<InstrumentCatalog, RelayError> {
    for raw in symbols {
        let symbol = Symbol::parse(raw)?;
        info!(symbol = %symbol, "Checking symbol");
        store.ensure_instrument(&symbol).await?;
    }
    let instruments = store.list_instruments().await?;
    Ok(InstrumentCatalog::from_instruments(instruments))
}

impl RelayService {
    pub async fn bootstrap(config: RelayConfig) -> Result<Self, RelayError> {
        let store = Arc::new(PgStore::connect(&config.postgres).await?);
        schema::ensure_schema(store.pool()).await?;

        let catalog = seed_catalog(store.as_ref(), &config.data_source.symbols).await?;
        info!(instruments = catalog.len(), "Instrument catalog loaded");

        let settings = DisplaySettings {
            decimals: config.data_source.decimals,
            history_window: config.data_source.history_window(),
        };
        let state = AppState::new(catalog, store.clone(), settings)
            .with_outbound(config.server.outbound());

        Ok(Self {
            config,
            store,
            state,
        })
    }

    /// Serve until `shutdown` resolves, then tear everything down.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), RelayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let source = HttpQuoteSource::new(
            self.config.data_source.url.clone(),
            self.config.data_source.request_timeout(),
        )?;
        let dispatcher = BroadcastDispatcher::new(
            self.state.registry.clone(),
            self.state.catalog.clone(),
            self.state.settings.decimals,
        )
        .with_send_timeout(self.state.outbound.send_timeout);
        let ingestion = IngestionLoop::new(
            Arc::new(source),
            self.state.store.clone(),
            self.state.catalog.clone(),
            dispatcher,
            self.config.data_source.cadence(),
        );

        let cancel = CancellationToken::new();
        let collector = ingestion.spawn(cancel.clone());
        let registry = self.state.registry.clone();
        let closing = self.state.closing.clone();

        let addr = self.config.server_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| RelayError::Transport(format!("Failed to bind {}: {}", addr, e)))?;
        info!("Listening on {}", addr);

        let app = create_router(self.state);
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("Shutdown requested");

                // Refuse upgrades first so close_all sees every live connection
                closing.cancel();
                cancel.cancel();
                if let Err(e) = collector.await {
                    error!(error = %e, "Prices collector task failed");
                }
                registry.close_all().await;
            })
            .await;

        self.store.close().await;
        served.map_err(|e| RelayError::Transport(format!("Server error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn test_seed_catalog_normalizes_and_dedupes() {
        let store = MemoryStore::new();
        let symbols = vec!["eurusd".to_string(), "GBPUSD".to_string(), "EURUSD".to_string()];

        let catalog = seed_catalog(&store, &symbols).await.unwrap();

        assert_eq!(catalog.len(), 2);
        assert!(catalog.id_of("EURUSD").is_some());
        assert!(catalog.id_of("gbpusd").is_some());
    }

    #[tokio::test]
    async fn test_seed_catalog_rejects_bad_symbol() {
        let store = MemoryStore::new();
        let result = seed_catalog(&store, &["  ".to_string()]).await;
        assert!(matches!(result, Err(RelayError::Catalog(_))));
    }

    #[tokio::test]
    async fn test_seed_catalog_is_idempotent_across_restarts() {
        let store = MemoryStore::new();
        let symbols = vec!["EURUSD".to_string()];

        let first = seed_catalog(&store, &symbols).await.unwrap();
        let second = seed_catalog(&store, &symbols).await.unwrap();

        assert_eq!(first.id_of("EURUSD"), second.id_of("EURUSD"));
        assert_eq!(store.list_instruments().await.unwrap().len(), 1);
    }
}
