//! Quote ingestion loop
//!
//! One cycle per tick: fetch → normalize → persist → dispatch. A failed
//! stage is logged and ends the cycle early; the loop itself only stops
//! when cancelled. Cycles never overlap: the next one starts `cadence`
//! after the previous one started, or immediately if the previous one ran
//! long.
//!
//! A persistence failure also skips that cycle's broadcast, so clients only
//! ever see values that are queryable through the history reply.

use crate::dispatcher::{BroadcastDispatcher, DispatchReport};
use crate::normalizer::normalize;
use crate::source::QuoteSource;
use crate::store::TimeSeriesStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use types::instrument::InstrumentCatalog;

/// How a single cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    TransportFailed,
    ParseFailed,
    /// Payload decoded but held no known instrument
    NoQuotes,
    PersistFailed { quotes: usize },
    Dispatched { quotes: usize, report: DispatchReport },
}

pub struct IngestionLoop {
    source: Arc<dyn QuoteSource>,
    store: Arc<dyn TimeSeriesStore>,
    catalog: Arc<InstrumentCatalog>,
    dispatcher: BroadcastDispatcher,
    cadence: Duration,
}

impl IngestionLoop {
    pub fn new(
        source: Arc<dyn QuoteSource>,
        store: Arc<dyn TimeSeriesStore>,
        catalog: Arc<InstrumentCatalog>,
        dispatcher: BroadcastDispatcher,
        cadence: Duration,
    ) -> Self {
        Self {
            source,
            store,
            catalog,
            dispatcher,
            cadence,
        }
    }

    /// Run one fetch → normalize → persist → dispatch cycle.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let body = match self.source.fetch().await {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "Quote fetch failed");
                return CycleOutcome::TransportFailed;
            }
        };

        let quotes = match normalize(&body, &self.catalog) {
            Ok(quotes) => quotes,
            Err(e) => {
                error!(error = %e, "Quote payload rejected");
                return CycleOutcome::ParseFailed;
            }
        };
        if quotes.is_empty() {
            debug!("No known instruments in quote payload");
            return CycleOutcome::NoQuotes;
        }

        if let Err(e) = self.store.insert_samples(&quotes).await {
            error!(error = %e, quotes = quotes.len(), "Sample insert failed, skipping broadcast");
            return CycleOutcome::PersistFailed {
                quotes: quotes.len(),
            };
        }

        let report = self.dispatcher.dispatch(&quotes).await;
        if report.failed > 0 {
            warn!(
                failed = report.failed,
                delivered = report.delivered,
                "Some ticker pushes failed"
            );
        }
        CycleOutcome::Dispatched {
            quotes: quotes.len(),
            report,
        }
    }

    /// Run cycles until `cancel` fires.
    ///
    /// Cancellation is honoured both mid-cycle and while sleeping; an
    /// interrupted cycle is dropped, which rolls back an uncommitted insert.
    pub async fn run(self, cancel: CancellationToken) {
        info!(cadence_ms = self.cadence.as_millis() as u64, "Prices collector started");

        loop {
            let started = Instant::now();

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.run_cycle() => {
                    debug!(?outcome, elapsed_ms = started.elapsed().as_millis() as u64, "Cycle finished");
                }
            }

            // max(0, cadence - elapsed)
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = sleep_until(started + self.cadence) => {}
            }
        }

        info!("Prices collector cancelled");
    }

    /// Spawn the loop on the runtime.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SubscriptionRegistry;
    use crate::store::memory::MemoryStore;
    use crate::testing::{rates_body, RecordingOutbound, ScriptedSource};
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use types::ids::InstrumentId;
    use types::instrument::Symbol;

    struct Harness {
        source: Arc<ScriptedSource>,
        store: Arc<MemoryStore>,
        registry: Arc<SubscriptionRegistry>,
        ingestion: IngestionLoop,
    }

    async fn harness(responses: Vec<Result<String, String>>) -> Harness {
        let store = Arc::new(MemoryStore::new());
        store
            .ensure_instrument(&Symbol::parse("EURUSD").unwrap())
            .await
            .unwrap();
        let catalog = Arc::new(InstrumentCatalog::from_instruments(
            store.list_instruments().await.unwrap(),
        ));
        let registry = Arc::new(SubscriptionRegistry::new());
        let source = Arc::new(ScriptedSource::new(responses));
        let dispatcher = BroadcastDispatcher::new(registry.clone(), catalog.clone(), 2);
        let ingestion = IngestionLoop::new(
            source.clone(),
            store.clone(),
            catalog,
            dispatcher,
            Duration::from_secs(5),
        );
        Harness {
            source,
            store,
            registry,
            ingestion,
        }
    }

    fn eurusd_body() -> String {
        rates_body(&[("EURUSD", "1.1000", "1.1002")])
    }

    #[tokio::test]
    async fn test_cycle_persists_then_dispatches() {
        let h = harness(vec![Ok(eurusd_body())]).await;
        let outbound = Arc::new(RecordingOutbound::new());
        let id = h.registry.register(outbound.clone());
        h.registry.set_subscription(id, InstrumentId::new(1));

        let outcome = h.ingestion.run_cycle().await;

        assert!(matches!(outcome, CycleOutcome::Dispatched { quotes: 1, .. }));
        let samples = h.store.samples().await;
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, Decimal::from_str("1.1001").unwrap());
        assert_eq!(outbound.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_skips_cycle() {
        let h = harness(vec![Err("connection refused".to_string())]).await;
        assert_eq!(h.ingestion.run_cycle().await, CycleOutcome::TransportFailed);
        assert!(h.store.samples().await.is_empty());
    }

    #[tokio::test]
    async fn test_parse_failure_skips_cycle() {
        let h = harness(vec![Ok("<html>".to_string())]).await;
        assert_eq!(h.ingestion.run_cycle().await, CycleOutcome::ParseFailed);
        assert!(h.store.samples().await.is_empty());
    }

    #[tokio::test]
    async fn test_no_known_quotes() {
        let h = harness(vec![Ok(rates_body(&[("USDJPY", "151.1", "151.2")]))]).await;
        assert_eq!(h.ingestion.run_cycle().await, CycleOutcome::NoQuotes);
    }

    #[tokio::test]
    async fn test_persist_failure_suppresses_broadcast() {
        let h = harness(vec![Ok(eurusd_body())]).await;
        let outbound = Arc::new(RecordingOutbound::new());
        let id = h.registry.register(outbound.clone());
        h.registry.set_subscription(id, InstrumentId::new(1));
        h.store.fail_inserts(true);

        assert_eq!(
            h.ingestion.run_cycle().await,
            CycleOutcome::PersistFailed { quotes: 1 }
        );
        assert!(outbound.sent().is_empty());

        // The next cycle recovers
        h.store.fail_inserts(false);
        assert!(matches!(
            h.ingestion.run_cycle().await,
            CycleOutcome::Dispatched { .. }
        ));
        assert_eq!(outbound.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_keeps_cadence_and_survives_failures() {
        let h = harness(vec![
            Err("timeout".to_string()),
            Ok("garbage".to_string()),
            Ok(eurusd_body()),
        ])
        .await;
        let source = h.source.clone();
        let store = h.store.clone();
        let cancel = CancellationToken::new();
        let handle = h.ingestion.spawn(cancel.clone());

        // Ticks at t=0, 5, 10, 15
        tokio::time::sleep(Duration::from_secs(17)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(source.calls(), 4);
        assert_eq!(store.samples().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_sleep_stops_promptly() {
        let h = harness(vec![Ok(eurusd_body())]).await;
        let source = h.source.clone();
        let cancel = CancellationToken::new();
        let handle = h.ingestion.spawn(cancel.clone());

        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        let started = Instant::now();
        handle.await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancel_before_start_does_nothing() {
        let h = harness(vec![Ok(eurusd_body())]).await;
        let source = h.source.clone();
        let cancel = CancellationToken::new();
        cancel.cancel();

        h.ingestion.run(cancel).await;

        assert_eq!(source.calls(), 0);
    }
}
