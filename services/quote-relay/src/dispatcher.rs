//! Fan-out of one cycle's quotes to subscribed connections
//!
//! All sends of a cycle are issued concurrently and awaited together. Each
//! send resolves on its own, so a connection that fails does not cancel or
//! suppress delivery to any other connection. Every send is bounded by
//! `send_timeout`; a connection that does not accept its frame in time
//! counts as a failed delivery.

use crate::error::RelayError;
use crate::outbound::Outbound;
use crate::protocol::{PricePoint, TickerPush};
use crate::registry::{ConnectionId, SubscriptionRegistry};
use crate::state::OutboundSettings;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, warn};
use types::instrument::InstrumentCatalog;
use types::sample::Quote;

/// Per-cycle delivery counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

pub struct BroadcastDispatcher {
    registry: Arc<SubscriptionRegistry>,
    catalog: Arc<InstrumentCatalog>,
    decimals: u32,
    send_timeout: Duration,
}

impl BroadcastDispatcher {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        catalog: Arc<InstrumentCatalog>,
        decimals: u32,
    ) -> Self {
        Self {
            registry,
            catalog,
            decimals,
            send_timeout: OutboundSettings::default().send_timeout,
        }
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Push every quote to the connections subscribed to its instrument.
    pub async fn dispatch(&self, batch: &[Quote]) -> DispatchReport {
        let time = Utc::now().timestamp();
        let mut deliveries: Vec<(ConnectionId, Arc<dyn Outbound>, String)> = Vec::new();

        for quote in batch {
            let Some(symbol) = self.catalog.symbol_of(quote.instrument_id) else {
                warn!(instrument = %quote.instrument_id, "Quote for instrument outside catalog");
                continue;
            };
            let targets = self.registry.subscribers_of(quote.instrument_id);
            if targets.is_empty() {
                continue;
            }

            let push = TickerPush {
                message: PricePoint::new(
                    symbol.as_str(),
                    time,
                    quote.instrument_id,
                    quote.value,
                    self.decimals,
                ),
            };
            let payload = match serde_json::to_string(&push) {
                Ok(payload) => payload,
                Err(e) => {
                    error!(instrument = %quote.instrument_id, error = %e, "Failed to encode ticker push");
                    continue;
                }
            };
            for (connection, outbound) in targets {
                deliveries.push((connection, outbound, payload.clone()));
            }
        }

        let mut report = DispatchReport {
            attempted: deliveries.len(),
            ..DispatchReport::default()
        };
        if deliveries.is_empty() {
            return report;
        }

        let send_timeout = self.send_timeout;
        let results = join_all(deliveries.into_iter().map(
            |(connection, outbound, payload)| async move {
                let result = match timeout(send_timeout, outbound.send_text(payload)).await {
                    Ok(result) => result,
                    Err(_) => Err(RelayError::Delivery(format!(
                        "send timed out after {}ms",
                        send_timeout.as_millis()
                    ))),
                };
                (connection, result)
            },
        ))
        .await;

        for (connection, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(connection = %connection, error = %e, "Ticker push failed");
                }
            }
        }

        debug!(
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            "Cycle dispatched"
        );
        report
    }
}
