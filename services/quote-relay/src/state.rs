use crate::registry::SubscriptionRegistry;
use crate::store::TimeSeriesStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use types::instrument::InstrumentCatalog;

/// How values are presented to clients.
#[derive(Debug, Clone, Copy)]
pub struct DisplaySettings {
    /// Decimal places, HALF_UP
    pub decimals: u32,
    /// Lookback for the on-subscribe history reply
    pub history_window: Duration,
}

/// Per-connection write limits.
#[derive(Debug, Clone, Copy)]
pub struct OutboundSettings {
    /// Frames buffered for one client before it is dropped as lagging
    pub queue_capacity: usize,
    /// Upper bound on a single delivery
    pub send_timeout: Duration,
}

impl Default for OutboundSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            send_timeout: Duration::from_secs(5),
        }
    }
}

/// Process-wide state shared by every connection handler.
///
/// The catalog is fixed after bootstrap; only the registry and the sample
/// log change while the relay runs.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<InstrumentCatalog>,
    pub registry: Arc<SubscriptionRegistry>,
    pub store: Arc<dyn TimeSeriesStore>,
    pub settings: DisplaySettings,
    pub outbound: OutboundSettings,
    /// Fired once shutdown starts; new connections are refused after that.
    pub closing: CancellationToken,
}

impl AppState {
    pub fn new(
        catalog: InstrumentCatalog,
        store: Arc<dyn TimeSeriesStore>,
        settings: DisplaySettings,
    ) -> Self {
        Self {
            catalog: Arc::new(catalog),
            registry: Arc::new(SubscriptionRegistry::new()),
            store,
            settings,
            outbound: OutboundSettings::default(),
            closing: CancellationToken::new(),
        }
    }

    pub fn with_outbound(mut self, outbound: OutboundSettings) -> Self {
        self.outbound = outbound;
        self
    }
}
