use std::sync::Arc;

use market_data::metrics::IngestMetrics;

use crate::history::HistoryService;
use crate::markets::MarketRegistry;
use crate::notify::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub history: Arc<HistoryService>,
    pub markets: Arc<MarketRegistry>,
    pub metrics: Arc<IngestMetrics>,
    pub notifier: Arc<Notifier>,
    /// Whether this process runs collectors (false for `ROLE=web`)
    pub collecting: bool,
}

impl AppState {
    /// Report a failed request without delaying the response.
    pub fn report(&self, content: String) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            notifier.notify(&content).await;
        });
    }
}
