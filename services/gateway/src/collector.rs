//! Per-market collectors
//!
//! ## Event queue collector
//! Each poll:
//! 1. Load the market's cursor (`LASTSEQ`)
//! 2. Fetch the event queue account
//! 3. Decode the events newer than the cursor
//! 4. Convert taker fills to trades stamped with the poll time
//! 5. Append the trades, then store the observed `seq_num` as the cursor
//!
//! A fetch or decode failure leaves the cursor untouched. A storage failure
//! while appending stops that poll's appends and still advances the
//! cursor, since replaying the already written prefix would double-count
//! volume.
//!
//! ## Snapshot collector
//! Polls a source of currently visible fills and relies on an
//! [`OrderBuffer`] to emit each fill once. The first snapshot after
//! (re)start only primes the buffer.
//!
//! ## Supervision
//! [`Supervisor`] restarts a loop that exits abnormally after a backoff.
//! Every loop stops when its [`CancellationToken`] is cancelled.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use market_data::events::DecodeError;
use market_data::fills::{FillExtractor, NativeScale};
use market_data::ingestion::decode_recent_events;
use market_data::metrics::IngestMetrics;
use market_data::order_buffer::OrderBuffer;
use persistence::list::Clock;
use persistence::{StoreError, TradeStore, CURSOR_KEY};
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use types::ids::MarketId;
use types::trade::Trade;

use crate::markets::{Market, MarketRegistry};
use crate::notify::Notifier;
use crate::rpc::{AccountSource, SnapshotSource, SourceError};

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("storage failed: {0}")]
    Store(#[from] StoreError),

    #[error("stored {stored} of {total} trades: {source}")]
    PartialStore {
        stored: usize,
        total: usize,
        source: StoreError,
    },

    #[error("storage task failed: {0}")]
    Task(String),
}

/// Result of one successful poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub seq_num: Option<u32>,
    pub decoded: usize,
    pub stored: usize,
    pub skipped: u32,
}

/// Dependencies shared by every collector of a process.
#[derive(Clone)]
pub struct CollectorContext {
    pub store: Arc<dyn TradeStore>,
    pub notifier: Arc<Notifier>,
    pub metrics: Arc<IngestMetrics>,
    pub clock: Clock,
    pub interval: Duration,
}

// ── Storage helpers ─────────────────────────────────────

async fn blocking<T, F>(f: F) -> Result<T, CollectError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CollectError::Task(e.to_string()))?
        .map_err(CollectError::Store)
}

/// Append trades in order, stopping at the first failure.
async fn append_trades(
    store: &Arc<dyn TradeStore>,
    market: &MarketId,
    trades: Vec<Trade>,
) -> Result<(usize, Option<StoreError>), CollectError> {
    let store = Arc::clone(store);
    let market = market.clone();
    tokio::task::spawn_blocking(move || {
        for (stored, trade) in trades.iter().enumerate() {
            if let Err(e) = store.store_trade(&market, trade) {
                return (stored, Some(e));
            }
        }
        (trades.len(), None)
    })
    .await
    .map_err(|e| CollectError::Task(e.to_string()))
}

/// Sleep for `interval`; `false` once cancelled.
async fn pause(interval: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(interval) => true,
    }
}

// ── Event queue ─────────────────────────────────────────

#[derive(Clone)]
pub struct EventQueueCollector {
    market: Arc<Market>,
    queue: String,
    source: Arc<dyn AccountSource>,
    extractor: FillExtractor<NativeScale>,
    ctx: CollectorContext,
}

impl EventQueueCollector {
    pub fn new(
        market: Arc<Market>,
        queue: String,
        scale: NativeScale,
        source: Arc<dyn AccountSource>,
        ctx: CollectorContext,
    ) -> Self {
        Self {
            market,
            queue,
            source,
            extractor: FillExtractor::new(scale),
            ctx,
        }
    }

    pub fn market(&self) -> &MarketId {
        &self.market.id
    }

    pub async fn poll_once(&self) -> Result<PollOutcome, CollectError> {
        let started = Instant::now();
        let name = self.market.id.as_str();
        let metrics = &self.ctx.metrics;

        let store = Arc::clone(&self.ctx.store);
        let id = self.market.id.clone();
        let cursor = blocking(move || store.load_number(&id, CURSOR_KEY)).await?;
        let last_seen = cursor.and_then(|v| match u32::try_from(v) {
            Ok(seq) => Some(seq),
            Err(_) => {
                warn!(market = name, cursor = v, "Cursor out of range, bootstrapping");
                None
            }
        });

        let data = self.source.fetch_account(&self.queue).await?;
        let recent = decode_recent_events(&data, last_seen)?;
        let seq_num = recent.header.seq_num;

        match last_seen {
            None => info!(market = name, seq_num, "Bootstrapping cursor"),
            Some(last) if recent.skipped > 0 => warn!(
                market = name,
                last_seen = last,
                seq_num,
                skipped = recent.skipped,
                "Event queue overrun, events lost"
            ),
            Some(_) => {}
        }

        let trades = self.extractor.extract(&recent.events, (self.ctx.clock)());
        let total = trades.len();
        let (stored, write_error) = append_trades(&self.ctx.store, &self.market.id, trades).await?;
        metrics.record_trades_stored(stored as u64);
        if write_error.is_some() {
            metrics.record_store_failure();
        }

        let store = Arc::clone(&self.ctx.store);
        let id = self.market.id.clone();
        blocking(move || store.store_number(&id, CURSOR_KEY, u64::from(seq_num))).await?;

        metrics.record_poll(
            started.elapsed().as_millis() as u64,
            recent.events.len() as u64,
            u64::from(recent.skipped),
        );

        if let Some(source) = write_error {
            return Err(CollectError::PartialStore {
                stored,
                total,
                source,
            });
        }
        if stored > 0 {
            info!(market = name, count = stored, seq_num, "Stored trades");
        } else {
            debug!(market = name, seq_num, "No new trades");
        }

        Ok(PollOutcome {
            seq_num: Some(seq_num),
            decoded: recent.events.len(),
            stored,
            skipped: recent.skipped,
        })
    }

    pub async fn run(self, cancel: CancellationToken) {
        info!(market = %self.market.id, queue = %self.queue, "Event queue collector started");
        loop {
            if let Err(e) = self.poll_once().await {
                self.ctx.metrics.record_poll_failure();
                error!(market = %self.market.id, error = %e, "Event queue poll failed");
                self.ctx
                    .notifier
                    .notify(&format!("collectEventQueue {} {}", self.market.id, e))
                    .await;
            }
            if !pause(self.ctx.interval, &cancel).await {
                break;
            }
        }
        info!(market = %self.market.id, "Event queue collector stopped");
    }
}

// ── Snapshot ────────────────────────────────────────────

pub struct SnapshotCollector {
    market: Arc<Market>,
    url: String,
    source: Arc<dyn SnapshotSource>,
    buffer: OrderBuffer,
    primed: bool,
    ctx: CollectorContext,
}

impl SnapshotCollector {
    pub fn new(
        market: Arc<Market>,
        url: String,
        source: Arc<dyn SnapshotSource>,
        ctx: CollectorContext,
    ) -> Self {
        Self {
            market,
            url,
            source,
            buffer: OrderBuffer::with_defaults(),
            primed: false,
            ctx,
        }
    }

    pub async fn poll_once(&mut self) -> Result<PollOutcome, CollectError> {
        let started = Instant::now();
        let name = self.market.id.as_str();
        let fills = self.source.fetch_fills(&self.url).await?;

        let suppressed_before = self.buffer.suppressed();
        let trades = self.buffer.filter_new_trades(&fills, (self.ctx.clock)());
        if !self.primed {
            self.primed = true;
            info!(market = name, count = trades.len(), "Primed order buffer");
            self.ctx
                .metrics
                .record_poll(started.elapsed().as_millis() as u64, fills.len() as u64, 0);
            return Ok(PollOutcome {
                seq_num: None,
                decoded: fills.len(),
                stored: 0,
                skipped: 0,
            });
        }
        self.ctx
            .metrics
            .record_duplicates(self.buffer.suppressed() - suppressed_before);

        let total = trades.len();
        let (stored, write_error) = append_trades(&self.ctx.store, &self.market.id, trades).await?;
        self.ctx.metrics.record_trades_stored(stored as u64);
        self.ctx
            .metrics
            .record_poll(started.elapsed().as_millis() as u64, fills.len() as u64, 0);

        if let Some(source) = write_error {
            self.ctx.metrics.record_store_failure();
            return Err(CollectError::PartialStore {
                stored,
                total,
                source,
            });
        }
        if stored > 0 {
            info!(market = name, count = stored, "Stored trades");
        }
        Ok(PollOutcome {
            seq_num: None,
            decoded: fills.len(),
            stored,
            skipped: 0,
        })
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        info!(market = %self.market.id, url = %self.url, "Snapshot collector started");
        loop {
            if let Err(e) = self.poll_once().await {
                self.ctx.metrics.record_poll_failure();
                error!(market = %self.market.id, error = %e, "Snapshot poll failed");
                self.ctx
                    .notifier
                    .notify(&format!("collectFills {} {}", self.market.id, e))
                    .await;
            }
            if !pause(self.ctx.interval, &cancel).await {
                break;
            }
        }
        info!(market = %self.market.id, "Snapshot collector stopped");
    }
}

// ── Supervisor ──────────────────────────────────────────

/// Keeps named loops running until cancelled.
pub struct Supervisor {
    cancel: CancellationToken,
    tasks: JoinSet<()>,
    metrics: Arc<IngestMetrics>,
    backoff: Duration,
}

impl Supervisor {
    pub fn new(cancel: CancellationToken, metrics: Arc<IngestMetrics>, backoff: Duration) -> Self {
        Self {
            cancel,
            tasks: JoinSet::new(),
            metrics,
            backoff,
        }
    }

    /// Run `factory`'s loop, starting a fresh one whenever it ends before
    /// cancellation.
    pub fn spawn<F, Fut>(&mut self, name: String, factory: F)
    where
        F: Fn(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let metrics = Arc::clone(&self.metrics);
        let backoff = self.backoff;

        self.tasks.spawn(async move {
            loop {
                let result = tokio::spawn(factory(cancel.child_token())).await;
                if cancel.is_cancelled() {
                    break;
                }
                match result {
                    Ok(()) => warn!(task = %name, "Loop exited early, restarting"),
                    Err(e) if e.is_panic() => error!(task = %name, "Loop panicked, restarting"),
                    Err(e) => {
                        warn!(task = %name, error = %e, "Loop aborted");
                        break;
                    }
                }
                metrics.record_restart();
                if !pause(backoff, &cancel).await {
                    break;
                }
            }
            debug!(task = %name, "Supervised loop finished");
        });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Cancel every loop and wait for them to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Supervised task failed during shutdown");
            }
        }
    }
}

/// Start a supervised collector for every market with a configured source.
///
/// Returns the number of loops started.
pub fn spawn_collectors(
    supervisor: &mut Supervisor,
    markets: &MarketRegistry,
    accounts: Arc<dyn AccountSource>,
    snapshots: Arc<dyn SnapshotSource>,
    ctx: &CollectorContext,
) -> usize {
    let before = supervisor.len();
    for market in markets.iter() {
        let config = &market.config;
        if let Some(queue) = &config.event_queue {
            let Some(scale) = config.native_scale() else {
                warn!(market = %market.id, "Token decimals out of range, not collecting");
                continue;
            };
            let collector = EventQueueCollector::new(
                Arc::clone(market),
                queue.clone(),
                scale,
                Arc::clone(&accounts),
                ctx.clone(),
            );
            supervisor.spawn(format!("eventQueue {}", market.id), move |cancel| {
                collector.clone().run(cancel)
            });
        }
        if let Some(url) = &config.fills_url {
            let (market, url, source, ctx) = (
                Arc::clone(market),
                url.clone(),
                Arc::clone(&snapshots),
                ctx.clone(),
            );
            supervisor.spawn(format!("fills {}", market.id), move |cancel| {
                SnapshotCollector::new(
                    Arc::clone(&market),
                    url.clone(),
                    Arc::clone(&source),
                    ctx.clone(),
                )
                .run(cancel)
            });
        }
        if config.event_queue.is_none() && config.fills_url.is_none() {
            debug!(market = %market.id, "No fill source configured");
        }
    }
    supervisor.len() - before
}
