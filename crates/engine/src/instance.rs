use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use common::{
    Error, Execution, LogBuffer, LogEntry, LogLevel, MarketDataProvider, Order, PerformanceCounters,
    PriceWindow, Result, Signal, StrategyConfig, StrategyId, StrategySnapshot, StrategyStatus,
};
use strategy::{Algorithm, AlgorithmKind, Strategy};

use crate::router::ExecutionRouter;

/// The single position an instance may hold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenPosition {
    pub entry_price: f64,
    pub quantity: f64,
    pub opened_at: DateTime<Utc>,
}

#[derive(Default)]
struct InstanceState {
    status: StrategyStatus,
    logs: LogBuffer,
    counters: PerformanceCounters,
    position: Option<OpenPosition>,
    tick_errors: u64,
}

struct LoopHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// One configured algorithm with its own lifecycle, log and counters.
///
/// While running, a dedicated task ticks every `poll_interval`. Ticks are
/// strictly sequential: the algorithm lock is held from price fetch until
/// the fill is recorded.
pub struct StrategyInstance {
    inner: Arc<Inner>,
    runtime: Mutex<Option<LoopHandle>>,
}

struct Inner {
    config: StrategyConfig,
    kind: AlgorithmKind,
    algorithm: Mutex<Algorithm>,
    state: RwLock<InstanceState>,
    router: Arc<ExecutionRouter>,
    market: Arc<dyn MarketDataProvider>,
    call_timeout: Duration,
}

impl StrategyInstance {
    pub fn new(
        config: StrategyConfig,
        algorithm: Algorithm,
        router: Arc<ExecutionRouter>,
        market: Arc<dyn MarketDataProvider>,
    ) -> Self {
        let mut state = InstanceState::default();
        state.logs.push(
            LogLevel::Info,
            format!(
                "Created {} on {} ({} mode, venue {})",
                algorithm.kind(),
                config.pair,
                config.mode,
                config.venue
            ),
        );
        Self {
            inner: Arc::new(Inner {
                call_timeout: router.call_timeout(),
                kind: algorithm.kind(),
                config,
                algorithm: Mutex::new(algorithm),
                state: RwLock::new(state),
                router,
                market,
            }),
            runtime: Mutex::new(None),
        }
    }

    pub fn id(&self) -> StrategyId {
        self.inner.config.id
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.inner.config
    }

    pub fn kind(&self) -> AlgorithmKind {
        self.inner.kind
    }

    pub async fn status(&self) -> StrategyStatus {
        self.inner.state.read().await.status
    }

    /// Spawn the evaluation loop. Returns `false` if it was already running.
    /// Starting from `Error` is an explicit restart.
    pub async fn start(&self) -> bool {
        let mut runtime = self.runtime.lock().await;
        if let Some(handle) = runtime.as_ref() {
            let halted = self.status().await == StrategyStatus::Error;
            if !halted && !handle.task.is_finished() {
                self.inner.log(LogLevel::Info, "Start ignored: already running").await;
                return false;
            }
        }
        // A loop that halted on a fatal error has exited or is about to.
        if let Some(old) = runtime.take() {
            let _ = old.task.await;
        }

        self.inner.transition(StrategyStatus::Running, None).await;
        let (cancel, cancelled) = watch::channel(false);
        let task = tokio::spawn(Inner::run(self.inner.clone(), cancelled));
        *runtime = Some(LoopHandle { cancel, task });
        true
    }

    /// Signal the loop and wait for it to exit. An in-flight tick finishes,
    /// no new tick starts. Returns `false` if there was nothing to stop.
    pub async fn stop(&self) -> bool {
        let mut runtime = self.runtime.lock().await;
        let Some(handle) = runtime.take() else {
            if self.status().await == StrategyStatus::Stopped {
                self.inner.log(LogLevel::Info, "Stop ignored: already stopped").await;
                return false;
            }
            self.inner.transition(StrategyStatus::Stopped, None).await;
            return true;
        };

        let _ = handle.cancel.send(true);
        if let Err(e) = handle.task.await {
            self.inner
                .log(LogLevel::Error, format!("Evaluation loop aborted: {e}"))
                .await;
        }
        self.inner.transition(StrategyStatus::Stopped, None).await;
        true
    }

    /// Run one evaluation outside the loop. Serialized with loop ticks.
    pub async fn tick(&self) -> Result<Option<Execution>> {
        self.inner.tick().await
    }

    pub async fn snapshot(&self) -> StrategySnapshot {
        let config = &self.inner.config;
        let state = self.inner.state.read().await;
        StrategySnapshot {
            id: config.id,
            name: config.name.clone(),
            algorithm: self.inner.kind.id().to_string(),
            pair: config.pair.clone(),
            mode: config.mode,
            venue: config.venue.clone(),
            status: state.status,
            performance: state.counters.into(),
            position_open: state.position.is_some(),
            tick_errors: state.tick_errors,
        }
    }

    pub async fn logs(&self) -> Vec<LogEntry> {
        self.inner.state.read().await.logs.snapshot()
    }

    pub async fn position(&self) -> Option<OpenPosition> {
        self.inner.state.read().await.position
    }

    pub async fn counters(&self) -> PerformanceCounters {
        self.inner.state.read().await.counters
    }
}

impl Inner {
    async fn run(self: Arc<Self>, mut cancelled: watch::Receiver<bool>) {
        let interval = self.config.poll_interval();
        info!(id = self.config.id, kind = %self.kind, ?interval, "Evaluation loop started");

        loop {
            if *cancelled.borrow() {
                break;
            }

            match self.tick().await {
                Ok(_) => {}
                Err(e) if e.is_fatal() => {
                    self.transition(StrategyStatus::Error, Some(&e)).await;
                    break;
                }
                Err(e) => {
                    self.state.write().await.tick_errors += 1;
                    self.log(LogLevel::Warn, format!("Tick failed: {e}")).await;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = cancelled.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!(id = self.config.id, "Evaluation loop exited");
    }

    async fn tick(&self) -> Result<Option<Execution>> {
        let mut algorithm = self.algorithm.lock().await;
        let pair = &self.config.pair;

        let closes = self
            .timed("price_window", self.market.price_window(pair, algorithm.window_len()))
            .await?;
        let reference = if algorithm.needs_reference_price() {
            self.timed("reference_price", self.market.reference_price(pair))
                .await?
        } else {
            None
        };

        let window = PriceWindow::with_reference(&closes, reference);
        let signal = algorithm.evaluate(&window)?;
        let Some(price) = window.last().filter(|_| signal != Signal::Hold) else {
            debug!(id = self.config.id, %pair, "HOLD");
            return Ok(None);
        };

        self.log(LogLevel::Info, format!("Signal {signal} at {price}")).await;
        self.execute(signal, price, algorithm.order_notional()).await
    }

    /// Route an actionable signal and book the result. Buying while long and
    /// selling while flat are no-ops.
    async fn execute(
        &self,
        signal: Signal,
        price: f64,
        notional: Option<f64>,
    ) -> Result<Option<Execution>> {
        let Some(side) = signal.side() else {
            return Ok(None);
        };

        let position = self.state.read().await.position;
        let quantity = match (signal, position) {
            (Signal::Buy, Some(_)) => {
                self.log(LogLevel::Info, "BUY ignored: position already open").await;
                return Ok(None);
            }
            (Signal::Sell, None) => {
                self.log(LogLevel::Info, "SELL ignored: no open position").await;
                return Ok(None);
            }
            (Signal::Sell, Some(open)) => open.quantity,
            _ => notional.unwrap_or(self.config.capital) / price,
        };

        let order = Order::market(&self.config.venue, &self.config.pair, side, quantity);
        // A failed order only costs this tick.
        let execution = self
            .router
            .route(self.config.mode, &order, price)
            .await
            .map_err(|e| match e {
                e if e.is_fatal() => Error::Exchange(format!("{}: {e}", order.venue)),
                e => e,
            })?;
        let fill = execution.fill();

        let mut state = self.state.write().await;
        let mut message = format!(
            "{} fill: {} {:.8} {} @ {}",
            execution.label(),
            fill.side,
            fill.quantity,
            fill.pair,
            fill.fill_price
        );
        if let Execution::Simulated { reason, .. } = &execution {
            message.push_str(&format!(" (simulated: {reason})"));
        }
        match (signal, state.position.take()) {
            (Signal::Sell, Some(open)) => {
                let pnl = (fill.fill_price - open.entry_price) * open.quantity;
                state.counters.record(pnl);
                message.push_str(&format!(", round trip pnl {pnl:.4}"));
            }
            _ => {
                state.position = Some(OpenPosition {
                    entry_price: fill.fill_price,
                    quantity: fill.quantity,
                    opened_at: fill.timestamp,
                });
            }
        }
        info!(id = self.config.id, "{message}");
        state.logs.push(LogLevel::Info, message);
        Ok(Some(execution))
    }

    async fn timed<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| Error::Timeout {
                operation: operation.to_string(),
                secs: self.call_timeout.as_secs(),
            })?
    }

    /// Change status and log the transition. A fatal cause only halts a
    /// running instance; a concurrent stop wins.
    async fn transition(&self, to: StrategyStatus, cause: Option<&Error>) {
        let mut state = self.state.write().await;
        let from = state.status;
        if to == StrategyStatus::Error && from != StrategyStatus::Running {
            return;
        }
        state.status = to;
        let message = match cause {
            Some(e) => format!("Status: {from} -> {to} ({e})"),
            None => format!("Status: {from} -> {to}"),
        };
        match to {
            StrategyStatus::Error => error!(id = self.config.id, "{message}"),
            _ => info!(id = self.config.id, "{message}"),
        }
        state
            .logs
            .push(if cause.is_some() { LogLevel::Error } else { LogLevel::Info }, message);
    }

    async fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info => info!(id = self.config.id, "{message}"),
            LogLevel::Warn => warn!(id = self.config.id, "{message}"),
            LogLevel::Error => error!(id = self.config.id, "{message}"),
        }
        self.state.write().await.logs.push(level, message);
    }
}
