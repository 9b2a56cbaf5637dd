//! # Engine Event Loop
//!
//! Runs a [`Dispatcher`] on one tokio task. Stream events, UI intents, icon
//! completions and custom-icon table swaps all funnel into a single `select!`
//! loop, so every mutation of the layer state is serialised without locks.
//!
//! Shutdown is cooperative through a `CancellationToken`. When the stream
//! closes, the loop keeps running until the icon loads still in flight have
//! landed, then hands the dispatcher back through its `JoinHandle`.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::dispatcher::Dispatcher;
use crate::core::events::{DispatchOutcome, FeatureCounts, StreamEvent, UiIntent};
use crate::core::icons::{CustomIconTable, IconReady};

/// Default capacity of the stream channel.
pub const DEFAULT_STREAM_BUFFER: usize = 1_024;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine loop has stopped")]
    Closed,
}

/// Cloneable front door to a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    events: mpsc::Sender<StreamEvent>,
    intents: mpsc::UnboundedSender<UiIntent>,
    icon_table: Arc<watch::Sender<Arc<CustomIconTable>>>,
    counts: watch::Receiver<FeatureCounts>,
    shutdown: CancellationToken,
}

impl EngineHandle {
    /// Queues a stream event, waiting when the buffer is full.
    pub async fn send(&self, event: StreamEvent) -> Result<(), EngineError> {
        self.events.send(event).await.map_err(|_| EngineError::Closed)
    }

    pub fn intent(&self, intent: UiIntent) -> Result<(), EngineError> {
        self.intents.send(intent).map_err(|_| EngineError::Closed)
    }

    /// Publishes a new custom icon table. Only the latest table is applied
    /// when several are swapped in quick succession.
    pub fn swap_icon_table(&self, table: CustomIconTable) -> Result<(), EngineError> {
        self.icon_table
            .send(Arc::new(table))
            .map_err(|_| EngineError::Closed)
    }

    /// Counts last reported by the stream.
    pub fn counts(&self) -> watch::Receiver<FeatureCounts> {
        self.counts.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// Spawner for the engine task.
pub struct Engine;

impl Engine {
    /// Moves `dispatcher` onto its own task. Dropping every handle closes the
    /// stream, which ends the loop once pending icon loads have settled.
    pub fn spawn(
        dispatcher: Dispatcher,
        icon_rx: mpsc::UnboundedReceiver<IconReady>,
        stream_buffer: usize,
    ) -> (EngineHandle, JoinHandle<Dispatcher>) {
        let (events_tx, events_rx) = mpsc::channel(stream_buffer.max(1));
        let (intents_tx, intents_rx) = mpsc::unbounded_channel();
        let (table_tx, table_rx) = watch::channel(Arc::clone(dispatcher.icon_table()));
        let (counts_tx, counts_rx) = watch::channel(FeatureCounts::default());
        let shutdown = CancellationToken::new();

        let channels = Channels {
            events: events_rx,
            intents: intents_rx,
            icons: icon_rx,
            icon_table: table_rx,
            counts: counts_tx,
        };
        let task = tokio::spawn(run_engine(dispatcher, channels, shutdown.clone()));
        let handle = EngineHandle {
            events: events_tx,
            intents: intents_tx,
            icon_table: Arc::new(table_tx),
            counts: counts_rx,
            shutdown,
        };
        (handle, task)
    }
}

struct Channels {
    events: mpsc::Receiver<StreamEvent>,
    intents: mpsc::UnboundedReceiver<UiIntent>,
    icons: mpsc::UnboundedReceiver<IconReady>,
    icon_table: watch::Receiver<Arc<CustomIconTable>>,
    counts: watch::Sender<FeatureCounts>,
}

async fn run_engine(
    mut dispatcher: Dispatcher,
    mut channels: Channels,
    shutdown: CancellationToken,
) -> Dispatcher {
    log::info!("Engine loop started");
    let mut stream_open = true;
    let mut processed: u64 = 0;

    loop {
        if !stream_open && dispatcher.pending_icons() == 0 {
            break;
        }
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                log::info!("Engine shutdown requested");
                break;
            }
            Some(ready) = channels.icons.recv() => {
                dispatcher.on_icon_ready(ready);
            }
            Ok(()) = channels.icon_table.changed() => {
                let table = Arc::clone(&channels.icon_table.borrow_and_update());
                dispatcher.swap_icon_table(table);
            }
            Some(intent) = channels.intents.recv() => {
                dispatcher.handle_intent(intent);
            }
            event = channels.events.recv(), if stream_open => match event {
                Some(event) => {
                    processed += 1;
                    if let DispatchOutcome::Counts(counts) = dispatcher.dispatch(event) {
                        channels.counts.send_replace(counts);
                    }
                }
                None => {
                    log::info!(
                        "Stream closed after {} events; waiting on {} icon loads",
                        processed,
                        dispatcher.pending_icons()
                    );
                    stream_open = false;
                }
            },
        }
    }

    log::info!("Engine loop stopped: {}", dispatcher.counts());
    dispatcher
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dispatcher::DispatcherConfig;
    use crate::core::feature::{Feature, Geometry};
    use crate::core::handlers::maritime_registry;
    use crate::core::icons::NoopIconLoader;

    fn engine() -> (EngineHandle, JoinHandle<Dispatcher>) {
        let (dispatcher, icon_rx) = Dispatcher::new(
            maritime_registry().unwrap(),
            DispatcherConfig::default(),
            Arc::new(NoopIconLoader),
        );
        Engine::spawn(dispatcher, icon_rx, 8)
    }

    #[tokio::test]
    async fn drains_stream_and_returns_dispatcher() {
        let (handle, task) = engine();
        for i in 0..3 {
            let feature = Feature::new(
                format!("v{i}"),
                "ais",
                Geometry::Point { coordinates: [23.0 + i as f64 * 0.1, 38.0] },
            );
            handle.send(StreamEvent::Current { feature }).await.unwrap();
        }
        handle
            .send(StreamEvent::CountOnly { total: 3, visible: 2 })
            .await
            .unwrap();
        let counts = handle.counts();
        drop(handle);

        let dispatcher = task.await.unwrap();
        assert_eq!(dispatcher.counts().total, 3);
        assert_eq!(*counts.borrow(), FeatureCounts { total: 3, visible: 2 });
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop_with_handles_alive() {
        let (handle, task) = engine();
        handle.shutdown();
        let dispatcher = task.await.unwrap();
        assert_eq!(dispatcher.counts().total, 0);
        assert!(handle.send(StreamEvent::HistoryClearAll).await.is_err());
    }
}
