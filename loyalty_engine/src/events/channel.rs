//! Stateless pub-sub event delivery.
//!
//! Components publish events through cheap, cloneable [`EventProducer`]s. A single [`EventHandler`] per event type
//! drains the channel and runs the registered async callback for each event on its own task. Callbacks only see the
//! event itself, never the internal state of the pipeline.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    receiver: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    callback: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, callback: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        Self { receiver, sender, callback }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Handles events until every producer has been dropped, then waits for the callbacks still in flight.
    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // Only the subscribers keep the channel open from here on
        drop(self.sender);
        let mut jobs = JoinSet::new();
        while let Some(ev) = self.receiver.recv().await {
            let callback = Arc::clone(&self.callback);
            jobs.spawn(async move { (callback)(ev).await });
            // Reap finished jobs as we go so the set does not grow without bound
            while let Some(result) = jobs.try_join_next() {
                log_job_result(result);
            }
        }
        if !jobs.is_empty() {
            debug!("📬️ Waiting for {} event handler jobs to complete", jobs.len());
        }
        while let Some(result) = jobs.join_next().await {
            log_job_result(result);
        }
        debug!("📬️ Event handler has shut down");
    }
}

fn log_job_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        warn!("📬️ An event handler job failed: {e}");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    /// Waits for room in the channel. The event is dropped, with an error in the log, if the handler has gone away.
    pub async fn publish_event(&self, event: E) {
        if self.sender.send(event).await.is_err() {
            error!("📬️ The event handler has shut down. Event dropped");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
