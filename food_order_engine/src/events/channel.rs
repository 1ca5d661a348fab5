//! Simple stateless pub-sub event handler
//!
//! Each hook gets its own bounded mpsc channel. Any number of [`EventProducer`]s can publish into it, and a single
//! [`EventHandler`] drains it, running the hook for every event on its own task. Hooks never see the engine's
//! internal state, only the event itself.
//!
//! When the last producer is dropped the handler stops accepting events, waits for the hooks still in flight, and
//! shuts down.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        Self { listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // Only the producers may keep the channel open
        drop(self.sender);
        let mut jobs = JoinSet::new();
        loop {
            tokio::select! {
                ev = self.listener.recv() => match ev {
                    Some(ev) => {
                        trace!("📬️ Handling event");
                        let handler = Arc::clone(&self.handler);
                        jobs.spawn(async move { (handler)(ev).await });
                    },
                    None => break,
                },
                Some(res) = jobs.join_next(), if !jobs.is_empty() => log_job_result(res),
            }
        }
        debug!("📬️ All producers have gone away. Waiting for {} hook(s) to finish", jobs.len());
        while let Some(res) = jobs.join_next().await {
            log_job_result(res);
        }
        debug!("📬️ Event handler has shut down");
    }
}

fn log_job_result(res: Result<(), tokio::task::JoinError>) {
    match res {
        Ok(()) => trace!("📬️ Event handled"),
        Err(e) => warn!("📬️ An event hook did not complete. {e}"),
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

    /// Publishes the event. Waits if the channel is full. If the handler has gone away, the event is dropped and the
    /// failure is logged.
    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}
