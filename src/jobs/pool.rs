use super::{Dispatcher, LocalJobQueue};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Fixed set of workers pulling from a [`LocalJobQueue`]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl WorkerPool {
    pub fn spawn(queue: LocalJobQueue, dispatcher: Arc<Dispatcher>, workers: usize) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let handles = (0..workers.max(1))
            .map(|worker| {
                let queue = queue.clone();
                let dispatcher = dispatcher.clone();
                let mut shutdown_rx = shutdown_tx.subscribe();
                tokio::spawn(async move {
                    debug!("Worker {} started", worker);
                    loop {
                        let delivery = tokio::select! {
                            _ = shutdown_rx.recv() => break,
                            delivery = queue.next() => match delivery {
                                Some(delivery) => delivery,
                                None => break,
                            },
                        };

                        match dispatcher.dispatch(&delivery.job).await {
                            Ok(()) => queue.complete(&delivery),
                            Err(e) => queue.fail(delivery, e.to_string()),
                        }
                    }
                    debug!("Worker {} stopped", worker);
                })
            })
            .collect();

        info!("Started {} job workers", workers.max(1));
        Self {
            handles,
            shutdown_tx,
        }
    }

    /// Stop taking new jobs and wait for running ones to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        for result in join_all(self.handles).await {
            if let Err(e) = result {
                warn!("Worker panicked: {}", e);
            }
        }
        info!("Job workers stopped");
    }
}
