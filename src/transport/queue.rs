//! Per-user inbound queues
//!
//! Every user gets one worker task fed by an mpsc channel. A user's messages
//! are handled one at a time in arrival order; different users proceed in
//! parallel.

use super::{Inbound, InboundHandler, ReplySink};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

pub struct UserQueues {
    sink: Arc<dyn ReplySink>,
    handler: Arc<dyn InboundHandler>,
    queues: Mutex<HashMap<String, mpsc::UnboundedSender<Inbound>>>,
}

impl UserQueues {
    pub fn new(sink: Arc<dyn ReplySink>, handler: Arc<dyn InboundHandler>) -> Self {
        Self {
            sink,
            handler,
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Queue `inbound` behind the same user's earlier messages
    pub async fn push(&self, inbound: Inbound) {
        let mut queues = self.queues.lock().await;
        let inbound = match queues.get(&inbound.user_id) {
            Some(tx) => match tx.send(inbound) {
                Ok(()) => return,
                // The worker died with a panic; start a fresh one
                Err(mpsc::error::SendError(inbound)) => inbound,
            },
            None => inbound,
        };

        let user_id = inbound.user_id.clone();
        let tx = self.spawn_worker(user_id.clone());
        if tx.send(inbound).is_err() {
            tracing::error!(user = %user_id, "Inbound worker exited before its first message");
        }
        queues.insert(user_id, tx);
    }

    fn spawn_worker(&self, user_id: String) -> mpsc::UnboundedSender<Inbound> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Inbound>();
        let sink = Arc::clone(&self.sink);
        let handler = Arc::clone(&self.handler);
        tracing::debug!(user = %user_id, "Starting inbound worker");

        tokio::spawn(async move {
            while let Some(inbound) = rx.recv().await {
                handler.handle(sink.as_ref(), inbound).await;
            }
            tracing::debug!(user = %user_id, "Inbound worker stopped");
        });
        tx
    }
}
