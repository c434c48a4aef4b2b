//! In-memory topic exchange.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use crate::topic::{is_valid_pattern, topic_matches};
use crate::{Message, MessagingError, Result};

/// Number of recently published messages kept for inspection.
const JOURNAL_CAPACITY: usize = 1024;

/// Anything that can put a message on the exchange.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, message: Message) -> Result<()>;
}

struct Binding {
    queue: String,
    patterns: Vec<String>,
    sender: mpsc::UnboundedSender<Message>,
}

impl Binding {
    fn accepts(&self, routing_key: &str) -> bool {
        self.patterns.iter().any(|p| topic_matches(p, routing_key))
    }
}

/// Consuming end of a declared queue.
pub struct QueueReceiver {
    name: String,
    receiver: mpsc::UnboundedReceiver<Message>,
}

impl QueueReceiver {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Waits for the next message; `None` once the broker is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    /// Returns a buffered message without waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.receiver.try_recv().ok()
    }
}

/// Topic exchange whose queues live in process memory.
///
/// Cloning shares the exchange.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    bindings: Arc<RwLock<Vec<Binding>>>,
    journal: Arc<RwLock<VecDeque<Message>>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a queue bound to `patterns` and returns its consuming end.
    ///
    /// Messages published after this call are buffered in the queue until read.
    pub async fn declare_queue(&self, name: &str, patterns: &[&str]) -> Result<QueueReceiver> {
        if let Some(bad) = patterns.iter().find(|p| !is_valid_pattern(p)) {
            return Err(MessagingError::InvalidPattern(bad.to_string()));
        }

        let mut bindings = self.bindings.write().await;
        if bindings.iter().any(|b| b.queue == name) {
            return Err(MessagingError::QueueExists(name.to_string()));
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        bindings.push(Binding {
            queue: name.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            sender,
        });
        info!(queue = name, ?patterns, "queue declared");

        Ok(QueueReceiver {
            name: name.to_string(),
            receiver,
        })
    }

    /// Returns recently published messages whose routing key matches `pattern`.
    pub async fn published(&self, pattern: &str) -> Vec<Message> {
        self.journal
            .read()
            .await
            .iter()
            .filter(|m| topic_matches(pattern, &m.routing_key))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryBroker {
    #[tracing::instrument(name = "broker.publish", skip_all, fields(routing_key = %message.routing_key))]
    async fn publish(&self, message: Message) -> Result<()> {
        let mut delivered = 0usize;
        {
            let mut bindings = self.bindings.write().await;
            bindings.retain(|binding| {
                if !binding.accepts(&message.routing_key) {
                    return true;
                }
                match binding.sender.send(message.clone()) {
                    Ok(()) => {
                        delivered += 1;
                        true
                    }
                    Err(_) => {
                        warn!(queue = %binding.queue, "queue consumer dropped, unbinding");
                        false
                    }
                }
            });
        }

        {
            let mut journal = self.journal.write().await;
            if journal.len() == JOURNAL_CAPACITY {
                journal.pop_front();
            }
            journal.push_back(message);
        }

        metrics::counter!("messages_published_total").increment(1);
        debug!(queues = delivered, "message routed");
        Ok(())
    }
}
