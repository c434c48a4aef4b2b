//! Queue consumers.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{Message, QueueReceiver};

/// Reacts to messages taken off a queue.
///
/// Handlers own their error reporting: a failed message is logged by the
/// handler and the consumer moves on to the next one.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, message: Message);
}

/// Spawns a task feeding every message from `queue` to `handler`, in order.
///
/// The task ends when the broker is dropped.
pub fn spawn_consumer<H>(mut queue: QueueReceiver, handler: Arc<H>) -> JoinHandle<()>
where
    H: MessageHandler + ?Sized,
{
    tokio::spawn(async move {
        info!(queue = queue.name(), "consumer started");
        while let Some(message) = queue.recv().await {
            debug!(
                queue = queue.name(),
                routing_key = %message.routing_key,
                message_id = %message.message_id,
                "message received"
            );
            handler.handle(message).await;
        }
        info!(queue = queue.name(), "consumer stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventPublisher, InMemoryBroker};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MessageHandler for Recorder {
        async fn handle(&self, message: Message) {
            self.seen.lock().await.push(message.routing_key);
        }
    }

    #[tokio::test]
    async fn consumer_sees_messages_published_before_it_started() {
        let broker = InMemoryBroker::new();
        let queue = broker
            .declare_queue("test.orders", &["order.*"])
            .await
            .unwrap();

        for key in ["order.created", "order.paid", "bank.refund.success"] {
            broker
                .publish(Message::new(key, &serde_json::json!({})).unwrap())
                .await
                .unwrap();
        }

        let recorder = Arc::new(Recorder::default());
        let handle = spawn_consumer(queue, recorder.clone());

        for _ in 0..50 {
            if recorder.seen.lock().await.len() == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(
            *recorder.seen.lock().await,
            vec!["order.created".to_string(), "order.paid".to_string()]
        );

        drop(broker);
        handle.await.unwrap();
    }
}
