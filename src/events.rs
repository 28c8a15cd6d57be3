use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::node::NodeStatus;

const CHANNEL_CAPACITY: usize = 64;

/// A node's output changed.
#[derive(Clone, Debug, Serialize)]
pub struct NodeOutputUpdated {
    pub node_id: String,
    pub node_name: String,
    /// Query that produced the output.
    pub query: String,
    pub output: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct StatusChanged {
    pub node_id: String,
    pub from: NodeStatus,
    pub to: NodeStatus,
}

/// A message was appended to a node's short-term history.
#[derive(Clone, Debug, Serialize)]
pub struct MessageUpdated {
    pub node_id: String,
    pub role: String,
    pub content: String,
}

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Typed pub/sub channel. Callbacks run synchronously on the publishing
/// task; broadcast receivers observe the same events asynchronously.
pub struct EventChannel<E: Clone + Send + 'static> {
    callbacks: RwLock<Vec<Callback<E>>>,
    tx: broadcast::Sender<E>,
}

impl<E: Clone + Send + 'static> EventChannel<E> {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            callbacks: RwLock::new(Vec::new()),
            tx,
        }
    }

    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.callbacks.write().push(Arc::new(callback));
    }

    pub fn receiver(&self) -> broadcast::Receiver<E> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: E) {
        let callbacks: Vec<Callback<E>> = self.callbacks.read().clone();
        for callback in callbacks {
            callback(&event);
        }
        // no receivers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.callbacks.read().len() + self.tx.receiver_count()
    }
}

impl<E: Clone + Send + 'static> Default for EventChannel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Send + 'static> fmt::Debug for EventChannel<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("callbacks", &self.callbacks.read().len())
            .finish()
    }
}

/// One channel per event kind, shared by a node and its observers.
#[derive(Debug, Default)]
pub struct NodeListeners {
    pub output: EventChannel<NodeOutputUpdated>,
    pub status: EventChannel<StatusChanged>,
    pub message: EventChannel<MessageUpdated>,
}

pub type SharedListeners = Arc<NodeListeners>;

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn callbacks_run_in_registration_order() {
        let channel: EventChannel<StatusChanged> = EventChannel::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let seen = seen.clone();
            channel.subscribe(move |event: &StatusChanged| {
                seen.lock().push(format!("{tag}:{:?}", event.to));
            });
        }
        channel.publish(StatusChanged {
            node_id: "n".into(),
            from: NodeStatus::Idle,
            to: NodeStatus::Running,
        });
        assert_eq!(
            *seen.lock(),
            vec!["first:Running".to_string(), "second:Running".to_string()]
        );
    }

    #[tokio::test]
    async fn receivers_observe_published_events() {
        let channel: EventChannel<MessageUpdated> = EventChannel::new();
        let mut rx = channel.receiver();
        channel.publish(MessageUpdated {
            node_id: "n".into(),
            role: "user".into(),
            content: "hi".into(),
        });
        let event = rx.recv().await.expect("event");
        assert_eq!(event.content, "hi");
    }
}
