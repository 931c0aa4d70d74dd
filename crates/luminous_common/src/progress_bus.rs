//! Progress fan-out
//!
//! Async subscribers get a broadcast receiver; synchronous observers register
//! a callback. Slow subscribers lag and lose events, publishers never wait.

use luminous_shared::{Checkpoint, ProgressEvent};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 256;

pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

#[derive(Clone)]
pub struct ProgressBus {
    sender: broadcast::Sender<ProgressEvent>,
    callbacks: Arc<RwLock<Vec<ProgressCallback>>>,
}

impl ProgressBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            callbacks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    /// Callbacks run on the publishing task, in registration order. A callback
    /// may register further callbacks; those see the next event.
    pub fn register_callback<F>(&self, callback: F)
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        let mut callbacks = self.callbacks.write().unwrap_or_else(|e| e.into_inner());
        callbacks.push(Arc::new(callback));
    }

    pub fn publish(&self, event: ProgressEvent) {
        debug!("{}", event.format_debug());
        let callbacks: Vec<ProgressCallback> = self
            .callbacks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for callback in &callbacks {
            callback(&event);
        }
        // No receivers is not an error
        let _ = self.sender.send(event);
    }

    pub fn checkpoint(&self, operation_id: Uuid, checkpoint: Checkpoint, message: impl Into<String>) {
        self.publish(ProgressEvent::checkpoint(operation_id, checkpoint, message));
    }

    pub fn output_line(&self, operation_id: Uuid, line: impl Into<String>) {
        self.publish(ProgressEvent::output_line(operation_id, line));
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for ProgressBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let callbacks = self.callbacks.read().map(|c| c.len()).unwrap_or(0);
        f.debug_struct("ProgressBus")
            .field("subscribers", &self.sender.receiver_count())
            .field("callbacks", &callbacks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_callback_can_register_another_callback() {
        let bus = ProgressBus::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let inner_bus = bus.clone();
        let outer_seen = Arc::clone(&seen);
        bus.register_callback(move |event| {
            outer_seen.lock().unwrap().push(format!("outer:{}", event.percent));
            let inner_seen = Arc::clone(&outer_seen);
            inner_bus.register_callback(move |e| {
                inner_seen.lock().unwrap().push(format!("inner:{}", e.percent));
            });
        });

        let id = Uuid::new_v4();
        bus.checkpoint(id, Checkpoint::Started, "start");
        bus.checkpoint(id, Checkpoint::Prepared, "prepared");

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["outer:0", "outer:20", "inner:20"]
        );
    }

    #[test]
    fn test_callbacks_in_registration_order() {
        let bus = ProgressBus::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            bus.register_callback(move |event| {
                seen.lock().unwrap().push(format!("{}:{}", tag, event.percent));
            });
        }
        bus.checkpoint(Uuid::new_v4(), Checkpoint::Running, "running");
        assert_eq!(*seen.lock().unwrap(), vec!["first:50", "second:50"]);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = ProgressBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        let id = Uuid::new_v4();
        bus.checkpoint(id, Checkpoint::Started, "start");
        bus.output_line(id, "building...");

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.recv().await.unwrap().percent, 0.0);
            let line = rx.recv().await.unwrap();
            assert!(line.is_indeterminate());
            assert_eq!(line.message, "building...");
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = ProgressBus::new(1);
        bus.checkpoint(Uuid::new_v4(), Checkpoint::Finished, "done");
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let bus = ProgressBus::new(2);
        let mut rx = bus.subscribe();
        let id = Uuid::new_v4();
        for i in 0..5 {
            bus.output_line(id, format!("line {}", i));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert_eq!(rx.recv().await.unwrap().message, "line 3");
    }
}
