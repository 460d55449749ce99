use hand_broker::{BrokerError, Publisher};
use std::sync::Mutex;

/// In-memory [`Publisher`] that records every request, or rejects all of
/// them like a full or closed request queue would
#[derive(Default)]
pub struct RecordingPublisher {
    reject_publish: bool,
    reject_subscribe: bool,
    published: Mutex<Vec<(String, String)>>,
    subscriptions: Mutex<Vec<String>>,
}

impl RecordingPublisher {
    pub fn rejecting() -> Self {
        Self {
            reject_publish: true,
            reject_subscribe: true,
            ..Default::default()
        }
    }

    /// Accepts publishes but rejects every subscription request
    pub fn rejecting_subscriptions() -> Self {
        Self {
            reject_subscribe: true,
            ..Default::default()
        }
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().expect("publish log poisoned").clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions
            .lock()
            .expect("subscription log poisoned")
            .clone()
    }

    pub fn clear(&self) {
        self.published.lock().expect("publish log poisoned").clear();
        self.subscriptions
            .lock()
            .expect("subscription log poisoned")
            .clear();
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), BrokerError> {
        if self.reject_publish {
            return Err(BrokerError::Rejected("request queue full".to_string()));
        }
        self.published
            .lock()
            .expect("publish log poisoned")
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> Result<(), BrokerError> {
        if self.reject_subscribe {
            return Err(BrokerError::Rejected("request queue full".to_string()));
        }
        self.subscriptions
            .lock()
            .expect("subscription log poisoned")
            .push(topic.to_string());
        Ok(())
    }
}
