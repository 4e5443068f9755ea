//! In-process pub/sub broker.
//!
//! Implements [`Transport`] with exact topic matching and one unbounded
//! channel per subscription.  Used by the bridge binary when every unit
//! runs on the same board, and by the test suite.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{Receiver, Sender};

use log::trace;

use crate::app::ports::{Transport, TransportError};

#[derive(Debug, Clone, Default)]
pub struct LocalBroker {
    topics: Arc<Mutex<HashMap<String, Vec<Sender<String>>>>>,
}

impl LocalBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live subscriptions on `topic`.
    pub fn subscribers(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map_or(0, Vec::len)
    }
}

/// Topics are matched exactly, so wildcard characters are refused.
pub(crate) fn validate_topic(topic: &str) -> Result<(), TransportError> {
    if topic.is_empty() || topic.contains(['#', '+']) {
        return Err(TransportError::InvalidTopic);
    }
    Ok(())
}

impl Transport for LocalBroker {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), TransportError> {
        validate_topic(topic)?;
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(subs) = topics.get_mut(topic) {
            // Drop subscriptions whose receiver is gone.
            subs.retain(|tx| tx.send(payload.to_owned()).is_ok());
            trace!("broker: {} -> {} subscriber(s)", topic, subs.len());
        }
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> Result<Receiver<String>, TransportError> {
        validate_topic(topic)?;
        let (tx, rx) = crossbeam_channel::unbounded();
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic.to_owned())
            .or_default()
            .push(tx);
        Ok(rx)
    }
}
