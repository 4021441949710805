//! Input manager: owns every adapter and routes operations by input id.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use super::{InputAdapter, InputItem};
use crate::domain::InputDefinition;
use crate::{Error, Result};

/// Owns the id → adapter mapping. Operations on unknown ids degrade to
/// empty / false / no-op rather than erroring; definition problems are
/// caught at construction.
pub struct InputManager {
    adapters: HashMap<String, InputAdapter>,
}

impl InputManager {
    pub fn new(definitions: &[InputDefinition]) -> Result<Self> {
        let mut adapters = HashMap::new();

        for definition in definitions {
            let id = definition.id();
            if id.is_empty() {
                return Err(Error::config("input id must not be empty"));
            }
            if adapters
                .insert(id.to_string(), InputAdapter::from_definition(definition))
                .is_some()
            {
                return Err(Error::config(format!("duplicate input id: {id}")));
            }
        }

        Ok(Self { adapters })
    }

    /// Poll every adapter once; only ids that produced at least one item
    /// appear in the result.
    pub async fn poll(&self, batch_size: usize) -> HashMap<String, Vec<InputItem>> {
        let mut results = HashMap::new();
        for (id, adapter) in &self.adapters {
            let items = adapter.poll_batch(batch_size).await;
            if !items.is_empty() {
                results.insert(id.clone(), items);
            }
        }
        results
    }

    /// Drain every adapter; only ids that produced items appear.
    pub async fn poll_all(&self) -> HashMap<String, Vec<InputItem>> {
        let mut results = HashMap::new();
        for (id, adapter) in &self.adapters {
            let items = adapter.poll_all().await;
            if !items.is_empty() {
                results.insert(id.clone(), items);
            }
        }
        results
    }

    /// Poll a single input. Empty for unknown ids.
    pub async fn poll_batch(&self, input_id: &str, batch_size: usize) -> Vec<InputItem> {
        match self.adapters.get(input_id) {
            Some(adapter) => adapter.poll_batch(batch_size).await,
            None => Vec::new(),
        }
    }

    pub async fn has_data(&self, input_id: &str) -> bool {
        match self.adapters.get(input_id) {
            Some(adapter) => adapter.has_data().await,
            None => false,
        }
    }

    /// Acknowledge a batch after successful processing. Effective only for
    /// adapters with ack semantics.
    pub async fn ack_batch(&self, input_id: &str, items: &[InputItem]) {
        let Some(adapter) = self.adapters.get(input_id) else {
            return;
        };
        if !adapter.has_ack_semantics() {
            return;
        }
        for item in items {
            adapter.ack(item).await;
        }
    }

    /// Negative-acknowledge a batch after failed processing.
    pub async fn nack_batch(&self, input_id: &str, items: &[InputItem], requeue: bool) {
        let Some(adapter) = self.adapters.get(input_id) else {
            return;
        };
        if !adapter.has_ack_semantics() {
            return;
        }
        for item in items {
            adapter.nack(item, requeue).await;
        }
    }

    /// Append one item for programmatic feeding. Returns false for unknown
    /// ids and for sources that do not accept appends.
    pub fn append_to_input(&self, input_id: &str, item: Value) -> bool {
        match self.adapters.get(input_id) {
            Some(adapter) => {
                let accepted = adapter.append(item);
                if !accepted {
                    debug!(input_id, kind = adapter.kind(), "Input does not accept appends");
                }
                accepted
            }
            None => false,
        }
    }

    /// Append several items; false if any append was not accepted.
    pub fn append_items_to_input(&self, input_id: &str, items: Vec<Value>) -> bool {
        items
            .into_iter()
            .all(|item| self.append_to_input(input_id, item))
    }

    pub fn contains(&self, input_id: &str) -> bool {
        self.adapters.contains_key(input_id)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
