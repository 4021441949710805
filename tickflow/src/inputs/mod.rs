//! Input sources: a uniform poll/ack surface over heterogeneous origins.
//!
//! Adapters form a small closed set of variants rather than an open plugin
//! interface. Every adapter supports `poll_batch`, `poll_all` and `has_data`;
//! `ack`/`nack` are present everywhere but only carry meaning for
//! queue-backed sources. Transport failure is never fatal at this layer: it
//! degrades to "no data right now" and is logged.

pub mod list;
pub mod manager;
pub mod rabbitmq;

use bytes::Bytes;
use serde_json::Value;

pub use list::ListInput;
pub use manager::InputManager;
pub use rabbitmq::RabbitMqInput;

use crate::domain::InputDefinition;

/// The payload carried by a single polled item.
#[derive(Debug, Clone)]
pub enum ItemPayload {
    /// Structured item from an in-memory list source.
    Json(Value),
    /// Raw message body from a queue-backed source.
    Bytes(Bytes),
}

/// A single unit of work pulled from an input source.
#[derive(Debug, Clone)]
pub struct InputItem {
    pub payload: ItemPayload,
    /// Broker delivery tag; present only for queue-backed sources.
    pub(crate) delivery_tag: Option<u64>,
    /// Whether the broker flagged this delivery as a redelivery.
    pub redelivered: bool,
}

impl InputItem {
    pub fn json(value: Value) -> Self {
        Self {
            payload: ItemPayload::Json(value),
            delivery_tag: None,
            redelivered: false,
        }
    }

    pub fn delivery(body: Bytes, delivery_tag: u64, redelivered: bool) -> Self {
        Self {
            payload: ItemPayload::Bytes(body),
            delivery_tag: Some(delivery_tag),
            redelivered,
        }
    }

    /// Delivery tag for queue-backed items.
    pub fn delivery_tag(&self) -> Option<u64> {
        self.delivery_tag
    }
}

/// One concrete input source behind the uniform adapter surface.
pub enum InputAdapter {
    List(ListInput),
    RabbitMq(RabbitMqInput),
}

impl InputAdapter {
    pub fn from_definition(definition: &InputDefinition) -> Self {
        match definition {
            InputDefinition::List(def) => Self::List(ListInput::new(def)),
            InputDefinition::RabbitMq(def) => Self::RabbitMq(RabbitMqInput::new(def)),
        }
    }

    /// Return up to `n` immediately-available items without blocking.
    pub async fn poll_batch(&self, n: usize) -> Vec<InputItem> {
        match self {
            Self::List(input) => input.poll_batch(n),
            Self::RabbitMq(input) => input.poll_batch(n).await,
        }
    }

    /// Repeatedly poll fixed-size batches until the source is empty.
    pub async fn poll_all(&self) -> Vec<InputItem> {
        match self {
            Self::List(input) => input.poll_all(),
            Self::RabbitMq(input) => input.poll_all().await,
        }
    }

    /// Cheap readiness probe that does not consume.
    pub async fn has_data(&self) -> bool {
        match self {
            Self::List(input) => input.has_data(),
            Self::RabbitMq(input) => input.has_data().await,
        }
    }

    /// Acknowledge one item. No-op for sources without ack semantics.
    pub async fn ack(&self, item: &InputItem) {
        match self {
            Self::List(_) => {}
            Self::RabbitMq(input) => input.ack(item).await,
        }
    }

    /// Negative-acknowledge one item. No-op for sources without ack semantics.
    pub async fn nack(&self, item: &InputItem, requeue: bool) {
        match self {
            Self::List(_) => {}
            Self::RabbitMq(input) => input.nack(item, requeue).await,
        }
    }

    /// Append an item for programmatic feeding. Only list sources accept it.
    pub fn append(&self, item: Value) -> bool {
        match self {
            Self::List(input) => {
                input.append(item);
                true
            }
            Self::RabbitMq(_) => false,
        }
    }

    /// Whether ack/nack carry broker-side meaning for this adapter.
    pub fn has_ack_semantics(&self) -> bool {
        matches!(self, Self::RabbitMq(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::List(_) => "list",
            Self::RabbitMq(_) => "rabbitmq",
        }
    }
}
