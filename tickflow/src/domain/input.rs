//! Input source definitions.

use serde_json::Value;

/// Default prefetch window for queue-backed inputs.
pub const DEFAULT_PREFETCH_COUNT: u16 = 10;

/// An in-memory list source.
#[derive(Debug, Clone)]
pub struct ListInputDefinition {
    pub id: String,
    pub items: Vec<Value>,
}

/// A RabbitMQ-backed source.
#[derive(Debug, Clone)]
pub struct RabbitMqInputDefinition {
    pub id: String,
    /// AMQP connection URL.
    pub url: String,
    /// Queue to consume from; declared durable on first connect.
    pub queue: String,
    /// Channel QoS prefetch window.
    pub prefetch_count: u16,
}

/// The closed set of input source kinds.
#[derive(Debug, Clone)]
pub enum InputDefinition {
    List(ListInputDefinition),
    RabbitMq(RabbitMqInputDefinition),
}

impl InputDefinition {
    pub fn list(id: impl Into<String>, items: Vec<Value>) -> Self {
        Self::List(ListInputDefinition {
            id: id.into(),
            items,
        })
    }

    pub fn rabbitmq(
        id: impl Into<String>,
        url: impl Into<String>,
        queue: impl Into<String>,
        prefetch_count: u16,
    ) -> Self {
        Self::RabbitMq(RabbitMqInputDefinition {
            id: id.into(),
            url: url.into(),
            queue: queue.into(),
            prefetch_count,
        })
    }

    pub fn id(&self) -> &str {
        match self {
            Self::List(def) => &def.id,
            Self::RabbitMq(def) => &def.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::List(_) => "list",
            Self::RabbitMq(_) => "rabbitmq",
        }
    }
}
