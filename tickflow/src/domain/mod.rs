//! Immutable definitions loaded at startup.

pub mod input;
pub mod job;

pub use input::{InputDefinition, ListInputDefinition, RabbitMqInputDefinition};
pub use job::{JobDefinition, Schedule, Trigger};
