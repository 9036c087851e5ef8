mod consumer;
mod producer;

pub use consumer::{ConsumerError, ConsumerSettings, OrderConsumer};
pub use producer::OrderPublisher;
