// ============================================================================
// Messaging - Producing Orders onto the Stream
// ============================================================================
//
// - publisher  - rdkafka FutureProducer wrapper, one JSON order per record
// - synthetic  - generated orders for load and end-to-end testing
//
// ============================================================================

mod publisher;
mod synthetic;

pub use publisher::{OrderPublisher, PublishError};
pub use synthetic::synthetic_order;
