// ============================================================================
// Order Domain
// ============================================================================
//
// - Value objects (OrderId, Delivery, Payment, Item)
// - Errors (InvalidOrderId, ValidationError)
// - Aggregate (Order with structural validation)
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod aggregate;

pub use value_objects::*;
pub use errors::*;
pub use aggregate::*;
