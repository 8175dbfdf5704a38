// ============================================================================
// Order Errors
// ============================================================================

/// An order identifier that is not a well-formed UUID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidOrderId {
    #[error("order id is empty")]
    Empty,

    #[error("order id {value:?} is not a valid UUID: {reason}")]
    Malformed { value: String, reason: String },
}

/// Structural problems with a decoded order that make it unfit for storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("order id is the nil UUID")]
    NilOrderId,

    #[error("required field is empty: {0}")]
    EmptyField(&'static str),

    #[error("negative amount in {field}: {value}")]
    NegativeAmount { field: String, value: i64 },
}
