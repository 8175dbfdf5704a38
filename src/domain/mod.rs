// ============================================================================
// Domain Layer
// ============================================================================
//
// The order aggregate as it arrives on the stream and as it is served back:
// header, delivery, payment and the ordered item list travel as one unit.
//
// ============================================================================

pub mod order;
