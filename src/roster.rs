/// Lane-constrained formation state machine.
pub mod formation;
/// Slot assignment model.
pub mod model;
