/// Width-keyed layout memoization.
pub mod cache;
/// Template geometry computation.
pub mod engine;
