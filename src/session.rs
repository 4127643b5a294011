/// Scene fingerprints for frame reuse.
pub mod fingerprint;
/// The session orchestrator.
pub mod studio;
