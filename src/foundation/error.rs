/// Convenience result type used across the crate.
pub type RosterResult<T> = Result<T, RosterError>;

/// Top-level error taxonomy.
///
/// Only caller misuse surfaces here. Image load failures degrade to placeholder rendering and
/// formation policy violations are reported as [`crate::Transition::Rejected`] values instead.
#[derive(thiserror::Error, Debug)]
pub enum RosterError {
    /// Invalid argument shape or range (slot index, formation position, mismatched equipment).
    #[error("validation error: {0}")]
    Validation(String),

    /// Layout precondition violation (non-positive or too-narrow canvas width).
    #[error("layout error: {0}")]
    Layout(String),

    /// Raster surface or paint construction failure.
    #[error("render error: {0}")]
    Render(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RosterError {
    /// Build a [`RosterError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`RosterError::Layout`] value.
    pub fn layout(msg: impl Into<String>) -> Self {
        Self::Layout(msg.into())
    }

    /// Build a [`RosterError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`RosterError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for RosterError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
