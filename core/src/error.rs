//! Error type for security level changes.

use thiserror::Error;

use crate::level::ThreatDimension;

/// Errors returned when changing a threat level.
///
/// Neither variant is fatal: the caller fixes its input (or inspects the
/// listener failures) and carries on.
#[derive(Debug, Error)]
pub enum SecurityLevelError {
    /// The text does not name any member of the dimension's domain.
    /// The stored level is unchanged.
    #[error("invalid value for {dimension} threat level: {value:?}")]
    InvalidValue {
        /// Dimension being changed.
        dimension: ThreatDimension,
        /// Rejected text.
        value: String,
    },

    /// The change was committed but some listeners reported an error.
    /// The change is kept and every listener was still invoked.
    #[error(
        "{dimension} threat level changed to {applied}, but {} listener(s) failed",
        .errors.len()
    )]
    ListenerFailures {
        /// Dimension that changed.
        dimension: ThreatDimension,
        /// Canonical name of the value now in effect.
        applied: &'static str,
        /// One error per failing listener, in registration order.
        errors: Vec<anyhow::Error>,
    },
}

impl SecurityLevelError {
    /// `true` when the requested change was not applied at all.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::InvalidValue { .. })
    }
}
