//! Error kinds surfaced by the routing pipeline.
//!
//! Per the error-handling design: only [`RoutingError::Internal`] is meant to
//! escalate to a caller's 500 boundary. Every other condition (missing
//! machine, unreachable endpoint, length ceiling unmet, disconnected
//! terminal set) is recovered locally and reported through
//! [`crate::model::RoutingResponse`] instead of by returning `Err`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RoutingError>;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("grid dimensions must be positive (got {width}x{height})")]
    InvalidGrid { width: i64, height: i64 },

    #[error("gridResolution must be a positive real (got {0})")]
    InvalidResolution(f64),

    #[error("could not parse cable length {raw:?}")]
    InvalidLength { raw: String },

    #[error("internal invariant broken: {0}")]
    Internal(String),
}
