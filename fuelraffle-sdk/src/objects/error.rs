//! User-visible error codes.
//!
//! Front-ends switch on [`ErrorCode`] to render guidance without knowing the
//! pipeline's internals.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The QR code is forged, damaged or not ours.
    InvalidCode,
    /// The QR code or the claim window has expired.
    ExpiredCode,
    /// The coupon or QR code has already been used.
    AlreadyUsed,
    /// The raffle, ticket or winner is not (yet) in a state that allows this.
    NotYetEligible,
    /// The requested transition is not allowed from the current state.
    StateConflict,
    NotFound,
    BadRequest,
    Unauthorized,
    Internal,
}

/// Error body returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}
