//! Error types surfaced by the routing layer.
//!
//! Adapter failures never appear here: a failed generation is reported
//! in-band through [`ProviderResponse::error`](crate::providers::ProviderResponse)
//! and degrades that candidate's score instead of aborting the route call.
//! The router itself raises only for malformed requests and for internal
//! runtime faults (a panicked dispatch thread, a runtime that failed to
//! build for the blocking wrapper).

use thiserror::Error;

/// Errors raised by [`Router`](crate::router::Router) entry points.
#[derive(Error, Debug)]
pub enum RouterError {
    /// The request is malformed (empty prompt, zero model limit).
    #[error("bad request: {message}")]
    BadRequest { message: String },

    /// Internal routing machinery failed outside any single adapter.
    #[error("router runtime error: {message}")]
    Runtime { message: String },
}

impl RouterError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }
}
