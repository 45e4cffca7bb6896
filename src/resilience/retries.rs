//! Retry classification for failed RPC calls.
//!
//! # Responsibilities
//! - Map a gRPC status code to a [`RetryDecision`]
//! - Single out `Unavailable` as the only code that warrants a fresh dial
//!
//! # Design Decisions
//! - Pure function of the code; no budget, no clock, no shared state
//! - Unknown or unlisted codes are never retried

use tonic::{Code, Status};

/// What the caller of a failed RPC may do about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryDecision {
    /// The failure is final.
    NoRetry,
    /// Transient server-side condition; the existing connection is still valid.
    RetryOnly,
    /// The endpoint behind the target is gone; redial before retrying.
    RetryWithReconnect,
}

impl RetryDecision {
    /// True for both retryable variants.
    pub fn is_retryable(self) -> bool {
        !matches!(self, RetryDecision::NoRetry)
    }

    /// True only when a new connection is required.
    pub fn needs_reconnect(self) -> bool {
        matches!(self, RetryDecision::RetryWithReconnect)
    }

    /// Short label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            RetryDecision::NoRetry => "no_retry",
            RetryDecision::RetryOnly => "retry_only",
            RetryDecision::RetryWithReconnect => "retry_with_reconnect",
        }
    }
}

impl std::fmt::Display for RetryDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a status code.
///
/// `Unavailable` usually means the instance behind a load-balanced virtual
/// address changed or disappeared, so only a new dial can help.
pub fn classify(code: Code) -> RetryDecision {
    match code {
        Code::Unavailable => RetryDecision::RetryWithReconnect,
        Code::DeadlineExceeded
        | Code::ResourceExhausted
        | Code::FailedPrecondition
        | Code::Aborted
        | Code::DataLoss => RetryDecision::RetryOnly,
        _ => RetryDecision::NoRetry,
    }
}

/// Classify the code carried by a [`Status`].
pub fn classify_status(status: &Status) -> RetryDecision {
    classify(status.code())
}

/// Classify a raw wire code. Values outside the gRPC range map to `Unknown`.
pub fn classify_raw(code: i32) -> RetryDecision {
    classify(Code::from_i32(code))
}
