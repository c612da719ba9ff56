use std::time::Duration;

use replikr_http::HttpTransportErrorKind;

use crate::scenario::{Endpoint, OperationKind};

/// How one executed request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Response received with the expected status code.
    Ok { status: u16 },

    /// Response received, but the status code did not match the expectation.
    UnexpectedStatus { status: u16 },

    /// Connection refused, reset, per-request timeout, or similar.
    Transport { kind: HttpTransportErrorKind },

    /// Force-cancelled because the drain grace timeout elapsed.
    TimedOut,
}

impl Outcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    /// Status code for log lines; 0 when no response was received.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Ok { status } | Self::UnexpectedStatus { status } => *status,
            Self::Transport { .. } | Self::TimedOut => 0,
        }
    }
}

/// One executed request attempt. Immutable after creation; owned by the
/// aggregator once recorded.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub op: OperationKind,
    /// Logical request identity; sub-operations of one iteration share it.
    pub key: String,
    pub endpoint: Endpoint,
    /// Elapsed run time when the request was sent.
    pub started_at: Duration,
    pub latency: Duration,
    pub outcome: Outcome,
}

/// Live event stream for pluggable sinks, decoupled from the aggregate store.
#[derive(Debug, Clone, Copy)]
pub enum IterationEvent<'a> {
    Request(&'a RequestRecord),

    /// The membership schedule yielded an empty set; the iteration was skipped.
    NoTarget { at: Duration },
}
