//! Per-request context carried through every repository call.

use std::time::{Duration, Instant};

/// Request-scoped context.
///
/// The request id is only passed through to logs. The deadline bounds
/// how long an operation may wait for a session and for the store.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: Option<String>,
    pub deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Set the deadline to `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// The earlier of this context's deadline and `fallback` from now.
    pub fn effective_deadline(&self, fallback: Duration) -> Instant {
        let fallback = Instant::now() + fallback;
        match self.deadline {
            Some(deadline) => deadline.min(fallback),
            None => fallback,
        }
    }
}
