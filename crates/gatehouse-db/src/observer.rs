//! Command observation hook.
//!
//! Every round trip to the store is reported to a [`CommandObserver`]
//! so that logging or tracing can be attached without touching the
//! repositories.

use std::time::Duration;

use tracing::{debug, warn};

/// Describes one round trip to the store.
#[derive(Debug, Clone, Copy)]
pub struct CommandEvent<'a> {
    /// Logical operation name, e.g. `user.create`.
    pub operation: &'a str,
    /// Number of statements sent in this round trip.
    pub statements: usize,
    /// Whether the statements run inside a transaction.
    pub transactional: bool,
    pub request_id: Option<&'a str>,
}

pub trait CommandObserver: Send + Sync {
    fn started(&self, _event: &CommandEvent<'_>) {}

    fn succeeded(&self, _event: &CommandEvent<'_>, _elapsed: Duration) {}

    fn failed(&self, _event: &CommandEvent<'_>, _elapsed: Duration, _error: &str) {}
}

/// Default observer: logs each command through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CommandObserver for TracingObserver {
    fn started(&self, event: &CommandEvent<'_>) {
        debug!(
            operation = event.operation,
            statements = event.statements,
            transactional = event.transactional,
            request_id = event.request_id,
            "Command started"
        );
    }

    fn succeeded(&self, event: &CommandEvent<'_>, elapsed: Duration) {
        debug!(
            operation = event.operation,
            request_id = event.request_id,
            elapsed_ms = elapsed.as_millis() as u64,
            "Command succeeded"
        );
    }

    fn failed(&self, event: &CommandEvent<'_>, elapsed: Duration, error: &str) {
        warn!(
            operation = event.operation,
            request_id = event.request_id,
            elapsed_ms = elapsed.as_millis() as u64,
            error,
            "Command failed"
        );
    }
}
