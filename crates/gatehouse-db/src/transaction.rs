//! Transaction coordinator.
//!
//! A unit of work stages statements on a [`Transaction`]; the coordinator
//! sends them to SurrealDB as one `BEGIN TRANSACTION … COMMIT TRANSACTION`
//! batch so that either every statement applies or none does.
//!
//! Outcomes:
//! - the unit of work returns an error: nothing is sent, the transaction
//!   is aborted and that error is returned unchanged;
//! - a statement is rejected by the store: SurrealDB cancels the batch and
//!   the caller gets [`DbError::Write`];
//! - the round trip itself fails: the commit may or may not have been
//!   applied, reported as [`DbError::Commit`];
//! - the deadline passes first: [`DbError::Timeout`].
//!
//! The pooled session is released on every path.

use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use gatehouse_core::RequestContext;
use surrealdb::Connection;
use surrealdb_types::SurrealValue;
use tracing::{debug, warn};

use crate::connection::DbManager;
use crate::error::DbError;
use crate::observer::CommandEvent;

/// Lifecycle of one coordinated operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    SessionStarted,
    TransactionStarted,
    Committed,
    Aborted,
}

/// What a coordinated operation acts on, for logs and error context.
#[derive(Debug, Clone, Copy)]
pub struct TxScope<'a> {
    pub operation: &'a str,
    pub entity: &'a str,
    pub id: Option<&'a str>,
}

impl<'a> TxScope<'a> {
    pub fn new(operation: &'a str, entity: &'a str) -> Self {
        Self {
            operation,
            entity,
            id: None,
        }
    }

    pub fn with_id(mut self, id: &'a str) -> Self {
        self.id = Some(id);
        self
    }
}

/// Transactional handle given to a unit of work.
#[derive(Debug, Default)]
pub struct Transaction {
    statements: Vec<String>,
    params: Vec<(String, serde_json::Value)>,
}

impl Transaction {
    /// Bind `value` and return its placeholder (`$p0`, `$p1`, …).
    pub fn param(&mut self, value: impl Into<serde_json::Value>) -> String {
        let name = format!("p{}", self.params.len());
        let placeholder = format!("${name}");
        self.params.push((name, value.into()));
        placeholder
    }

    /// Bind `value` and return the assignment `field = $pN`.
    pub fn assign(&mut self, field: &str, value: impl Into<serde_json::Value>) -> String {
        let placeholder = self.param(value);
        format!("{field} = {placeholder}")
    }

    /// Assignment for a datetime field; `None` stores `NONE`.
    pub fn assign_datetime(&mut self, field: &str, value: Option<DateTime<Utc>>) -> String {
        match value {
            Some(at) => {
                let placeholder = self.param(format_datetime(at));
                format!("{field} = <datetime> {placeholder}")
            }
            None => format!("{field} = NONE"),
        }
    }

    /// Stage a statement and return its index among the staged statements.
    pub fn push(&mut self, statement: impl Into<String>) -> usize {
        self.statements.push(statement.into());
        self.statements.len() - 1
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Result slot of staged statement `index`; `BEGIN TRANSACTION` takes
    /// slot 0 of the batch.
    fn result_slot(index: usize) -> usize {
        index + 1
    }

    fn into_batch(self) -> (String, Vec<(String, serde_json::Value)>) {
        let mut sql = String::from("BEGIN TRANSACTION;\n");
        for statement in &self.statements {
            sql.push_str(statement);
            sql.push_str(";\n");
        }
        sql.push_str("COMMIT TRANSACTION;");
        (sql, self.params)
    }
}

/// RFC 3339 with nanoseconds, as accepted by `<datetime>` casts.
pub(crate) fn format_datetime(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn transition(
    scope: &TxScope<'_>,
    from: TransactionState,
    to: TransactionState,
) -> TransactionState {
    debug!(operation = scope.operation, ?from, ?to, "Transaction state");
    to
}

/// Runs units of work atomically.
pub struct TransactionCoordinator<C: Connection> {
    manager: DbManager<C>,
}

impl<C: Connection> Clone for TransactionCoordinator<C> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
        }
    }
}

impl<C: Connection> TransactionCoordinator<C> {
    pub fn new(manager: DbManager<C>) -> Self {
        Self { manager }
    }

    /// Stage statements with `work`, then commit them as one batch.
    ///
    /// `work` returns the index (from [`Transaction::push`]) of the
    /// statement whose rows are returned to the caller.
    pub async fn run<R, F>(
        &self,
        ctx: &RequestContext,
        scope: TxScope<'_>,
        work: F,
    ) -> Result<Vec<R>, DbError>
    where
        R: SurrealValue,
        F: FnOnce(&mut Transaction) -> Result<usize, DbError>,
    {
        let mut state = TransactionState::Idle;

        let session = self.manager.open_session(ctx, scope.operation).await?;
        state = transition(&scope, state, TransactionState::SessionStarted);

        let mut tx = Transaction::default();
        state = transition(&scope, state, TransactionState::TransactionStarted);

        let output = match work(&mut tx) {
            Ok(output) => output,
            Err(err) => {
                transition(&scope, state, TransactionState::Aborted);
                warn!(
                    operation = scope.operation,
                    entity = scope.entity,
                    id = scope.id,
                    error = %err,
                    "Transaction aborted before commit"
                );
                return Err(err);
            }
        };

        let event = CommandEvent {
            operation: scope.operation,
            statements: tx.len(),
            transactional: true,
            request_id: ctx.request_id.as_deref(),
        };
        let observer = self.manager.observer();
        observer.started(&event);
        let started = Instant::now();

        let (sql, params) = tx.into_batch();
        let db = self.manager.client();
        let outcome = tokio::time::timeout_at(session.deadline(), async {
            let mut query = db.query(sql);
            for (name, value) in params {
                query = query.bind((name, value));
            }
            query.await
        })
        .await;

        let response = match outcome {
            Err(_) => {
                transition(&scope, state, TransactionState::Aborted);
                observer.failed(&event, started.elapsed(), "deadline exceeded");
                warn!(operation = scope.operation, "Transaction timed out");
                return Err(DbError::Timeout {
                    operation: scope.operation.to_string(),
                });
            }
            Ok(Err(e)) => {
                observer.failed(&event, started.elapsed(), &e.to_string());
                warn!(
                    operation = scope.operation,
                    entity = scope.entity,
                    error = %e,
                    "Transaction commit failed, outcome unknown"
                );
                return Err(DbError::Commit {
                    entity: scope.entity.to_string(),
                    reason: e.to_string(),
                });
            }
            Ok(Ok(response)) => response,
        };

        let mut response = match response.check() {
            Ok(response) => response,
            Err(e) => {
                transition(&scope, state, TransactionState::Aborted);
                observer.failed(&event, started.elapsed(), &e.to_string());
                return Err(DbError::Write {
                    entity: scope.entity.to_string(),
                    id: scope.id.map(str::to_string),
                    reason: e.to_string(),
                });
            }
        };

        transition(&scope, state, TransactionState::Committed);
        observer.succeeded(&event, started.elapsed());

        let rows: Vec<R> = response.take(Transaction::result_slot(output))?;
        Ok(rows)
    }
}
