//! SurrealDB connection management.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gatehouse_core::RequestContext;
use serde::Deserialize;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::info;

use crate::error::DbError;
use crate::observer::{CommandEvent, CommandObserver, TracingObserver};

/// Bounds on concurrent store access.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of commands in flight at once.
    pub max_size: u32,
    /// Minimum idle connections. The WebSocket client multiplexes a
    /// single connection, so this is only reported at start-up.
    pub min_idle: u32,
    pub connect_timeout_secs: u64,
    /// Idle connection lifetime. Reported only, like `min_idle`.
    pub idle_timeout_secs: u64,
    /// Default deadline for one operation when the request carries none.
    pub operation_timeout_secs: u64,
}

impl PoolConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            min_idle: 10,
            connect_timeout_secs: 10,
            idle_timeout_secs: 30 * 60,
            operation_timeout_secs: 30,
        }
    }
}

/// Configuration for connecting to SurrealDB.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// WebSocket URL (e.g., `127.0.0.1:8000`).
    pub url: String,
    /// SurrealDB namespace.
    pub namespace: String,
    /// SurrealDB database name.
    pub database: String,
    /// Root username for authentication.
    pub username: String,
    /// Root password for authentication.
    pub password: String,
    /// Optional server-side pepper for password hashing.
    pub pepper: Option<String>,
    pub pool: PoolConfig,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "gatehouse".into(),
            database: "django_auth".into(),
            username: "root".into(),
            password: "root".into(),
            pepper: None,
            pool: PoolConfig::default(),
        }
    }
}

/// A query with its bound parameters.
#[derive(Debug, Clone)]
pub struct Statement {
    pub(crate) sql: String,
    pub(crate) params: Vec<(String, serde_json::Value)>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub(crate) fn extend(
        mut self,
        params: impl IntoIterator<Item = (String, serde_json::Value)>,
    ) -> Self {
        self.params.extend(params);
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// A pooled slot for talking to the store. Released on drop.
pub(crate) struct Session {
    _permit: OwnedSemaphorePermit,
    deadline: tokio::time::Instant,
}

impl Session {
    pub(crate) fn deadline(&self) -> tokio::time::Instant {
        self.deadline
    }
}

/// Manages a connection to SurrealDB.
///
/// Cheap to clone; every clone shares the client, the session limit and
/// the observer.
pub struct DbManager<C: Connection = Client> {
    db: Surreal<C>,
    sessions: Arc<Semaphore>,
    observer: Arc<dyn CommandObserver>,
    operation_timeout: Duration,
}

impl<C: Connection> Clone for DbManager<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            sessions: Arc::clone(&self.sessions),
            observer: Arc::clone(&self.observer),
            operation_timeout: self.operation_timeout,
        }
    }
}

impl DbManager<Client> {
    /// Connect to SurrealDB using the provided configuration.
    ///
    /// Authenticates as root, selects the configured namespace and
    /// database, and returns a ready-to-use manager. Gives up after
    /// `pool.connect_timeout_secs`.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );

        let connect = async {
            let db = Surreal::new::<Ws>(&config.url).await?;

            db.signin(Root {
                username: config.username.clone(),
                password: config.password.clone(),
            })
            .await?;

            db.use_ns(&config.namespace)
                .use_db(&config.database)
                .await?;

            Ok::<_, surrealdb::Error>(db)
        };

        let db = tokio::time::timeout(config.pool.connect_timeout(), connect)
            .await
            .map_err(|_| DbError::Timeout {
                operation: "connect".into(),
            })??;

        info!(
            max_size = config.pool.max_size,
            min_idle = config.pool.min_idle,
            idle_timeout_secs = config.pool.idle_timeout_secs,
            "Successfully connected to SurrealDB"
        );

        Ok(Self::new(db, &config.pool))
    }
}

impl<C: Connection> DbManager<C> {
    /// Wrap an already connected client.
    pub fn new(db: Surreal<C>, pool: &PoolConfig) -> Self {
        Self {
            db,
            sessions: Arc::new(Semaphore::new(pool.max_size.max(1) as usize)),
            observer: Arc::new(TracingObserver),
            operation_timeout: pool.operation_timeout(),
        }
    }

    /// Replace the default [`TracingObserver`].
    pub fn with_observer(mut self, observer: Arc<dyn CommandObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Returns a reference to the underlying SurrealDB client.
    pub fn client(&self) -> &Surreal<C> {
        &self.db
    }

    pub(crate) fn observer(&self) -> &dyn CommandObserver {
        self.observer.as_ref()
    }

    /// Wait for a free session, no longer than the request deadline.
    pub(crate) async fn open_session(
        &self,
        ctx: &RequestContext,
        operation: &str,
    ) -> Result<Session, DbError> {
        let deadline =
            tokio::time::Instant::from_std(ctx.effective_deadline(self.operation_timeout));

        let permit = tokio::time::timeout_at(deadline, self.sessions.clone().acquire_owned())
            .await
            .map_err(|_| DbError::Timeout {
                operation: operation.to_string(),
            })?
            .map_err(|_| DbError::PoolClosed)?;

        Ok(Session {
            _permit: permit,
            deadline,
        })
    }

    /// Run a single read statement outside any transaction and decode
    /// its rows.
    pub async fn fetch<R: SurrealValue>(
        &self,
        ctx: &RequestContext,
        operation: &str,
        statement: Statement,
    ) -> Result<Vec<R>, DbError> {
        let session = self.open_session(ctx, operation).await?;

        let event = CommandEvent {
            operation,
            statements: 1,
            transactional: false,
            request_id: ctx.request_id.as_deref(),
        };
        self.observer.started(&event);
        let started = Instant::now();

        let Statement { sql, params } = statement;
        let outcome = tokio::time::timeout_at(session.deadline(), async {
            let mut query = self.db.query(sql);
            for (name, value) in params {
                query = query.bind((name, value));
            }
            let mut response = query.await?.check()?;
            let rows: Vec<R> = response.take(0)?;
            Ok::<_, surrealdb::Error>(rows)
        })
        .await;

        match outcome {
            Ok(Ok(rows)) => {
                self.observer.succeeded(&event, started.elapsed());
                Ok(rows)
            }
            Ok(Err(e)) => {
                self.observer.failed(&event, started.elapsed(), &e.to_string());
                Err(e.into())
            }
            Err(_) => {
                self.observer
                    .failed(&event, started.elapsed(), "deadline exceeded");
                Err(DbError::Timeout {
                    operation: operation.to_string(),
                })
            }
        }
    }
}
