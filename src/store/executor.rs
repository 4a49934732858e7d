//! Self-reconnecting store executor.
//!
//! Owns a single lazily-created connection, replaced wholesale whenever a
//! transient failure is observed. Retries are unbounded: availability wins
//! over fast failure, and callers needing bounded latency wrap the returned
//! future in their own timeout (dropping it cancels at any await point).
//! Malformed input and integrity violations are never retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::ConnectOptions;
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::error::StoreError;

const MAX_BACKOFF_SECS: u64 = 30;
const RECONNECT_PAUSE: Duration = Duration::from_secs(1);

/// Classification of a failed store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Parameters rejected as invalid (type/format violation).
    MalformedInput,
    /// Constraint violation unrelated to connectivity.
    IntegrityViolation,
    /// Anything else: network error, server restart, timeout.
    Transient,
}

pub trait ClassifyFailure {
    fn failure_kind(&self) -> FailureKind;
}

impl ClassifyFailure for sqlx::Error {
    fn failure_kind(&self) -> FailureKind {
        if let Some(db) = self.as_database_error() {
            if let Some(code) = db.code() {
                // SQLSTATE class 22 = data exception, class 23 = integrity
                // constraint violation.
                if code.starts_with("22") {
                    return FailureKind::MalformedInput;
                }
                if code.starts_with("23") {
                    return FailureKind::IntegrityViolation;
                }
            }
        }
        FailureKind::Transient
    }
}

/// Connection factory plus the transaction pass-throughs the executor needs.
#[async_trait]
pub trait Backend: Send + Sync {
    type Conn: Send;
    type Err: ClassifyFailure + std::error::Error + Send + Sync + 'static;

    async fn connect(&self) -> Result<Self::Conn, Self::Err>;
    async fn commit(&self, conn: &mut Self::Conn) -> Result<(), Self::Err>;
    async fn rollback(&self, conn: &mut Self::Conn) -> Result<(), Self::Err>;
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for Arc<B> {
    type Conn = B::Conn;
    type Err = B::Err;

    async fn connect(&self) -> Result<Self::Conn, Self::Err> {
        (**self).connect().await
    }

    async fn commit(&self, conn: &mut Self::Conn) -> Result<(), Self::Err> {
        (**self).commit(conn).await
    }

    async fn rollback(&self, conn: &mut Self::Conn) -> Result<(), Self::Err> {
        (**self).rollback(conn).await
    }
}

/// Injected clock so retry delays are observable in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[async_trait]
impl<S: Sleeper + ?Sized> Sleeper for Arc<S> {
    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await
    }
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let secs = 2u64
        .checked_pow(attempt)
        .map_or(MAX_BACKOFF_SECS, |s| s.min(MAX_BACKOFF_SECS));
    Duration::from_secs(secs)
}

impl StoreError {
    fn from_backend<E>(err: E) -> Self
    where
        E: ClassifyFailure + std::error::Error + Send + Sync + 'static,
    {
        match err.failure_kind() {
            FailureKind::MalformedInput => StoreError::MalformedInput(Box::new(err)),
            FailureKind::IntegrityViolation => StoreError::IntegrityViolation(Box::new(err)),
            FailureKind::Transient => StoreError::Connection(Box::new(err)),
        }
    }
}

/// Executes store operations with automatic reconnect-and-retry.
///
/// The connection is process-shared state; the mutex serializes both queries
/// and retry sequences, so at most one retry cycle mutates the connection at
/// a time.
pub struct ResilientExecutor<B: Backend, S = TokioSleeper> {
    backend: B,
    sleeper: S,
    conn: Mutex<Option<B::Conn>>,
}

impl<B: Backend> ResilientExecutor<B> {
    pub fn new(backend: B) -> Self {
        Self::with_sleeper(backend, TokioSleeper)
    }
}

impl<B: Backend, S: Sleeper> ResilientExecutor<B, S> {
    pub fn with_sleeper(backend: B, sleeper: S) -> Self {
        Self {
            backend,
            sleeper,
            conn: Mutex::new(None),
        }
    }

    /// Runs `op` against the live connection, re-issuing it on a fresh
    /// connection after every transient failure. Returns only on success or
    /// on a non-retryable failure.
    pub async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send,
        F: for<'c> Fn(&'c mut B::Conn) -> BoxFuture<'c, Result<T, B::Err>> + Send + Sync,
    {
        let mut conn = self.conn.lock().await;
        let mut attempt: u32 = 0;
        loop {
            let live = match conn.as_mut() {
                Some(live) => live,
                None => match self.backend.connect().await {
                    Ok(fresh) => conn.insert(fresh),
                    Err(cause) => {
                        warn!(error = %cause, "store connection failed, pausing before next try");
                        self.sleeper.sleep(RECONNECT_PAUSE).await;
                        continue;
                    }
                },
            };

            match op(&mut *live).await {
                Ok(value) => return Ok(value),
                Err(cause) => match cause.failure_kind() {
                    FailureKind::MalformedInput => {
                        error!(attempt, error = %cause, "store rejected parameters, rolling back");
                        if let Err(rollback_err) = self.backend.rollback(live).await {
                            warn!(error = %rollback_err, "rollback after malformed input failed");
                        }
                        return Err(StoreError::MalformedInput(Box::new(cause)));
                    }
                    FailureKind::IntegrityViolation => {
                        // Connection state is left untouched.
                        return Err(StoreError::IntegrityViolation(Box::new(cause)));
                    }
                    FailureKind::Transient => {
                        attempt += 1;
                        let delay = backoff_delay(attempt);
                        warn!(
                            attempt,
                            delay_secs = delay.as_secs(),
                            error = %cause,
                            "transient store failure, reconnecting after backoff"
                        );
                        self.sleeper.sleep(delay).await;
                        *conn = None;
                    }
                },
            }
        }
    }

    /// Commits the current transaction. No retry: a commit that failed may or
    /// may not have applied, and only the caller can decide what that means.
    pub async fn commit(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        match conn.as_mut() {
            Some(live) => self
                .backend
                .commit(live)
                .await
                .map_err(StoreError::from_backend),
            None => Ok(()),
        }
    }

    /// Rolls back the current transaction. No retry.
    pub async fn rollback(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        match conn.as_mut() {
            Some(live) => self
                .backend
                .rollback(live)
                .await
                .map_err(StoreError::from_backend),
            None => Ok(()),
        }
    }
}

/// Postgres backend: one plain connection per executor, no pool, matching the
/// one-in-flight-query-per-connection model.
pub struct PgBackend {
    options: PgConnectOptions,
}

impl PgBackend {
    pub fn from_url(database_url: &str) -> Result<Self, sqlx::Error> {
        Ok(Self {
            options: database_url.parse::<PgConnectOptions>()?,
        })
    }
}

#[async_trait]
impl Backend for PgBackend {
    type Conn = PgConnection;
    type Err = sqlx::Error;

    async fn connect(&self) -> Result<PgConnection, sqlx::Error> {
        self.options.connect().await
    }

    async fn commit(&self, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
        sqlx::query("COMMIT").execute(&mut *conn).await.map(|_| ())
    }

    async fn rollback(&self, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
        sqlx::query("ROLLBACK").execute(&mut *conn).await.map(|_| ())
    }
}
