//! Connection handle lifecycle.
//!
//! # Responsibilities
//! - Own exactly one live transport connection
//! - Remember the target needed to redial it
//! - Generate unique connection IDs for tracing
//!
//! # Lifecycle
//! ```text
//! open → (serving calls) → redial: close old, dial same target → new handle
//!                        → close
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::net::dialer::{DialTarget, Dialer};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One live connection plus the dial parameters it came from.
///
/// The connection is released when the handle is dropped.
#[derive(Debug)]
pub struct ConnectionHandle<C> {
    id: ConnectionId,
    connection: C,
    target: Arc<DialTarget>,
    established_at: Instant,
}

impl<C> ConnectionHandle<C> {
    /// Dial `target` and wrap the result.
    pub async fn open<D>(dialer: &D, target: Arc<DialTarget>) -> Result<Self, D::Error>
    where
        D: Dialer<Connection = C>,
    {
        let connection = dialer.dial(&target).await?;
        let id = ConnectionId::new();
        tracing::debug!(connection_id = %id, target = %target, "Connection established");
        Ok(Self {
            id,
            connection,
            target,
            established_at: Instant::now(),
        })
    }

    /// Close this connection, then dial the same target again.
    ///
    /// The old connection is gone even when the new dial fails.
    pub async fn redial<D>(self, dialer: &D) -> Result<Self, D::Error>
    where
        D: Dialer<Connection = C>,
    {
        let target = Arc::clone(&self.target);
        self.close();
        Self::open(dialer, target).await
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn target(&self) -> &DialTarget {
        &self.target
    }

    /// Time since the connection was established.
    pub fn age(&self) -> Duration {
        self.established_at.elapsed()
    }

    /// Release the connection.
    pub fn close(self) {
        drop(self);
    }
}

impl<C> Drop for ConnectionHandle<C> {
    fn drop(&mut self) {
        tracing::trace!(connection_id = %self.id, target = %self.target, "Connection closed");
    }
}
