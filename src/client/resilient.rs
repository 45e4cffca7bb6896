//! RPC client with reconnect-on-unavailable recovery.
//!
//! # Responsibilities
//! - Dial the target and build the typed stub from the live connection
//! - Run caller calls, classifying failures with the retry policy
//! - On `Unavailable`, redial once, rebuild the stub, re-issue the call once
//!
//! # Design Decisions
//! - At most one reconnect and at most two invocations of the call per
//!   `call_with_recovery`
//! - Only the reconnect path re-issues a call; other retryable codes are
//!   logged and handed back to the caller
//! - Reconnect closes the old connection before dialing, so there is never
//!   more than one live connection
//! - `call_with_recovery` takes `&mut self`: tasks sharing a client need
//!   their own mutex

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tonic::{Code, Status};

use crate::net::{ChannelDialer, ConnectionHandle, ConnectionId, DialTarget, Dialer};
use crate::observability::metrics::{self, CallOutcome};
use crate::resilience::{classify, RetryDecision};

/// Errors returned by [`ResilientClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Dialing (or redialing) the target failed.
    #[error("failed to dial {address}: {source}")]
    Dial {
        address: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The remote call failed.
    #[error("rpc call failed: {0}")]
    Call(#[from] Status),
}

impl ClientError {
    /// gRPC code of a call failure.
    pub fn code(&self) -> Option<Code> {
        match self {
            ClientError::Call(status) => Some(status.code()),
            ClientError::Dial { .. } => None,
        }
    }

    /// True for dial and redial failures.
    pub fn is_dial(&self) -> bool {
        matches!(self, ClientError::Dial { .. })
    }
}

type Initializer<C, S> = Box<dyn Fn(C) -> S + Send + Sync>;

/// Live connection and the stub built on top of it.
struct Live<C, S> {
    handle: ConnectionHandle<C>,
    stub: S,
}

/// A typed RPC stub that survives endpoint changes behind its target.
///
/// `S` is the generated client type (e.g. `FooClient<Channel>`), built from
/// each new connection by the initializer given at construction.
pub struct ResilientClient<S, D: Dialer = ChannelDialer> {
    dialer: D,
    target: Arc<DialTarget>,
    initializer: Initializer<D::Connection, S>,
    live: Option<Live<D::Connection, S>>,
    name: Cow<'static, str>,
}

impl<S> ResilientClient<S, ChannelDialer> {
    /// Dial `target` over a tonic channel and build the stub.
    pub async fn connect<F>(target: DialTarget, initializer: F) -> Result<Self, ClientError>
    where
        F: Fn(tonic::transport::Channel) -> S + Send + Sync + 'static,
    {
        Self::with_dialer(ChannelDialer, target, initializer).await
    }
}

impl<S, D: Dialer> ResilientClient<S, D> {
    /// Dial `target` with `dialer` and build the stub.
    ///
    /// No client exists if the first dial fails.
    pub async fn with_dialer<F>(dialer: D, target: DialTarget, initializer: F) -> Result<Self, ClientError>
    where
        F: Fn(D::Connection) -> S + Send + Sync + 'static,
    {
        let target = Arc::new(target);
        let handle = ConnectionHandle::open(&dialer, Arc::clone(&target))
            .await
            .map_err(|e| dial_error(&target, e))?;
        let stub = initializer(handle.connection().clone());

        let client = Self {
            dialer,
            target,
            initializer: Box::new(initializer),
            live: Some(Live { handle, stub }),
            name: Cow::Borrowed(std::any::type_name::<S>()),
        };
        tracing::debug!(client = %client.name, target = %client.target, "Client connected");
        Ok(client)
    }

    /// Override the diagnostic name (defaults to the stub's type name).
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &DialTarget {
        &self.target
    }

    /// The current stub, if a connection is live.
    pub fn stub(&self) -> Option<&S> {
        self.live.as_ref().map(|live| &live.stub)
    }

    pub fn is_connected(&self) -> bool {
        self.live.is_some()
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.live.as_ref().map(|live| live.handle.id())
    }

    /// Drop the current connection and dial the target again.
    ///
    /// On failure the client is left disconnected.
    async fn reconnect(&mut self) -> Result<(), ClientError> {
        tracing::info!(client = %self.name, target = %self.target, "Reconnecting");

        let redialed = match self.live.take() {
            Some(Live { handle, stub }) => {
                tracing::debug!(
                    client = %self.name,
                    connection_id = %handle.id(),
                    age_ms = handle.age().as_millis() as u64,
                    "Closing connection"
                );
                // The stub holds its own clone of the connection.
                drop(stub);
                handle.redial(&self.dialer).await
            }
            None => ConnectionHandle::open(&self.dialer, Arc::clone(&self.target)).await,
        };

        match redialed {
            Ok(handle) => {
                let stub = (self.initializer)(handle.connection().clone());
                tracing::info!(
                    client = %self.name,
                    target = %self.target,
                    connection_id = %handle.id(),
                    "Reconnected"
                );
                self.live = Some(Live { handle, stub });
                metrics::record_reconnect(&self.name, true);
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    client = %self.name,
                    target = %self.target,
                    error = %e,
                    "Failed to reconnect"
                );
                metrics::record_reconnect(&self.name, false);
                Err(dial_error(&self.target, e))
            }
        }
    }

    /// Close the underlying connection.
    pub fn close(self) {
        tracing::debug!(client = %self.name, target = %self.target, "Client closed");
    }
}

impl<S: Clone, D: Dialer> ResilientClient<S, D> {
    /// Run `call` against the current stub, recovering from `Unavailable`.
    ///
    /// - success: the result is returned unchanged
    /// - `NoRetry` / `RetryOnly` failures: the original status is returned
    /// - `RetryWithReconnect`: one redial; if it succeeds `call` runs once
    ///   more on the fresh stub and that result is returned, otherwise the
    ///   redial error is returned
    ///
    /// A client left disconnected by an earlier failed redial redials before
    /// the first invocation; that counts as this call's reconnect.
    pub async fn call_with_recovery<T, F, Fut>(&mut self, mut call: F) -> Result<T, ClientError>
    where
        F: FnMut(S) -> Fut,
        Fut: Future<Output = Result<T, Status>>,
    {
        let mut reconnected = false;
        if self.live.is_none() {
            self.reconnect_or_record().await?;
            reconnected = true;
        }

        let status = match call(self.current_stub()?).await {
            Ok(value) => {
                metrics::record_call(&self.name, CallOutcome::Ok);
                return Ok(value);
            }
            Err(status) => status,
        };

        let decision = classify(status.code());
        tracing::warn!(
            client = %self.name,
            code = ?status.code(),
            error = %status.message(),
            decision = %decision,
            "Call failed"
        );

        if decision != RetryDecision::RetryWithReconnect || reconnected {
            if decision == RetryDecision::RetryOnly {
                tracing::info!(client = %self.name, code = ?status.code(), "Retryable failure returned to caller");
            }
            metrics::record_call(&self.name, CallOutcome::Failed);
            return Err(ClientError::Call(status));
        }

        self.reconnect_or_record().await?;

        tracing::info!(client = %self.name, "Retrying call on new connection");
        match call(self.current_stub()?).await {
            Ok(value) => {
                metrics::record_call(&self.name, CallOutcome::RecoveredOk);
                Ok(value)
            }
            Err(status) => {
                tracing::error!(
                    client = %self.name,
                    code = ?status.code(),
                    error = %status.message(),
                    "Retry failed"
                );
                metrics::record_call(&self.name, CallOutcome::RecoveredFailed);
                Err(ClientError::Call(status))
            }
        }
    }

    async fn reconnect_or_record(&mut self) -> Result<(), ClientError> {
        let result = self.reconnect().await;
        if result.is_err() {
            metrics::record_call(&self.name, CallOutcome::DialFailed);
        }
        result
    }

    fn current_stub(&self) -> Result<S, ClientError> {
        self.live
            .as_ref()
            .map(|live| live.stub.clone())
            .ok_or_else(|| ClientError::Dial {
                address: self.target.address().to_string(),
                source: "no live connection".into(),
            })
    }
}

impl<S, D: Dialer> std::fmt::Debug for ResilientClient<S, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("name", &self.name)
            .field("target", &self.target.address())
            .field("connection_id", &self.connection_id())
            .finish()
    }
}

fn dial_error<E>(target: &DialTarget, source: E) -> ClientError
where
    E: std::error::Error + Send + Sync + 'static,
{
    ClientError::Dial {
        address: target.address().to_string(),
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

    /// Hands out connection generations 1, 2, 3, ...; refuses while `down`.
    #[derive(Clone, Default)]
    struct FlakyDialer {
        generation: Arc<AtomicU64>,
        dials: Arc<AtomicU32>,
        down: Arc<AtomicBool>,
    }

    impl Dialer for FlakyDialer {
        type Connection = u64;
        type Error = std::io::Error;

        async fn dial(&self, _target: &DialTarget) -> Result<u64, std::io::Error> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                return Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"));
            }
            Ok(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    /// Stub that remembers which connection generation it was built on.
    #[derive(Clone, Debug, PartialEq)]
    struct Stub {
        generation: u64,
    }

    async fn client(dialer: &FlakyDialer) -> ResilientClient<Stub, FlakyDialer> {
        ResilientClient::with_dialer(dialer.clone(), DialTarget::new("inventory:50051"), |generation| Stub {
            generation,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn construction_fails_without_partial_client() {
        let dialer = FlakyDialer::default();
        dialer.down.store(true, Ordering::SeqCst);
        let err = ResilientClient::with_dialer(dialer, DialTarget::new("gone:1"), |g| Stub { generation: g })
            .await
            .unwrap_err();
        assert!(err.is_dial());
        assert!(err.to_string().contains("gone:1"));
    }

    #[tokio::test]
    async fn default_name_is_stub_type() {
        let dialer = FlakyDialer::default();
        let client = client(&dialer).await;
        assert!(client.name().ends_with("Stub"));
        assert_eq!(client.named("inventory").name(), "inventory");
    }

    #[tokio::test]
    async fn success_passes_through_without_redial() {
        let dialer = FlakyDialer::default();
        let mut client = client(&dialer).await;
        let calls = AtomicU32::new(0);

        let value = client
            .call_with_recovery(|stub| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, Status>(stub.generation * 10) }
            })
            .await
            .unwrap();

        assert_eq!(value, 10);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_retryable_error_returned_as_is() {
        let dialer = FlakyDialer::default();
        let mut client = client(&dialer).await;
        let calls = AtomicU32::new(0);

        let err = client
            .call_with_recovery(|_stub| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(Status::not_found("no such sku")) }
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), Some(Code::NotFound));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_only_error_is_not_reissued() {
        let dialer = FlakyDialer::default();
        let mut client = client(&dialer).await;
        let calls = AtomicU32::new(0);

        for status in [
            Status::deadline_exceeded("slow"),
            Status::resource_exhausted("quota"),
            Status::aborted("conflict"),
        ] {
            let code = status.code();
            let status = std::sync::Mutex::new(Some(status));
            let err = client
                .call_with_recovery(|_stub| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let status = status.lock().unwrap().take().unwrap();
                    async move { Err::<(), _>(status) }
                })
                .await
                .unwrap_err();
            assert_eq!(err.code(), Some(code));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 1);
        assert_eq!(client.stub(), Some(&Stub { generation: 1 }));
    }

    #[tokio::test]
    async fn unavailable_redials_and_retries_on_fresh_stub() {
        let dialer = FlakyDialer::default();
        let mut client = client(&dialer).await;
        let first_id = client.connection_id().unwrap();
        let seen = std::sync::Mutex::new(Vec::new());

        let value = client
            .call_with_recovery(|stub| {
                seen.lock().unwrap().push(stub.generation);
                async move {
                    if stub.generation == 1 {
                        Err(Status::unavailable("endpoint moved"))
                    } else {
                        Ok(stub.generation)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 2);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 2);
        assert_ne!(client.connection_id().unwrap(), first_id);
    }

    #[tokio::test]
    async fn call_runs_at_most_twice() {
        let dialer = FlakyDialer::default();
        let mut client = client(&dialer).await;
        let calls = AtomicU32::new(0);

        let err = client
            .call_with_recovery(|_stub| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(Status::unavailable("still down")) }
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), Some(Code::Unavailable));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 2);
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn failed_redial_returns_dial_error_and_disconnects() {
        let dialer = FlakyDialer::default();
        let mut client = client(&dialer).await;
        dialer.down.store(true, Ordering::SeqCst);
        let calls = AtomicU32::new(0);

        let err = client
            .call_with_recovery(|_stub| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(Status::unavailable("gone")) }
            })
            .await
            .unwrap_err();

        assert!(err.is_dial());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!client.is_connected());
        assert!(client.stub().is_none());
        assert!(client.connection_id().is_none());
    }

    #[tokio::test]
    async fn disconnected_client_never_reuses_old_connection() {
        let dialer = FlakyDialer::default();
        let mut client = client(&dialer).await;
        dialer.down.store(true, Ordering::SeqCst);
        let _ = client
            .call_with_recovery(|_stub| async { Err::<(), _>(Status::unavailable("gone")) })
            .await;

        // Still down: the call is not attempted at all.
        let calls = AtomicU32::new(0);
        let err = client
            .call_with_recovery(|_stub| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, Status>(()) }
            })
            .await
            .unwrap_err();
        assert!(err.is_dial());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // Back up: the call runs on a brand new connection.
        dialer.down.store(false, Ordering::SeqCst);
        let generation = client
            .call_with_recovery(|stub| async move { Ok::<_, Status>(stub.generation) })
            .await
            .unwrap();
        assert_eq!(generation, 2);
    }

    #[tokio::test]
    async fn reconnect_on_entry_is_the_only_reconnect() {
        let dialer = FlakyDialer::default();
        let mut client = client(&dialer).await;
        dialer.down.store(true, Ordering::SeqCst);
        let _ = client
            .call_with_recovery(|_stub| async { Err::<(), _>(Status::unavailable("gone")) })
            .await;
        dialer.down.store(false, Ordering::SeqCst);
        let dials_before = dialer.dials.load(Ordering::SeqCst);

        let calls = AtomicU32::new(0);
        let err = client
            .call_with_recovery(|_stub| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(Status::unavailable("flapping")) }
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), Some(Code::Unavailable));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dialer.dials.load(Ordering::SeqCst), dials_before + 1);
    }

    /// Connection that counts itself live until its last clone is dropped.
    struct LiveToken(Arc<AtomicU32>);

    impl Drop for LiveToken {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Records how many connections were still open at each dial.
    #[derive(Clone, Default)]
    struct TrackingDialer {
        live: Arc<AtomicU32>,
        live_at_dial: Arc<std::sync::Mutex<Vec<u32>>>,
    }

    impl Dialer for TrackingDialer {
        type Connection = Arc<LiveToken>;
        type Error = std::io::Error;

        async fn dial(&self, _target: &DialTarget) -> Result<Arc<LiveToken>, std::io::Error> {
            self.live_at_dial.lock().unwrap().push(self.live.load(Ordering::SeqCst));
            self.live.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(LiveToken(Arc::clone(&self.live))))
        }
    }

    #[tokio::test]
    async fn old_connection_closed_before_redial() {
        let dialer = TrackingDialer::default();
        let mut client = ResilientClient::with_dialer(dialer.clone(), DialTarget::new("inventory:50051"), |conn| conn)
            .await
            .unwrap();
        let calls = AtomicU32::new(0);

        client
            .call_with_recovery(|_stub| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(Status::unavailable("reset"))
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(*dialer.live_at_dial.lock().unwrap(), vec![0, 0]);
        assert_eq!(dialer.live.load(Ordering::SeqCst), 1);

        client.close();
        assert_eq!(dialer.live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_redial_is_counted_as_a_call() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        ::metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                let dialer = FlakyDialer::default();
                let mut client = client(&dialer).await.named("inventory");
                dialer.down.store(true, Ordering::SeqCst);
                let err = client
                    .call_with_recovery(|_stub| async { Err::<(), _>(Status::unavailable("gone")) })
                    .await
                    .unwrap_err();
                assert!(err.is_dial());
            })
        });

        let rendered = handle.render();
        assert!(rendered.contains(r#"outcome="dial_failed"} 1"#), "{}", rendered);
        assert!(!rendered.contains(r#"outcome="failed""#), "{}", rendered);
    }
}
