//! Dial targets and the dialer seam.
//!
//! # Responsibilities
//! - Describe where and how to connect (address + ordered dial options)
//! - Turn a target into a live transport connection
//!
//! # Design Decisions
//! - A target is immutable once handed to a client; every redial reuses it
//! - Options are applied in the order they were given
//! - Dialing is eager so an unreachable target is reported at dial time

use std::future::Future;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};

/// A single knob applied to the transport endpoint before connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialOption {
    /// Upper bound on establishing the TCP/HTTP2 connection.
    ConnectTimeout(Duration),
    /// Deadline applied to every request on the connection.
    RequestTimeout(Duration),
    TcpNoDelay(bool),
    TcpKeepalive(Option<Duration>),
    Http2KeepAliveInterval(Duration),
    KeepAliveTimeout(Duration),
    KeepAliveWhileIdle(bool),
    UserAgent(String),
    /// Maximum in-flight requests on the connection.
    ConcurrencyLimit(usize),
}

/// Network address plus the options used for every (re)dial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialTarget {
    address: String,
    options: Vec<DialOption>,
}

impl DialTarget {
    /// Create a target for a `host:port` address with no options.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            options: Vec::new(),
        }
    }

    /// Append an option.
    pub fn with_option(mut self, option: DialOption) -> Self {
        self.options.push(option);
        self
    }

    /// Append several options, preserving order.
    pub fn with_options(mut self, options: impl IntoIterator<Item = DialOption>) -> Self {
        self.options.extend(options);
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn options(&self) -> &[DialOption] {
        &self.options
    }

    /// URI handed to the transport. Bare `host:port` is dialed over plain HTTP/2.
    pub fn uri(&self) -> String {
        if self.address.contains("://") {
            self.address.clone()
        } else {
            format!("http://{}", self.address)
        }
    }

    /// Build a tonic endpoint with every option applied in order.
    pub fn endpoint(&self) -> Result<Endpoint, tonic::transport::Error> {
        let mut endpoint = Endpoint::from_shared(self.uri())?;
        for option in &self.options {
            endpoint = match option {
                DialOption::ConnectTimeout(d) => endpoint.connect_timeout(*d),
                DialOption::RequestTimeout(d) => endpoint.timeout(*d),
                DialOption::TcpNoDelay(on) => endpoint.tcp_nodelay(*on),
                DialOption::TcpKeepalive(d) => endpoint.tcp_keepalive(*d),
                DialOption::Http2KeepAliveInterval(d) => endpoint.http2_keep_alive_interval(*d),
                DialOption::KeepAliveTimeout(d) => endpoint.keep_alive_timeout(*d),
                DialOption::KeepAliveWhileIdle(on) => endpoint.keep_alive_while_idle(*on),
                DialOption::UserAgent(agent) => endpoint.user_agent(agent.clone())?,
                DialOption::ConcurrencyLimit(limit) => endpoint.concurrency_limit(*limit),
            };
        }
        Ok(endpoint)
    }
}

impl std::fmt::Display for DialTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.address)
    }
}

/// Establishes transport connections for a [`DialTarget`].
///
/// The client is generic over this trait so the connection type can be
/// swapped (tests use an in-memory dialer).
pub trait Dialer: Send + Sync {
    /// Live connection. Cloning must yield a view of the same connection.
    type Connection: Clone + Send + Sync + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    fn dial(
        &self,
        target: &DialTarget,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// Dials a tonic [`Channel`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelDialer;

impl Dialer for ChannelDialer {
    type Connection = Channel;
    type Error = tonic::transport::Error;

    fn dial(
        &self,
        target: &DialTarget,
    ) -> impl Future<Output = Result<Channel, tonic::transport::Error>> + Send {
        let endpoint = target.endpoint();
        async move { endpoint?.connect().await }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_address_gets_http_scheme() {
        let target = DialTarget::new("10.0.0.7:50051");
        assert_eq!(target.uri(), "http://10.0.0.7:50051");
        assert_eq!(target.to_string(), "10.0.0.7:50051");
    }

    #[test]
    fn explicit_scheme_is_kept() {
        let target = DialTarget::new("https://svc.internal:443");
        assert_eq!(target.uri(), "https://svc.internal:443");
    }

    #[test]
    fn options_keep_insertion_order() {
        let target = DialTarget::new("localhost:1")
            .with_option(DialOption::TcpNoDelay(true))
            .with_options([
                DialOption::ConnectTimeout(Duration::from_secs(2)),
                DialOption::UserAgent("probe/1".into()),
            ]);
        assert_eq!(
            target.options(),
            &[
                DialOption::TcpNoDelay(true),
                DialOption::ConnectTimeout(Duration::from_secs(2)),
                DialOption::UserAgent("probe/1".into()),
            ]
        );
        assert!(target.endpoint().is_ok());
    }

    #[test]
    fn malformed_address_fails_to_build_endpoint() {
        let target = DialTarget::new("not a host:port");
        assert!(target.endpoint().is_err());
    }

    #[tokio::test]
    async fn dialing_a_closed_port_fails() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let target = DialTarget::new(addr.to_string())
            .with_option(DialOption::ConnectTimeout(Duration::from_millis(500)));
        assert!(ChannelDialer.dial(&target).await.is_err());
    }
}
