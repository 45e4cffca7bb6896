//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use foundation_rpc::config::{ClientConfig, HostConfig};
use foundation_rpc::{AllowedPortSet, DialTarget, DualProtocolHost, ListenerGuard, ServiceRegistrar, ServiceRegistry};
use tonic_health::server::HealthReporter;
use tonic_health::ServingStatus;

pub const SERVICE: &str = "inventory";

/// Health service registrar with `service` marked serving.
pub async fn health_registrar(service: &str) -> (HealthReporter, impl ServiceRegistrar) {
    let (reporter, health) = tonic_health::server::health_reporter();
    reporter.set_service_status(service, ServingStatus::Serving).await;
    let registrar = move |registry: &mut ServiceRegistry| {
        let max = registry.max_message_size();
        registry.add_service(
            health
                .clone()
                .max_decoding_message_size(max)
                .max_encoding_message_size(max),
        );
    };
    (reporter, registrar)
}

pub fn guard_allowing(ports: &[&str]) -> Arc<ListenerGuard> {
    Arc::new(ListenerGuard::new(AllowedPortSet::from_ports(ports.iter().copied()).unwrap()))
}

pub fn host_config(primary: &str, bridge: Option<&str>) -> HostConfig {
    HostConfig {
        service_name: SERVICE.into(),
        primary_address: primary.into(),
        bridge_enabled: bridge.is_some(),
        bridge_address: bridge.unwrap_or_default().into(),
    }
}

/// Bind and start a host serving the health service.
pub async fn start_health_host(
    primary: &str,
    bridge: Option<&str>,
    guard: Arc<ListenerGuard>,
) -> (DualProtocolHost, HealthReporter) {
    let (reporter, registrar) = health_registrar(SERVICE).await;
    let mut host = DualProtocolHost::bind(host_config(primary, bridge), guard).await.unwrap();
    host.start(&registrar).await.unwrap();
    (host, reporter)
}

pub fn dial_target(addr: SocketAddr) -> DialTarget {
    let client = ClientConfig {
        connect_timeout_ms: 2_000,
        request_timeout_ms: 5_000,
        ..Default::default()
    };
    client.dial_target(addr.to_string())
}

/// gRPC-Web data frame around an encoded message.
pub fn grpc_web_frame(message: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(5 + message.len());
    frame.push(0);
    frame.extend_from_slice(&(message.len() as u32).to_be_bytes());
    frame.extend_from_slice(message);
    frame
}

/// Data frame of a `HealthCheckResponse { status: SERVING }`.
pub const SERVING_FRAME: [u8; 7] = [0, 0, 0, 0, 2, 0x08, 0x01];
