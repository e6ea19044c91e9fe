//! Authorization channel tests
//!
//! Gate, channel and access control list wired together the way a worker
//! wires them.

use async_trait::async_trait;
use devgate_core::{AuthorizationRequest, GatewayConfig};
use devgate_gateway::authorization::{
    AuthorizationChannel, AuthorizationGate, AuthorizationService, ChannelAuthorizationGate,
};
use devgate_gateway::engine::conditions;
use devgate_gateway::{AccessControlList, AccessRule, ConnectionAttachments, ConnectionGateway};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tests::{fixtures, AuthenticatedIdentity, MockLink, Permission, RecordingEndpoint};

fn acl() -> Arc<AccessControlList> {
    Arc::new(AccessControlList::new(vec![
        AccessRule::grant("alice", "telemetry/tenant-a*", &[Permission::Write]),
        AccessRule::grant("alice", "registration/tenant-a*", &[Permission::Read]),
    ]))
}

fn gate_with(
    service: Arc<dyn AuthorizationService>,
    timeout: Duration,
) -> ChannelAuthorizationGate {
    let (channel, inbox) = AuthorizationChannel::open("authorization.in.0", 16);
    inbox.serve(service);
    ChannelAuthorizationGate::new(channel, timeout)
}

#[test]
fn worker_addresses_follow_base_and_index() {
    let config = GatewayConfig::default();
    assert_eq!(config.authorization_address(0), "authorization.in.0");
    assert_eq!(config.authorization_address(3), "authorization.in.3");
}

#[tokio::test]
async fn acl_decisions_travel_over_the_channel() {
    let gate = gate_with(acl(), Duration::from_secs(1));
    let alice = AuthenticatedIdentity::new("alice");

    assert!(
        gate.check(&alice, &fixtures::resource("telemetry/tenant-a/d1"), Permission::Write)
            .await
    );
    assert!(
        !gate
            .check(&alice, &fixtures::resource("telemetry/tenant-a/d1"), Permission::Read)
            .await
    );
    assert!(
        !gate
            .check(&alice, &fixtures::resource("telemetry/tenant-b"), Permission::Write)
            .await
    );
    assert!(
        !gate
            .check(
                &AuthenticatedIdentity::new("bob"),
                &fixtures::resource("telemetry/tenant-a"),
                Permission::Write
            )
            .await
    );
}

#[tokio::test]
async fn gateway_with_acl_attaches_and_rejects() {
    let telemetry = RecordingEndpoint::new("telemetry");
    let gateway = ConnectionGateway::builder(
        0,
        Arc::new(gate_with(acl(), Duration::from_secs(1))),
    )
    .with_endpoint(telemetry.clone())
    .build();
    let attachments =
        ConnectionAttachments::authenticated(Some(AuthenticatedIdentity::new("alice")));

    let (allowed, allowed_probe) = MockLink::receiver("telemetry/tenant-a/d1");
    let (denied, denied_probe) = MockLink::sender("telemetry/tenant-a/d1");

    assert!(gateway.attach_link(&attachments, allowed).await.is_attached());
    assert!(!gateway.attach_link(&attachments, denied).await.is_attached());

    assert!(allowed_probe.is_mirrored());
    assert_eq!(
        denied_probe.condition_symbol(),
        Some(conditions::UNAUTHORIZED_ACCESS)
    );
    assert_eq!(telemetry.attach_count(), 1);
}

struct Stalled;

#[async_trait]
impl AuthorizationService for Stalled {
    async fn authorize(&self, _request: &AuthorizationRequest) -> anyhow::Result<String> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok("allowed".to_string())
    }
}

#[tokio::test(start_paused = true)]
async fn late_reply_is_treated_as_denial() {
    let gate = gate_with(Arc::new(Stalled), Duration::from_millis(5000));
    let started = tokio::time::Instant::now();

    let allowed = gate
        .check(
            &AuthenticatedIdentity::new("alice"),
            &fixtures::resource("telemetry/tenant-a"),
            Permission::Write,
        )
        .await;

    assert!(!allowed);
    assert!(started.elapsed() >= Duration::from_millis(5000));
    assert!(started.elapsed() < Duration::from_secs(60));
}

#[tokio::test]
async fn service_sees_request_fields() {
    let (channel, mut inbox) = AuthorizationChannel::open("authorization.in.7", 1);
    let gate = ChannelAuthorizationGate::new(channel, Duration::from_secs(1));

    let check = tokio::spawn(async move {
        gate.check(
            &AuthenticatedIdentity::new("gateway-client"),
            &fixtures::resource("registration/t1/d9"),
            Permission::Read,
        )
        .await
    });

    let exchange = inbox.next().await.unwrap();
    assert_eq!(
        serde_json::to_value(&exchange.request).unwrap(),
        serde_json::json!({
            "subject": "gateway-client",
            "resource": "registration/t1/d9",
            "permission": "READ",
        })
    );
    exchange.reply("allowed");

    assert!(check.await.unwrap());
}
