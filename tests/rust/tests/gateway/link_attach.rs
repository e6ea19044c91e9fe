//! Link attach protocol tests
//!
//! Parse, endpoint lookup, identity resolution, authorization and the
//! resulting link commands, per link role.

use devgate_core::constants::DEFAULT_TENANT;
use devgate_core::{AddressRejection, EventBus, RejectionReason};
use devgate_gateway::authorization::AuthorizationGate;
use devgate_gateway::engine::conditions;
use devgate_gateway::{ConnectionAttachments, ConnectionGateway, LinkOutcome};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tests::mocks::CheckRecord;
use tests::{
    fixtures, AuthenticatedIdentity, GatewayEvent, LinkRole, MockLink, Permission,
    RecordingEndpoint, ScriptedGate, StaticGate, TenancyMode,
};

struct Setup {
    gateway: Arc<ConnectionGateway>,
    telemetry: Arc<RecordingEndpoint>,
    registration: Arc<RecordingEndpoint>,
}

fn setup_with(
    gate: Arc<dyn AuthorizationGate>,
    tenancy: TenancyMode,
    rejection: AddressRejection,
    bus: Option<&EventBus>,
) -> Setup {
    let telemetry = RecordingEndpoint::new("telemetry");
    let registration = RecordingEndpoint::new("registration");

    let mut builder = ConnectionGateway::builder(0, gate)
        .container("Gateway-127.0.0.1:5672-0")
        .tenancy(tenancy)
        .address_rejection(rejection)
        .with_endpoint(telemetry.clone())
        .with_endpoint(registration.clone());
    if let Some(bus) = bus {
        builder = builder.events(bus.sender());
    }

    Setup {
        gateway: Arc::new(builder.build()),
        telemetry,
        registration,
    }
}

fn setup(gate: Arc<dyn AuthorizationGate>) -> Setup {
    setup_with(
        gate,
        TenancyMode::MultiTenant,
        AddressRejection::Asymmetric,
        None,
    )
}

fn alice() -> ConnectionAttachments {
    ConnectionAttachments::authenticated(Some(AuthenticatedIdentity::new("alice")))
}

// ============================================================================
// Successful attach
// ============================================================================

#[tokio::test]
async fn receiver_attach_is_mirrored_and_handed_to_endpoint() {
    let gate = StaticGate::allow();
    let t = setup(gate.clone());
    let (link, probe) = MockLink::receiver("telemetry/DEFAULT_TENANT/4711");

    let outcome = t.gateway.attach_link(&alice(), link).await;

    assert_eq!(
        outcome,
        LinkOutcome::Attached(fixtures::resource("telemetry/DEFAULT_TENANT/4711"))
    );
    assert!(probe.is_mirrored());
    assert!(!probe.is_closed());
    assert_eq!(probe.condition(), None);
    assert_eq!(
        t.telemetry.attached(),
        vec![(
            LinkRole::Receiver,
            fixtures::resource("telemetry/DEFAULT_TENANT/4711")
        )]
    );
    assert_eq!(
        gate.checks(),
        vec![CheckRecord {
            subject: "alice".to_string(),
            resource: "telemetry/DEFAULT_TENANT/4711".to_string(),
            permission: Permission::Write,
        }]
    );
}

#[tokio::test]
async fn sender_attach_requires_read() {
    let gate = StaticGate::allow();
    let t = setup(gate.clone());
    let (link, probe) = MockLink::sender("registration/tenant-a");

    let outcome = t.gateway.attach_link(&alice(), link).await;

    assert!(outcome.is_attached());
    assert!(probe.is_mirrored());
    assert_eq!(t.registration.attach_count(), 1);
    assert_eq!(gate.checks()[0].permission, Permission::Read);
    assert_eq!(gate.checks()[0].resource, "registration/tenant-a");
}

#[tokio::test]
async fn missing_principal_uses_default_subject() {
    let gate = StaticGate::allow();
    let t = setup(gate.clone());
    let (link, _probe) = MockLink::receiver("telemetry/t1");

    t.gateway
        .attach_link(&ConnectionAttachments::authenticated(None), link)
        .await;

    assert_eq!(gate.checks()[0].subject, "gateway-client");
}

#[tokio::test]
async fn single_tenant_address_resolves_default_tenant() {
    let gate = StaticGate::allow();
    let t = setup_with(
        gate.clone(),
        TenancyMode::SingleTenant,
        AddressRejection::Asymmetric,
        None,
    );
    let (link, probe) = MockLink::receiver("telemetry/4711");

    let outcome = t.gateway.attach_link(&alice(), link).await;

    let LinkOutcome::Attached(resource) = outcome else {
        panic!("expected attach, got {:?}", outcome);
    };
    assert_eq!(resource.endpoint(), "telemetry");
    assert_eq!(resource.tenant_id(), DEFAULT_TENANT);
    assert_eq!(resource.device_id(), Some("4711"));
    assert!(probe.is_mirrored());
}

// ============================================================================
// Unknown endpoint
// ============================================================================

#[tokio::test]
async fn unknown_endpoint_closes_with_not_found_for_both_roles() {
    let gate = StaticGate::allow();
    let t = setup(gate.clone());

    for (link, probe) in [
        MockLink::receiver("unknown/t1"),
        MockLink::sender("unknown/t1"),
    ] {
        let outcome = t.gateway.attach_link(&alice(), link).await;

        assert_eq!(
            outcome,
            LinkOutcome::EndpointMissing(fixtures::resource("unknown/t1"))
        );
        assert!(probe.is_closed());
        assert!(!probe.is_mirrored());
        assert_eq!(probe.condition_symbol(), Some(conditions::NOT_FOUND));
    }

    // Never reached authorization
    assert!(gate.checks().is_empty());
    assert_eq!(t.telemetry.attach_count(), 0);
}

// ============================================================================
// Invalid address
// ============================================================================

#[tokio::test]
async fn invalid_receiver_address_closes_with_invalid_field() {
    let gate = StaticGate::allow();
    let t = setup(gate.clone());
    let (link, probe) = MockLink::receiver("telemetry");

    let outcome = t.gateway.attach_link(&alice(), link).await;

    assert!(matches!(outcome, LinkOutcome::AddressRejected(_)));
    assert!(probe.is_closed());
    assert_eq!(probe.condition_symbol(), Some(conditions::INVALID_FIELD));
    assert!(gate.checks().is_empty());
}

#[tokio::test]
async fn invalid_sender_address_closes_without_condition() {
    let t = setup(StaticGate::allow());
    let (link, probe) = MockLink::sender("telemetry");

    let outcome = t.gateway.attach_link(&alice(), link).await;

    assert!(matches!(outcome, LinkOutcome::AddressRejected(_)));
    assert!(probe.is_closed());
    assert_eq!(probe.condition(), None);
}

#[tokio::test]
async fn uniform_rejection_sets_invalid_field_for_senders() {
    let t = setup_with(
        StaticGate::allow(),
        TenancyMode::MultiTenant,
        AddressRejection::Uniform,
        None,
    );
    let (link, probe) = MockLink::sender("telemetry/t1/d1/extra");

    t.gateway.attach_link(&alice(), link).await;

    assert!(probe.is_closed());
    assert_eq!(probe.condition_symbol(), Some(conditions::INVALID_FIELD));
}

#[tokio::test]
async fn missing_remote_address_is_rejected() {
    let t = setup(StaticGate::allow());
    let (link, probe) = MockLink::new(LinkRole::Receiver, None);

    let outcome = t.gateway.attach_link(&alice(), link).await;

    assert!(matches!(outcome, LinkOutcome::AddressRejected(_)));
    assert_eq!(probe.condition_symbol(), Some(conditions::INVALID_FIELD));
}

// ============================================================================
// Authorization
// ============================================================================

#[tokio::test]
async fn denied_attach_closes_with_unauthorized_access() {
    let t = setup(StaticGate::deny());
    let (link, probe) = MockLink::receiver("telemetry/t1");

    let outcome = t.gateway.attach_link(&alice(), link).await;

    assert_eq!(
        outcome,
        LinkOutcome::Unauthorized(fixtures::resource("telemetry/t1"))
    );
    assert!(probe.is_closed());
    assert!(!probe.is_mirrored());
    let condition = probe.condition().unwrap();
    assert_eq!(condition.condition, conditions::UNAUTHORIZED_ACCESS);
    assert_eq!(
        condition.description,
        "[alice] is not authorized to attach to [telemetry/t1]"
    );
    assert_eq!(t.telemetry.attach_count(), 0);
}

#[tokio::test]
async fn unauthenticated_connection_rejects_links_without_asking() {
    let gate = StaticGate::allow();
    let t = setup(gate.clone());
    let (link, probe) = MockLink::receiver("telemetry/t1");

    let outcome = t
        .gateway
        .attach_link(&ConnectionAttachments::default(), link)
        .await;

    assert_eq!(outcome, LinkOutcome::NotAuthenticated);
    assert!(probe.is_closed());
    assert_eq!(probe.condition_symbol(), Some(conditions::UNAUTHORIZED_ACCESS));
    assert!(gate.checks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn replies_complete_out_of_order_per_link() {
    let gate = Arc::new(
        ScriptedGate::new()
            .decide("telemetry/slow", Duration::from_millis(500), true)
            .decide("telemetry/fast", Duration::from_millis(10), false),
    );
    let t = setup(gate.clone());

    let (slow_link, slow) = MockLink::receiver("telemetry/slow");
    let (fast_link, fast) = MockLink::receiver("telemetry/fast");

    let gateway = t.gateway.clone();
    let slow_task = tokio::spawn(async move { gateway.attach_link(&alice(), slow_link).await });
    let gateway = t.gateway.clone();
    let fast_task = tokio::spawn(async move { gateway.attach_link(&alice(), fast_link).await });

    let fast_outcome = fast_task.await.unwrap();
    assert!(matches!(fast_outcome, LinkOutcome::Unauthorized(_)));
    assert!(fast.is_closed());
    // The slow link is still waiting for its decision
    assert!(!slow.is_closed());
    assert!(!slow.is_mirrored());

    let slow_outcome = slow_task.await.unwrap();
    assert!(slow_outcome.is_attached());
    assert!(slow.is_mirrored());
    assert!(!slow.is_closed());

    assert_eq!(
        gate.completed(),
        vec!["telemetry/fast".to_string(), "telemetry/slow".to_string()]
    );
    assert_eq!(t.telemetry.attached()[0].1, fixtures::resource("telemetry/slow"));
}

// ============================================================================
// Events and sessions
// ============================================================================

#[tokio::test]
async fn outcomes_are_published_as_events() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let t = setup_with(
        StaticGate::allow(),
        TenancyMode::MultiTenant,
        AddressRejection::Asymmetric,
        Some(&bus),
    );

    let (ok_link, _) = MockLink::receiver("telemetry/t1/d1");
    let (bad_link, _) = MockLink::sender("event/t1");
    t.gateway.attach_link(&alice(), ok_link).await;
    t.gateway.attach_link(&alice(), bad_link).await;

    let events = rx.drain();
    assert_eq!(
        events,
        vec![
            GatewayEvent::LinkAttached {
                worker: 0,
                role: LinkRole::Receiver,
                resource: "telemetry/t1/d1".to_string(),
                subject: "alice".to_string(),
            },
            GatewayEvent::LinkRejected {
                worker: 0,
                role: LinkRole::Sender,
                address: Some("event/t1".to_string()),
                reason: RejectionReason::EndpointMissing,
            },
        ]
    );
}

#[test]
fn sessions_open_only_after_successful_sasl() {
    let t = setup(StaticGate::allow());

    let (mut session, probe) = tests::MockSession::new();
    t.gateway.on_session_open(&alice(), &mut session);
    assert!(probe.is_open());

    t.gateway.on_session_close(&mut session);
    assert!(probe.is_closed());

    let (mut session, probe) = tests::MockSession::new();
    t.gateway
        .on_session_open(&ConnectionAttachments::default(), &mut session);
    assert!(!probe.is_open());
    assert!(probe.is_closed());
}
