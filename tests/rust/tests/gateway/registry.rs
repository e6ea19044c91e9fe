//! Endpoint registry tests
//!
//! Duplicate names, readiness reporting and endpoint startup.

use devgate_core::EventBus;
use devgate_gateway::{ConnectionGateway, StartupError};
use pretty_assertions::assert_eq;
use tests::{GatewayEvent, LinkRole, MockLink, RecordingEndpoint, StaticGate};

#[tokio::test]
async fn duplicate_name_keeps_first_endpoint_and_is_reported() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let first = RecordingEndpoint::new("telemetry");
    let second = RecordingEndpoint::new("telemetry");

    let mut builder = ConnectionGateway::builder(2, StaticGate::allow()).events(bus.sender());
    assert!(builder.endpoint(first.clone()));
    assert!(!builder.endpoint(second.clone()));
    let gateway = builder.build();

    assert_eq!(gateway.registry().len(), 1);
    assert_eq!(
        rx.drain(),
        vec![GatewayEvent::EndpointRegistrationRejected {
            worker: 2,
            name: "telemetry".to_string(),
        }]
    );

    // Links go to the first registration
    let (link, _probe) = MockLink::receiver("telemetry/t1");
    let attachments = devgate_gateway::ConnectionAttachments::authenticated(None);
    gateway.attach_link(&attachments, link).await;

    assert_eq!(first.attach_count(), 1);
    assert_eq!(second.attach_count(), 0);
}

#[test]
fn missing_mandatory_endpoints_do_not_block_startup() {
    let event = RecordingEndpoint::new("event");
    let gateway = ConnectionGateway::builder(0, StaticGate::allow())
        .with_endpoint(event.clone())
        .build();

    assert_eq!(
        gateway.registry().readiness_check(),
        vec!["telemetry", "registration"]
    );
    assert!(gateway.start_endpoints().is_ok());
    assert_eq!(event.start_calls(), 1);
}

#[test]
fn failing_endpoint_start_is_a_startup_error() {
    let gateway = ConnectionGateway::builder(1, StaticGate::allow())
        .with_endpoint(RecordingEndpoint::new("telemetry"))
        .with_endpoint(RecordingEndpoint::failing("registration"))
        .build();

    match gateway.start_endpoints() {
        Err(StartupError::EndpointStart { index, name }) => {
            assert_eq!(index, 1);
            assert_eq!(name, "registration");
        }
        other => panic!("expected endpoint start failure, got {:?}", other),
    }
}

#[tokio::test]
async fn endpoints_are_looked_up_by_first_segment_only() {
    let registration = RecordingEndpoint::new("registration");
    let gateway = ConnectionGateway::builder(0, StaticGate::allow())
        .with_endpoint(registration.clone())
        .build();
    let attachments = devgate_gateway::ConnectionAttachments::authenticated(None);

    let (link, probe) = MockLink::sender("registration/tenant-a/device-1");
    gateway.attach_link(&attachments, link).await;

    assert!(probe.is_mirrored());
    let attached = registration.attached();
    assert_eq!(attached.len(), 1);
    assert_eq!(attached[0].0, LinkRole::Sender);
    assert_eq!(attached[0].1.tenant_id(), "tenant-a");
    assert_eq!(attached[0].1.device_id(), Some("device-1"));
}
