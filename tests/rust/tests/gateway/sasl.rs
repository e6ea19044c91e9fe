//! SASL PLAIN negotiation tests
//!
//! Authenticator behaviour against a scripted transport, with both
//! credential policies.

use devgate_core::{CredentialPolicy, SaslConfig};
use devgate_gateway::auth::{password_digest, AuthenticatorFactory, StaticCredentials};
use devgate_gateway::engine::{SaslAuthenticator, SaslOutcome, SaslSession};
use devgate_gateway::{ConnectionAttachments, PlainAuthenticator};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::Arc;
use tests::ScriptedTransport;

fn static_factory() -> AuthenticatorFactory {
    let users = HashMap::from([("alice".to_string(), password_digest("wonderland"))]);
    AuthenticatorFactory::new(Arc::new(StaticCredentials::new(users)))
}

fn accept_all_factory() -> AuthenticatorFactory {
    AuthenticatorFactory::from_config(&SaslConfig {
        credentials: CredentialPolicy::AcceptAll,
        ..Default::default()
    })
}

/// Run one negotiation through the same session API an engine uses
fn negotiate(
    authenticator: &mut PlainAuthenticator,
    transport: &mut ScriptedTransport,
) -> ConnectionAttachments {
    let mut attachments = ConnectionAttachments::default();
    {
        let mut session = SaslSession::new(&mut *authenticator, &mut attachments);
        session.init(&mut *transport);
        assert!(session.process(&mut *transport));
    }
    attachments.set_authenticated(authenticator.succeeded());
    attachments
}

#[test]
fn init_offers_plain_and_forbids_skip() {
    let mut transport = ScriptedTransport::default();
    accept_all_factory().create().init(&mut transport);

    assert!(transport.server_mode);
    assert_eq!(transport.skip_allowed, Some(false));
    assert_eq!(transport.offered, vec!["PLAIN".to_string()]);
}

#[test]
fn oauthbearer_in_config_is_never_offered() {
    let factory = AuthenticatorFactory::from_config(&SaslConfig {
        mechanisms: vec!["PLAIN".to_string(), "OAUTHBEARER".to_string()],
        credentials: CredentialPolicy::AcceptAll,
    });

    let mut transport = ScriptedTransport::default();
    factory.create().init(&mut transport);
    assert_eq!(transport.offered, vec!["PLAIN".to_string()]);
}

#[test]
fn process_waits_until_client_proposes_mechanism() {
    let mut auth = accept_all_factory().create();
    let mut transport = ScriptedTransport::default();
    let mut attachments = ConnectionAttachments::default();

    assert!(!auth.process(&mut transport, &mut attachments));
    assert_eq!(transport.outcome, None);
    assert!(!auth.succeeded());
}

#[test]
fn valid_credentials_bind_authcid() {
    let mut auth = static_factory().create();
    let mut transport = ScriptedTransport::plain(b"admin\0alice\0wonderland");

    let attachments = negotiate(&mut auth, &mut transport);

    assert!(auth.succeeded());
    assert_eq!(transport.outcome, Some(SaslOutcome::Ok));
    assert!(attachments.is_authenticated());
    // The authzid is ignored
    assert_eq!(attachments.principal().map(|p| p.subject()), Some("alice"));
}

#[test]
fn wrong_password_fails() {
    let mut auth = static_factory().create();
    let mut transport = ScriptedTransport::plain(b"\0alice\0looking-glass");

    let attachments = negotiate(&mut auth, &mut transport);

    assert!(!auth.succeeded());
    assert_eq!(transport.outcome, Some(SaslOutcome::Auth));
    assert!(!attachments.is_authenticated());
    assert!(attachments.principal().is_none());
}

#[test]
fn default_policy_rejects_everyone() {
    let factory = AuthenticatorFactory::from_config(&SaslConfig::default());
    let mut auth = factory.create();
    let mut transport = ScriptedTransport::plain(b"\0alice\0wonderland");

    negotiate(&mut auth, &mut transport);
    assert_eq!(transport.outcome, Some(SaslOutcome::Auth));
}

#[test]
fn malformed_responses_fail() {
    for response in [
        b"alice".as_slice(),
        b"\0alice".as_slice(),
        b"\0alice\0".as_slice(),
        b"".as_slice(),
    ] {
        let mut auth = accept_all_factory().create();
        let mut transport = ScriptedTransport::plain(response);

        let attachments = negotiate(&mut auth, &mut transport);

        assert!(!auth.succeeded(), "accepted {:?}", response);
        assert_eq!(transport.outcome, Some(SaslOutcome::Auth));
        assert!(attachments.principal().is_none());
    }
}

#[test]
fn unsupported_mechanism_fails() {
    let mut auth = accept_all_factory().create();
    let mut transport = ScriptedTransport::with_mechanism("ANONYMOUS", b"");

    negotiate(&mut auth, &mut transport);

    assert!(!auth.succeeded());
    assert_eq!(transport.outcome, Some(SaslOutcome::Auth));
}

#[test]
fn accept_all_binds_any_user() {
    let mut auth = accept_all_factory().create();
    let mut transport = ScriptedTransport::plain(b"\0device-4711\0whatever");

    let attachments = negotiate(&mut auth, &mut transport);

    assert!(auth.succeeded());
    assert_eq!(
        attachments.principal().map(|p| p.subject()),
        Some("device-4711")
    );
}
