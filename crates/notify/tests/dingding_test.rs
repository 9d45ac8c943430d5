//! End-to-end tests for the DingDing notifier: settings validation,
//! payload shape and mention tags as seen by the transport.

mod common;

use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use common::{registry, RecordingTransport};
use herald_core::{AlertState, EvaluationContext};
use herald_notify::{BuildError, ConfigError, Notifier, NotifierSettings, SecretResolver};

const TIMEOUT: Duration = Duration::from_secs(5);

fn settings(json: serde_json::Value) -> NotifierSettings {
    NotifierSettings::new("dingding_testing", "dingding", json)
}

fn alerting() -> EvaluationContext {
    let mut ctx = EvaluationContext::new(AlertState::Alerting, r#"{host="localhost"}"#)
        .with_rule(1, "Host down");
    ctx.previous_state = AlertState::Ok;
    ctx
}

async fn dispatch_body(ctx: &EvaluationContext) -> String {
    let transport = RecordingTransport::ok();
    let notifier = registry(transport.clone(), TIMEOUT)
        .build_from(
            &settings(json!({ "url": "https://www.google.com" })),
            &SecretResolver::plaintext(),
        )
        .unwrap();

    let result = notifier.dispatch(ctx, &CancellationToken::new()).await;
    assert!(result.success, "{result:?}");
    transport.single_body().to_string()
}

#[test]
fn empty_settings_rejected() {
    let transport = RecordingTransport::ok();
    let err = registry(transport, TIMEOUT)
        .build_from(&settings(json!({})), &SecretResolver::plaintext())
        .unwrap_err();
    assert_eq!(err, BuildError::Config(ConfigError::missing("url")));
}

#[test]
fn valid_settings_build() {
    let transport = RecordingTransport::ok();
    let notifier = registry(transport, TIMEOUT)
        .build_from(
            &settings(json!({ "url": "https://www.google.com" })),
            &SecretResolver::plaintext(),
        )
        .unwrap();

    assert_eq!(notifier.name(), "dingding_testing");
    assert_eq!(notifier.config().kind, "dingding");
    assert_eq!(notifier.config().endpoint, "https://www.google.com");
}

#[tokio::test]
async fn no_mention_tags_no_mention_fields() {
    let body = dispatch_body(&alerting()).await;
    assert!(!body.contains("isAtAll"), "{body}");
    assert!(!body.contains("atMobiles"), "{body}");
}

#[tokio::test]
async fn broadcast_tag() {
    let body = dispatch_body(&alerting().with_tag("isAtAll", "true")).await;
    assert!(body.contains("isAtAll"), "{body}");
}

#[tokio::test]
async fn targeted_tag() {
    let body = dispatch_body(&alerting().with_tag("atMobiles", "12222222,22232112")).await;
    assert!(body.contains("atMobiles"), "{body}");
    assert!(!body.contains("isAtAll"), "{body}");

    let first = body.find("12222222").expect("first mobile");
    let second = body.find("22232112").expect("second mobile");
    assert!(first < second, "{body}");
}

#[test]
fn padded_url_rejected() {
    let transport = RecordingTransport::ok();
    let err = registry(transport, TIMEOUT)
        .build_from(
            &settings(json!({ "url": " https://www.google.com " })),
            &SecretResolver::plaintext(),
        )
        .unwrap_err();
    assert!(matches!(err, BuildError::Config(ConfigError::InvalidUrl { .. })), "{err:?}");
}

#[tokio::test]
async fn request_goes_to_configured_url() {
    let transport = RecordingTransport::ok();
    let notifier = registry(transport.clone(), TIMEOUT)
        .build_from(
            &settings(json!({ "url": "https://oapi.dingtalk.com/robot/send?access_token=abc" })),
            &SecretResolver::plaintext(),
        )
        .unwrap();

    notifier.dispatch(&alerting(), &CancellationToken::new()).await;

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].url,
        "https://oapi.dingtalk.com/robot/send?access_token=abc"
    );
    assert_eq!(requests[0].content_type, "application/json");
}

#[tokio::test]
async fn rendering_is_repeatable() {
    let ctx = alerting().with_tag("atMobiles", "1,2");
    assert_eq!(dispatch_body(&ctx).await, dispatch_body(&ctx).await);
}

#[tokio::test]
async fn empty_message_still_dispatches() {
    let mut ctx = EvaluationContext::new(AlertState::Alerting, "").with_rule(2, "Quiet rule");
    ctx.previous_state = AlertState::Ok;
    let body = dispatch_body(&ctx).await;
    assert_eq!(body.matches("Quiet rule").count(), 1, "{body}");
}

#[tokio::test]
async fn errcode_rejection_is_failure() {
    let transport = RecordingTransport::responding(
        200,
        r#"{"errcode":310000,"errmsg":"keywords not in content"}"#,
    );
    let notifier = registry(transport.clone(), TIMEOUT)
        .build_from(
            &settings(json!({ "url": "https://www.google.com" })),
            &SecretResolver::plaintext(),
        )
        .unwrap();

    let result = notifier.dispatch(&alerting(), &CancellationToken::new()).await;
    assert!(!result.success);
    assert!(result.detail.contains("keywords not in content"), "{}", result.detail);
}
