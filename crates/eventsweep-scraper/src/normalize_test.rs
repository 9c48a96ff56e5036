use std::time::Duration;

use chrono::NaiveTime;
use eventsweep_core::VisionConfig;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::candidate::Confidence;
use crate::client::Document;
use crate::settings::Settings;
use crate::strategy::{ApiStrategy, Strategy};
use std::collections::BTreeMap;

fn source() -> Source {
    Source::new("urban-family", "Urban Family Brewing", "https://example.com", "json_api")
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
}

fn rules() -> DateRules {
    DateRules::new(&["%Y-%m-%d", "%m/%d"])
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn candidate(date: &str) -> RawCandidate {
    RawCandidate {
        date: Some(date.to_owned()),
        ..RawCandidate::default()
    }
}

fn vision_client(server: &MockServer) -> VisionClient {
    VisionClient::new(&VisionConfig {
        api_key: "sk-test".to_owned(),
        api_url: server.uri(),
        model: "vision-test".to_owned(),
        timeout_secs: 5,
    })
    .unwrap()
    .with_retry(2, Duration::ZERO)
}

fn reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "content": [{"type": "text", "text": text}]
    }))
}

async fn run(candidate: RawCandidate, session: &mut RecoverySession<'_>) -> Result<Event, Rejection> {
    let source = source();
    let rules = rules();
    let ctx = SourceContext {
        source: &source,
        date_rules: &rules,
        today: today(),
    };
    normalize(candidate, &ctx, session).await
}

#[test]
fn generic_names() {
    for name in ["TBD", "tba", "To Be Announced", "Unknown.", " n/a ", ""] {
        assert!(is_generic_name(name), "{name:?} should be generic");
    }
    assert!(!is_generic_name("Tbd Tacos"));
}

#[test]
fn suffix_stripping_respects_word_boundaries() {
    assert_eq!(strip_business_suffixes("Georgia's Food Truck"), "Georgia's");
    assert_eq!(strip_business_suffixes("Taco"), "Taco");
    assert_eq!(strip_business_suffixes("Cobalt Barbecue"), "Cobalt Barbecue");
    assert_eq!(strip_business_suffixes("Bar"), "Bar");
    assert_eq!(strip_business_suffixes("Dumpling Co."), "Dumpling");
    assert_eq!(strip_business_suffixes("Paseo Cafe & Co"), "Paseo");
    assert_eq!(strip_business_suffixes("Big Food Co, Inc."), "Big Food");
}

#[tokio::test]
async fn missing_date_is_rejected() {
    let mut session = RecoverySession::new(None);
    let err = run(RawCandidate::default(), &mut session).await.unwrap_err();
    assert_eq!(err, Rejection::MissingDate);
}

#[tokio::test]
async fn unparsable_date_is_rejected_not_defaulted() {
    let mut session = RecoverySession::new(None);
    let err = run(candidate("next Tuesday-ish"), &mut session)
        .await
        .unwrap_err();
    assert_eq!(err, Rejection::UnparsableDate("next Tuesday-ish".to_owned()));
}

#[tokio::test]
async fn start_time_without_end_time_stays_absent() {
    let mut c = candidate("2025-07-04");
    c.start_time = Some("5pm".to_owned());
    c.end_time = Some("whenever".to_owned());
    c.push_name("Nosh", Confidence::High);

    let mut session = RecoverySession::new(None);
    let event = run(c, &mut session).await.unwrap();
    assert_eq!(event.start_time, Some(t(17, 0)));
    assert_eq!(event.end_time, None);
}

#[tokio::test]
async fn time_range_fills_both_times() {
    let mut c = candidate("7/4");
    c.time_range = Some("1 — 8pm".to_owned());
    let mut session = RecoverySession::new(None);
    let event = run(c, &mut session).await.unwrap();
    assert_eq!(event.date, NaiveDate::from_ymd_opt(2025, 7, 4).unwrap());
    assert_eq!((event.start_time, event.end_time), (Some(t(13, 0)), Some(t(20, 0))));
}

#[tokio::test]
async fn first_non_generic_text_name_wins() {
    let mut c = candidate("2025-07-04");
    c.names.push(crate::candidate::NameField {
        text: "TBD".to_owned(),
        confidence: Confidence::High,
    });
    c.push_name("Off the Rez", Confidence::Low);
    c.location = Some("Back patio".to_owned());

    let mut session = RecoverySession::new(None);
    let event = run(c, &mut session).await.unwrap();
    assert_eq!(event.vendor_name, "Off the Rez");
    assert!(!event.name_from_image);
    assert_eq!(event.location.as_deref(), Some("Back patio"));
    assert_eq!(event.source_key, "urban-family");
    assert_eq!(event.source_name, "Urban Family Brewing");
}

#[tokio::test]
async fn no_name_and_no_image_uses_placeholder() {
    let mut session = RecoverySession::new(None);
    let event = run(candidate("2025-07-04"), &mut session).await.unwrap();
    assert_eq!(event.vendor_name, UNRESOLVED_VENDOR);
    assert!(!event.name_from_image);
}

#[tokio::test]
async fn image_recovery_success_strips_suffix_and_sets_flag() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(reply("Georgia's Food Truck"))
        .expect(1)
        .mount(&server)
        .await;

    let client = vision_client(&server);
    let mut session = RecoverySession::new(Some(&client));
    let mut c = candidate("2025-07-04");
    c.image_ref = Some("https://cdn.example.com/trucks/georgias.jpg".to_owned());

    let event = run(c, &mut session).await.unwrap();
    assert_eq!(event.vendor_name, "Georgia's");
    assert!(event.name_from_image);
}

#[tokio::test]
async fn image_recovery_unknown_falls_back_to_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(reply("UNKNOWN"))
        .expect(1)
        .mount(&server)
        .await;

    let client = vision_client(&server);
    let mut session = RecoverySession::new(Some(&client));
    let mut c = candidate("2025-07-04");
    c.image_ref = Some("https://cdn.example.com/trucks/blurry.png".to_owned());

    let event = run(c, &mut session).await.unwrap();
    assert_eq!(event.vendor_name, UNRESOLVED_VENDOR);
    assert!(!event.name_from_image);
}

#[tokio::test]
async fn text_name_skips_image_recovery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(reply("Should Not Be Used"))
        .expect(0)
        .mount(&server)
        .await;

    let client = vision_client(&server);
    let mut session = RecoverySession::new(Some(&client));
    let mut c = candidate("2025-07-04");
    c.push_name("Marination", Confidence::High);
    c.image_ref = Some("https://cdn.example.com/marination.jpg".to_owned());

    let event = run(c, &mut session).await.unwrap();
    assert_eq!(event.vendor_name, "Marination");
    assert!(!event.name_from_image);
}

#[tokio::test]
async fn repeated_image_ref_is_analyzed_once_per_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(reply("Paseo"))
        .expect(1)
        .mount(&server)
        .await;

    let client = vision_client(&server);
    let mut session = RecoverySession::new(Some(&client));
    for day in ["2025-07-04", "2025-07-05"] {
        let mut c = candidate(day);
        c.image_ref = Some("https://media.example.com/paseo".to_owned());
        let event = run(c, &mut session).await.unwrap();
        assert_eq!(event.vendor_name, "Paseo");
        assert!(event.name_from_image);
    }
}

#[tokio::test]
async fn timeouts_are_retried_twice_then_give_up() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(504))
        .expect(3)
        .mount(&server)
        .await;

    let client = vision_client(&server);
    assert_eq!(
        client
            .recover("https://cdn.example.com/trucks/slow.jpg")
            .await,
        None
    );
}

#[tokio::test]
async fn authorization_failure_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = vision_client(&server);
    assert_eq!(
        client
            .recover("https://cdn.example.com/trucks/any.jpg")
            .await,
        None
    );
}

#[tokio::test]
async fn implausible_reference_makes_no_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(reply("Paseo"))
        .expect(0)
        .mount(&server)
        .await;

    let client = vision_client(&server);
    let mut session = RecoverySession::new(Some(&client));
    let mut c = candidate("2025-07-04");
    c.image_ref = Some("https://example.com/about-us".to_owned());
    let event = run(c, &mut session).await.unwrap();
    assert_eq!(event.vendor_name, UNRESOLVED_VENDOR);
}

#[tokio::test]
async fn api_timestamps_are_read_in_the_source_zone() {
    let map: BTreeMap<String, serde_json::Value> = serde_json::from_value(json!({
        "date_field": "start_time",
        "timezone": "America/Los_Angeles"
    }))
    .unwrap();
    let strategy = Strategy::Api(ApiStrategy::from_settings(&Settings::new(&map)).unwrap());
    let body = json!([
        {"name": "Marination", "start_time": "2025-08-02T00:00:00.000Z"},
        {"name": "Paseo", "start_time": "2025-08-01T17:00:00-07:00"}
    ]);
    let document = Document::new(
        "https://api.example.com/events",
        Some("application/json"),
        &body.to_string(),
    );

    let source = source();
    let ctx = SourceContext {
        source: &source,
        date_rules: strategy.date_rules(),
        today: today(),
    };
    let mut session = RecoverySession::new(None);
    for candidate in strategy.extract(&document).unwrap() {
        let event = normalize(candidate, &ctx, &mut session).await.unwrap();
        assert_eq!(event.date, NaiveDate::from_ymd_opt(2025, 8, 1).unwrap());
        assert_eq!(event.start_time, Some(t(17, 0)), "{}", event.vendor_name);
    }
}
