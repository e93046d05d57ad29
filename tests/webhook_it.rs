// crates.io
use serde::Deserialize;
// self
use oauth2_jsonapi::{
	error::Error,
	http::{HeaderMap, HeaderValue},
	oauth::oauth2::http::Request,
	webhook::{
		self, EVENT_HEADER, RawWebhookRequest, SIGNATURE_HEADER, WebhookError, WebhookOutcome,
		WebhookPayload,
	},
};

const SECRET: &str = "integration-secret";

#[derive(Debug, PartialEq, Deserialize)]
struct Shipment {
	order_id: String,
	carrier: String,
}

#[derive(Debug, PartialEq)]
enum StoreEvent {
	ShipmentCreated(Shipment),
	OrderCancelled { order_id: String },
}
impl WebhookPayload for StoreEvent {
	fn parse(trigger: &str, body: &[u8]) -> Result<Self, WebhookError> {
		#[derive(Deserialize)]
		struct Cancelled {
			order_id: String,
		}

		match trigger {
			"shipment.created" => webhook::decode_payload(trigger, body).map(Self::ShipmentCreated),
			"order.cancelled" => webhook::decode_payload::<Cancelled>(trigger, body)
				.map(|c| Self::OrderCancelled { order_id: c.order_id }),
			other => Err(WebhookError::UnknownTrigger { trigger: other.to_owned() }),
		}
	}
}

fn request(event: &str, signature: &str, body: &str) -> Request<String> {
	Request::builder()
		.method("POST")
		.uri("/hooks")
		.header(EVENT_HEADER, event)
		.header(SIGNATURE_HEADER, signature)
		.body(body.to_owned())
		.expect("Request should build.")
}

#[test]
fn verified_requests_decode_into_typed_events() {
	let body = r#"{"order_id":"A-17","carrier":"DHL"}"#;
	let signature = webhook::sign(SECRET, body.as_bytes()).expect("Signing should succeed.");
	let outcome = webhook::parse_webhook_request::<StoreEvent, _>(
		&request("shipment.created", &signature, body),
		SECRET,
	)
	.expect("Webhook should parse.");

	assert_eq!(outcome, WebhookOutcome::Verified {
		event: "shipment.created".into(),
		payload: StoreEvent::ShipmentCreated(Shipment {
			order_id: "A-17".into(),
			carrier: "DHL".into(),
		}),
	});

	let body = r#"{"order_id":"A-18"}"#;
	let signature = webhook::sign(SECRET, body.as_bytes()).expect("Signing should succeed.");
	let (_, payload) = webhook::parse_webhook_request::<StoreEvent, _>(
		&request("order.cancelled", &format!("sha256={signature}"), body),
		SECRET,
	)
	.expect("Webhook should parse.")
	.into_verified()
	.expect("Signature should verify.");

	assert_eq!(payload, StoreEvent::OrderCancelled { order_id: "A-18".into() });
}

#[test]
fn tampered_bodies_are_unverified_not_errors() {
	let signature = webhook::sign(SECRET, br#"{"order_id":"A-17","carrier":"DHL"}"#)
		.expect("Signing should succeed.");
	let outcome = webhook::parse_webhook_request::<StoreEvent, _>(
		&request("shipment.created", &signature, r#"{"order_id":"A-17","carrier":"UPS"}"#),
		SECRET,
	)
	.expect("Mismatch is a value.");

	assert!(!outcome.is_verified());
}

#[test]
fn missing_event_header_wins_over_everything_else() {
	let mut headers = HeaderMap::new();

	headers.insert(SIGNATURE_HEADER, HeaderValue::from_static("not-even-base64"));

	let err = webhook::parse_webhook_request::<StoreEvent, _>(
		&RawWebhookRequest { headers, body: b"not json".to_vec() },
		"",
	)
	.expect_err("Missing event header must fail.");

	assert!(matches!(err, Error::Webhook(WebhookError::MissingHeader(_))));
	assert_eq!(err.to_string(), "failed to get event header from request for webhooks");
}

#[test]
fn blank_secret_is_rejected_after_headers_are_present() {
	let err = webhook::parse_webhook_request::<StoreEvent, _>(
		&request("shipment.created", "sig", "{}"),
		"  ",
	)
	.expect_err("Blank secrets must fail.");

	assert!(matches!(err, Error::Webhook(WebhookError::InvalidSecret)));
}

#[test]
fn unknown_triggers_are_reported() {
	let signature = webhook::sign(SECRET, b"{}").expect("Signing should succeed.");
	let err = webhook::parse_webhook_request::<StoreEvent, _>(
		&request("refund.issued", &signature, "{}"),
		SECRET,
	)
	.expect_err("Unknown triggers must fail.");

	match err {
		Error::Webhook(WebhookError::UnknownTrigger { trigger }) =>
			assert_eq!(trigger, "refund.issued"),
		other => panic!("Unexpected error: {other:?}"),
	}
}
