//! Signed webhook verification and parsing.
//!
//! A webhook request carries the trigger name in [`EVENT_HEADER`], a base64 HMAC-SHA256 of the
//! raw body in [`SIGNATURE_HEADER`], and a JSON body. [`parse_webhook_request`] checks header
//! presence before any cryptography, treats a signature mismatch as an ordinary
//! [`WebhookOutcome::Unverified`] value, and only then decodes the payload.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
// self
use crate::{
	_prelude::*,
	http::HeaderMap,
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
};

type HmacSha256 = Hmac<Sha256>;

/// Header naming the event trigger.
pub const EVENT_HEADER: &str = "x-webhook-event";
/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

const SIGNATURE_PREFIX: &str = "sha256=";
const DIGEST_LEN: usize = 32;

/// Structurally invalid webhook input.
#[derive(Debug, ThisError)]
pub enum WebhookError {
	/// The shared secret is empty or whitespace.
	#[error("Webhook secret must be a non-empty string.")]
	InvalidSecret,
	/// A required header is absent.
	#[error("{0}")]
	MissingHeader(String),
	/// The signature did not match; produced by [`WebhookOutcome::into_verified`].
	#[error("Webhook signature does not match the request body.")]
	InvalidSignature,
	/// The payload type does not handle the declared trigger.
	#[error("Webhook trigger `{trigger}` is not recognized.")]
	UnknownTrigger {
		/// Declared trigger.
		trigger: String,
	},
	/// The body does not match the payload shape for its trigger.
	#[error("Webhook payload for `{trigger}` is malformed.")]
	InvalidPayload {
		/// Declared trigger.
		trigger: String,
		/// Decoding failure including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}

/// Read access to an inbound request, independent of the server framework.
pub trait WebhookRequest {
	/// Looks up a header value case-insensitively.
	fn header(&self, name: &str) -> Option<&str>;

	/// Returns the raw, unparsed body.
	fn body(&self) -> &[u8];
}
impl<B> WebhookRequest for oauth2::http::Request<B>
where
	B: AsRef<[u8]>,
{
	fn header(&self, name: &str) -> Option<&str> {
		self.headers().get(name).and_then(|value| value.to_str().ok())
	}

	fn body(&self) -> &[u8] {
		self.body().as_ref()
	}
}

/// Framework-free request: a header map plus the raw body.
#[derive(Clone, Debug, Default)]
pub struct RawWebhookRequest {
	/// Request headers.
	pub headers: HeaderMap,
	/// Raw body bytes.
	pub body: Vec<u8>,
}
impl WebhookRequest for RawWebhookRequest {
	fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}

	fn body(&self) -> &[u8] {
		&self.body
	}
}

/// Per-request view over the fields that matter for verification.
#[derive(Clone, Copy, Debug)]
pub struct WebhookEnvelope<'a> {
	/// Declared trigger.
	pub trigger: &'a str,
	/// Raw body.
	pub raw_body: &'a [u8],
	/// Signature header value.
	pub signature_header: &'a str,
}
impl<'a> WebhookEnvelope<'a> {
	/// Extracts the envelope; the event header is checked before the signature header.
	pub fn from_request<R>(request: &'a R) -> Result<Self, WebhookError>
	where
		R: ?Sized + WebhookRequest,
	{
		let trigger = request.header(EVENT_HEADER).ok_or_else(|| {
			WebhookError::MissingHeader(
				"failed to get event header from request for webhooks".into(),
			)
		})?;
		let signature_header = request.header(SIGNATURE_HEADER).ok_or_else(|| {
			WebhookError::MissingHeader(
				"failed to get signature header from request for webhooks".into(),
			)
		})?;

		Ok(Self { trigger, raw_body: request.body(), signature_header })
	}
}

/// Typed payload selected by the trigger name.
pub trait WebhookPayload
where
	Self: Sized,
{
	/// Decodes `body` for `trigger`.
	fn parse(trigger: &str, body: &[u8]) -> Result<Self, WebhookError>;
}
impl WebhookPayload for Value {
	fn parse(trigger: &str, body: &[u8]) -> Result<Self, WebhookError> {
		decode_payload(trigger, body)
	}
}

/// Result of [`parse_webhook_request`].
#[derive(Clone, Debug, PartialEq)]
pub enum WebhookOutcome<P> {
	/// Signature matched and the payload decoded.
	Verified {
		/// Declared trigger.
		event: String,
		/// Decoded payload.
		payload: P,
	},
	/// Signature did not match; nothing was decoded.
	Unverified,
}
impl<P> WebhookOutcome<P> {
	/// Returns `true` for [`WebhookOutcome::Verified`].
	pub fn is_verified(&self) -> bool {
		matches!(self, Self::Verified { .. })
	}

	/// Converts a mismatch into [`WebhookError::InvalidSignature`].
	pub fn into_verified(self) -> Result<(String, P), WebhookError> {
		match self {
			Self::Verified { event, payload } => Ok((event, payload)),
			Self::Unverified => Err(WebhookError::InvalidSignature),
		}
	}
}

/// Decodes a JSON body, reporting the JSON path of any mismatch.
///
/// Helper for [`WebhookPayload`] implementations.
pub fn decode_payload<T>(trigger: &str, body: &[u8]) -> Result<T, WebhookError>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| WebhookError::InvalidPayload { trigger: trigger.to_owned(), source })
}

/// Produces the signature header value for `body`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String, WebhookError> {
	let mac = keyed_mac(secret)?.chain_update(body);

	Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Checks `signature_header` against the HMAC of `raw_body`.
///
/// Undecodable or wrong-length signatures are `Ok(false)`; the digest comparison itself is
/// constant-time.
pub fn verify(secret: &str, signature_header: &str, raw_body: &[u8]) -> Result<bool, WebhookError> {
	let mac = keyed_mac(secret)?.chain_update(raw_body);
	let encoded = signature_header.trim();
	let encoded = encoded.strip_prefix(SIGNATURE_PREFIX).unwrap_or(encoded);
	let Ok(expected) = STANDARD.decode(encoded) else {
		return Ok(false);
	};

	if expected.len() != DIGEST_LEN {
		return Ok(false);
	}

	Ok(mac.verify_slice(&expected).is_ok())
}

/// Verifies and decodes an inbound webhook.
pub fn parse_webhook_request<P, R>(request: &R, secret: &str) -> Result<WebhookOutcome<P>>
where
	P: WebhookPayload,
	R: ?Sized + WebhookRequest,
{
	const KIND: OperationKind = OperationKind::Webhook;

	let _span = OperationSpan::new(KIND, "parse_webhook_request").entered();

	obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

	let result = verify_and_decode(request, secret).map_err(Error::from);

	obs::record_result(KIND, result)
}

fn verify_and_decode<P, R>(request: &R, secret: &str) -> Result<WebhookOutcome<P>, WebhookError>
where
	P: WebhookPayload,
	R: ?Sized + WebhookRequest,
{
	let envelope = WebhookEnvelope::from_request(request)?;

	if !verify(secret, envelope.signature_header, envelope.raw_body)? {
		#[cfg(feature = "tracing")]
		tracing::warn!(trigger = envelope.trigger, "webhook signature mismatch");

		return Ok(WebhookOutcome::Unverified);
	}

	let payload = P::parse(envelope.trigger, envelope.raw_body)?;

	Ok(WebhookOutcome::Verified { event: envelope.trigger.to_owned(), payload })
}

fn keyed_mac(secret: &str) -> Result<HmacSha256, WebhookError> {
	if secret.trim().is_empty() {
		return Err(WebhookError::InvalidSecret);
	}

	HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::InvalidSecret)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::http::HeaderValue;

	const SECRET: &str = "whsec_test";

	fn raw_request(event: Option<&str>, signature: Option<&str>, body: &str) -> RawWebhookRequest {
		let mut headers = HeaderMap::new();

		if let Some(event) = event {
			headers
				.insert(EVENT_HEADER, HeaderValue::from_str(event).expect("Header should parse."));
		}
		if let Some(signature) = signature {
			headers.insert(
				SIGNATURE_HEADER,
				HeaderValue::from_str(signature).expect("Header should parse."),
			);
		}

		RawWebhookRequest { headers, body: body.as_bytes().to_vec() }
	}

	#[test]
	fn signatures_round_trip_and_reject_tampering() {
		let signature = sign(SECRET, b"payload-a").expect("Signing should succeed.");

		assert_eq!(verify(SECRET, &signature, b"payload-a").ok(), Some(true));
		assert_eq!(verify(SECRET, &signature, b"payload-b").ok(), Some(false));
		assert_eq!(verify(SECRET, &format!("sha256={signature}"), b"payload-a").ok(), Some(true));
		assert_eq!(verify("other-secret", &signature, b"payload-a").ok(), Some(false));
	}

	#[test]
	fn malformed_signatures_are_false_not_errors() {
		assert_eq!(verify(SECRET, "", b"body").ok(), Some(false));
		assert_eq!(verify(SECRET, "not base64 at all!", b"body").ok(), Some(false));
		assert_eq!(verify(SECRET, &STANDARD.encode([0_u8; 16]), b"body").ok(), Some(false));
	}

	#[test]
	fn blank_secrets_are_rejected() {
		assert!(matches!(verify("", "sig", b"body"), Err(WebhookError::InvalidSecret)));
		assert!(matches!(sign("   ", b"body"), Err(WebhookError::InvalidSecret)));
	}

	#[test]
	fn event_header_is_checked_before_signature() {
		let body = r#"{"id":"1"}"#;
		let good = sign(SECRET, body.as_bytes()).expect("Signing should succeed.");

		for signature in [Some(good.as_str()), Some("bogus"), None] {
			let err = parse_webhook_request::<Value, _>(&raw_request(None, signature, body), SECRET)
				.expect_err("Missing event header must fail.");

			assert_eq!(err.to_string(), "failed to get event header from request for webhooks");
		}

		let err = parse_webhook_request::<Value, _>(
			&raw_request(Some("order.created"), None, body),
			SECRET,
		)
		.expect_err("Missing signature header must fail.");

		assert_eq!(err.to_string(), "failed to get signature header from request for webhooks");
	}

	#[test]
	fn mismatch_is_unverified_and_match_decodes() {
		let body = r#"{"id":"1","total":42}"#;
		let good = sign(SECRET, body.as_bytes()).expect("Signing should succeed.");
		let bad = sign(SECRET, b"other").expect("Signing should succeed.");
		let outcome = parse_webhook_request::<Value, _>(
			&raw_request(Some("order.created"), Some(&bad), body),
			SECRET,
		)
		.expect("Mismatch must not be an error.");

		assert_eq!(outcome, WebhookOutcome::Unverified);
		assert!(matches!(outcome.into_verified(), Err(WebhookError::InvalidSignature)));

		let request = oauth2::http::Request::builder()
			.header("X-Webhook-Event", "order.created")
			.header("X-Webhook-Signature", good)
			.body(body.as_bytes().to_vec())
			.expect("Request should build.");
		let (event, payload) = parse_webhook_request::<Value, _>(&request, SECRET)
			.expect("Valid webhook should parse.")
			.into_verified()
			.expect("Signature should verify.");

		assert_eq!(event, "order.created");
		assert_eq!(payload["total"], 42);
	}

	#[test]
	fn invalid_payload_reports_path() {
		#[derive(Debug, Deserialize)]
		struct Order {
			#[allow(dead_code)]
			total: u64,
		}
		impl WebhookPayload for Order {
			fn parse(trigger: &str, body: &[u8]) -> Result<Self, WebhookError> {
				match trigger {
					"order.created" => decode_payload(trigger, body),
					other => Err(WebhookError::UnknownTrigger { trigger: other.to_owned() }),
				}
			}
		}

		let body = r#"{"total":"lots"}"#;
		let signature = sign(SECRET, body.as_bytes()).expect("Signing should succeed.");
		let err = parse_webhook_request::<Order, _>(
			&raw_request(Some("order.created"), Some(&signature), body),
			SECRET,
		)
		.expect_err("Wrong payload shape must fail.");

		match err {
			Error::Webhook(WebhookError::InvalidPayload { source, .. }) =>
				assert_eq!(source.path().to_string(), "total"),
			other => panic!("Unexpected error: {other:?}"),
		}

		let err = parse_webhook_request::<Order, _>(
			&raw_request(Some("order.deleted"), Some(&signature), body),
			SECRET,
		)
		.expect_err("Unknown triggers must fail.");

		assert!(matches!(err, Error::Webhook(WebhookError::UnknownTrigger { .. })));
	}
}
