//! Verifies and decodes a signed webhook delivery the way an HTTP handler would.

// crates.io
use color_eyre::Result;
use serde::Deserialize;
// self
use oauth2_jsonapi::{
	http::{HeaderMap, HeaderValue},
	webhook::{
		self, EVENT_HEADER, RawWebhookRequest, SIGNATURE_HEADER, WebhookError, WebhookOutcome,
		WebhookPayload,
	},
};

#[derive(Debug, Deserialize)]
struct InvoicePaid {
	invoice_id: String,
	amount_cents: u64,
}

#[derive(Debug)]
enum Event {
	InvoicePaid(InvoicePaid),
}
impl WebhookPayload for Event {
	fn parse(trigger: &str, body: &[u8]) -> Result<Self, WebhookError> {
		match trigger {
			"invoice.paid" => webhook::decode_payload(trigger, body).map(Self::InvoicePaid),
			other => Err(WebhookError::UnknownTrigger { trigger: other.to_owned() }),
		}
	}
}

fn delivery(secret: &str, body: &str, tamper: bool) -> Result<RawWebhookRequest> {
	let mut headers = HeaderMap::new();
	let signature = webhook::sign(secret, body.as_bytes())?;
	let body = if tamper { body.replace("4200", "1") } else { body.to_owned() };

	headers.insert(EVENT_HEADER, HeaderValue::from_static("invoice.paid"));
	headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&format!("sha256={signature}"))?);

	Ok(RawWebhookRequest { headers, body: body.into_bytes() })
}

fn main() -> Result<()> {
	color_eyre::install()?;

	let secret = "whsec_demo";
	let body = r#"{"invoice_id":"inv_42","amount_cents":4200}"#;

	for tamper in [false, true] {
		let request = delivery(secret, body, tamper)?;

		match webhook::parse_webhook_request::<Event, _>(&request, secret)? {
			WebhookOutcome::Verified { event, payload: Event::InvoicePaid(paid) } => println!(
				"Accepted {event}: invoice {} for {} cents.",
				paid.invoice_id, paid.amount_cents
			),
			WebhookOutcome::Unverified => println!("Rejected delivery with a bad signature."),
		}
	}

	Ok(())
}
