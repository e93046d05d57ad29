//! Immutable OAuth token record, staleness checks, and the builder used by stores and the
//! refresh flow.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Errors produced by [`TokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// Issued when the relative expiry is negative.
	#[error("The expires_in value must not be negative.")]
	NegativeExpiresIn,
	/// Issued when the expiry instant falls outside the representable calendar.
	#[error("The expiry instant is out of range.")]
	ExpiryOutOfRange,
}

/// OAuth 2.0 credential pair with expiry metadata.
///
/// Tokens are replaced wholesale on refresh; nothing mutates a token in place.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
	/// Bearer credential attached to API requests.
	pub access_token: TokenSecret,
	/// Credential exchanged for a new access token, when the server issued one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Token type announced by the token endpoint (normally `Bearer`).
	#[serde(default = "default_token_type")]
	pub token_type: String,
	/// Lifetime in seconds as announced by the token endpoint.
	pub expires_in: u64,
	/// Absolute expiry, serialized as unix seconds.
	#[serde(with = "time::serde::timestamp")]
	pub expires_in_epoch: OffsetDateTime,
}
impl Token {
	/// Returns a builder for assembling tokens.
	pub fn builder() -> TokenBuilder {
		TokenBuilder::default()
	}

	/// Returns `true` once `instant` reaches the absolute expiry.
	pub fn is_stale_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_in_epoch
	}

	/// Checks staleness against the current UTC clock.
	pub fn is_stale(&self) -> bool {
		self.is_stale_at(OffsetDateTime::now_utc())
	}

	/// Time left before the token goes stale, clamped at zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_in_epoch - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}

	/// Builds the `Authorization` header value.
	pub fn authorization_header(&self) -> String {
		let scheme = if self.token_type.eq_ignore_ascii_case("bearer") || self.token_type.is_empty()
		{
			"Bearer"
		} else {
			self.token_type.as_str()
		};

		format!("{scheme} {}", self.access_token.expose())
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Token")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("token_type", &self.token_type)
			.field("expires_in", &self.expires_in)
			.field("expires_in_epoch", &self.expires_in_epoch)
			.finish()
	}
}

fn default_token_type() -> String {
	"Bearer".into()
}

/// Builder for [`Token`].
#[derive(Clone, Debug, Default)]
pub struct TokenBuilder {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	token_type: Option<String>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl TokenBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Overrides the token type (defaults to `Bearer`).
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Sets the instant the lifetime is measured from (defaults to now).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative lifetime measured from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Consumes the builder and produces a [`Token`].
	pub fn build(self) -> Result<Token, TokenBuilderError> {
		let access_token = self.access_token.ok_or(TokenBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let (expires_in_epoch, lifetime) = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => (instant, instant - issued_at),
			(None, Some(delta)) => {
				if delta.is_negative() {
					return Err(TokenBuilderError::NegativeExpiresIn);
				}

				let instant =
					issued_at.checked_add(delta).ok_or(TokenBuilderError::ExpiryOutOfRange)?;

				(instant, delta)
			},
			(None, None) => return Err(TokenBuilderError::MissingExpiry),
		};
		let expires_in = u64::try_from(lifetime.whole_seconds()).unwrap_or(0);
		// Stored tokens keep whole seconds only.
		let expires_in_epoch =
			expires_in_epoch - Duration::nanoseconds(i64::from(expires_in_epoch.nanosecond()));

		Ok(Token {
			access_token,
			refresh_token: self.refresh_token,
			token_type: self.token_type.unwrap_or_else(default_token_type),
			expires_in,
			expires_in_epoch,
		})
	}
}
