//! Structured JSON:API error responses.

// self
use crate::_prelude::*;

/// Single entry of a JSON:API `errors` array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
	/// Machine-readable error code.
	#[serde(default, alias = "code")]
	pub code_name: String,
	/// Human-readable summary.
	#[serde(default)]
	pub title: String,
	/// Seconds until the request may be retried, when the server says so.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub retry_after_seconds: Option<u64>,
}

#[derive(Deserialize)]
struct RawError {
	#[serde(default)]
	code_name: Option<String>,
	#[serde(default)]
	code: Option<Value>,
	#[serde(default)]
	title: Option<String>,
	#[serde(default)]
	detail: Option<String>,
	#[serde(default)]
	retry_after_seconds: Option<u64>,
	#[serde(default)]
	meta: Option<RawMeta>,
}
impl From<RawError> for RemoteError {
	fn from(raw: RawError) -> Self {
		let code_name = raw
			.code_name
			.or_else(|| {
				raw.code.map(|code| match code {
					Value::String(code) => code,
					other => other.to_string(),
				})
			})
			.unwrap_or_else(|| "unknown_error".into());
		let title = raw.title.or(raw.detail).unwrap_or_default();
		let retry_after_seconds =
			raw.retry_after_seconds.or_else(|| raw.meta.and_then(|m| m.retry_after_seconds));

		Self { code_name, title, retry_after_seconds }
	}
}

#[derive(Deserialize)]
struct RawMeta {
	#[serde(default)]
	retry_after_seconds: Option<u64>,
}

#[derive(Deserialize)]
struct RawErrorDocument {
	#[serde(default)]
	errors: Vec<RawError>,
}

/// Non-success response carrying the server's error list.
///
/// Renders as `<code_name>[<index>]: <title>` per entry, joined by `"; "`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteErrors {
	/// HTTP status code of the response.
	pub status: u16,
	/// Parsed errors in response order.
	pub errors: Vec<RemoteError>,
}
impl RemoteErrors {
	/// Parses an error response body.
	///
	/// Bodies without a JSON:API `errors` array produce a single synthetic entry named after the
	/// status code so callers always get at least one error.
	pub fn from_body(status: u16, body: &[u8]) -> Self {
		let errors = serde_json::from_slice::<RawErrorDocument>(body)
			.map(|doc| doc.errors.into_iter().map(RemoteError::from).collect::<Vec<_>>())
			.unwrap_or_default();
		let errors = if errors.is_empty() {
			vec![RemoteError {
				code_name: format!("http_{status}"),
				title: String::from_utf8_lossy(body).trim().chars().take(200).collect(),
				retry_after_seconds: None,
			}]
		} else {
			errors
		};

		Self { status, errors }
	}

	/// Returns the first retry hint reported by any error entry.
	pub fn retry_after(&self) -> Option<Duration> {
		self.errors
			.iter()
			.find_map(|e| e.retry_after_seconds)
			.map(|secs| Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)))
	}

	/// Returns `true` when any entry carries `code_name`.
	pub fn contains(&self, code_name: &str) -> bool {
		self.errors.iter().any(|e| e.code_name == code_name)
	}
}
impl Display for RemoteErrors {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		for (index, error) in self.errors.iter().enumerate() {
			if index > 0 {
				f.write_str("; ")?;
			}

			write!(f, "{}[{index}]: {}", error.code_name, error.title)?;
		}

		Ok(())
	}
}
impl StdError for RemoteErrors {}
