// crates.io
use futures::{Stream, stream};
// self
use super::{Client, Query};
use crate::{_prelude::*, http::HttpClient, jsonapi::Document};

/// Lazy walk over a collection's `next` links.
///
/// Each [`Paginator::next_page`] call issues at most one request. The cursor only advances
/// after a page arrives, so a failed or cancelled call can simply be retried. Calling
/// [`Client::paginate`] again restarts from the first page.
pub struct Paginator<'a, C>
where
	C: HttpClient,
{
	client: &'a Client<C>,
	cursor: Option<Query>,
	pages: usize,
}
impl<'a, C> Paginator<'a, C>
where
	C: HttpClient,
{
	pub(super) fn new(client: &'a Client<C>, query: Query) -> Self {
		Self { client, cursor: Some(query), pages: 0 }
	}

	/// Fetches the next page; `None` once the last page has been returned.
	///
	/// A tolerated throttle also yields `None` but keeps the cursor, so a later call resumes.
	pub async fn next_page(&mut self) -> Result<Option<Document>> {
		let Some(query) = self.cursor.as_ref() else { return Ok(None) };
		let Some(document) = self.client.get(query).await? else { return Ok(None) };

		self.cursor = document.next_link().map(Query::new);
		self.pages += 1;

		#[cfg(feature = "tracing")]
		tracing::debug!(pages = self.pages, has_next = self.cursor.is_some(), "page fetched");

		Ok(Some(document))
	}

	/// Returns `true` once the last page has been returned.
	pub fn is_exhausted(&self) -> bool {
		self.cursor.is_none()
	}

	/// Number of pages returned so far.
	pub fn pages_fetched(&self) -> usize {
		self.pages
	}

	/// Converts the paginator into a stream of pages that ends after the last page or the
	/// first error.
	///
	/// A throttled page that [`next_page`](Self::next_page) would tolerate as `None` ends the
	/// stream with [`Error::RateLimited`] instead, so a collection is never cut short silently.
	pub fn into_stream(self) -> impl Stream<Item = Result<Document>> + 'a {
		stream::try_unfold(self, |mut pager| async move {
			match pager.next_page().await? {
				Some(document) => Ok(Some((document, pager))),
				None if pager.is_exhausted() => Ok(None),
				None => Err(pager.throttled()),
			}
		})
	}

	fn throttled(&self) -> Error {
		let retry_after = self
			.client
			.rate_limiter()
			.cooldown_remaining_at(OffsetDateTime::now_utc())
			.unwrap_or(Duration::ZERO);

		Error::RateLimited { retry_after }
	}
}
impl<C> Debug for Paginator<'_, C>
where
	C: HttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Paginator")
			.field("cursor", &self.cursor)
			.field("pages", &self.pages)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use futures::TryStreamExt;
	// self
	use super::*;
	use crate::{
		_preludet::*,
		config::{ApiDescriptor, ClientCredentials, ThrottleFallback},
	};

	fn page(ids: &[&str], next: Option<&str>) -> ScriptedResponse {
		let data: Vec<_> =
			ids.iter().map(|id| serde_json::json!({ "type": "articles", "id": id })).collect();
		let links = next.map_or(Value::Null, |next| serde_json::json!({ "next": next }));

		ScriptedResponse::json(200, serde_json::json!({ "data": data, "links": links }).to_string())
	}

	async fn client(http: &ScriptedHttpClient) -> Client<ScriptedHttpClient> {
		Client::builder(test_descriptor(), http.clone())
			.credentials(ClientCredentials::new("client-id"))
			.initial_token(token_expiring_in("stored", None, Duration::hours(1)))
			.build()
			.await
			.expect("Client should build.")
	}

	#[tokio::test]
	async fn follows_next_links_one_request_per_page() {
		let http = ScriptedHttpClient::new([
			page(&["1", "2"], Some("https://api.example.com/articles?page=2")),
			page(&["3"], None),
		]);
		let client = client(&http).await;
		let mut pager = client.paginate(Query::new("articles").page_size(2));
		let first = pager.next_page().await.expect("First page.").expect("First page exists.");

		assert_eq!(first.primary().count(), 2);
		assert_eq!(http.request_count(), 1);
		assert!(!pager.is_exhausted());

		let second = pager.next_page().await.expect("Second page.").expect("Second page exists.");

		assert_eq!(second.primary().count(), 1);
		assert!(pager.is_exhausted());
		assert_eq!(pager.next_page().await.expect("Exhausted pager."), None);
		assert_eq!(http.request_count(), 2);
		assert_eq!(pager.pages_fetched(), 2);
		assert_eq!(http.requests()[1].uri().to_string(), "https://api.example.com/articles?page=2");
	}

	#[tokio::test]
	async fn failed_pages_can_be_retried() {
		let http = ScriptedHttpClient::new([
			page(&["1"], Some("https://api.example.com/articles?cursor=b")),
			ScriptedResponse::json(500, r#"{"errors":[{"code":"boom","title":"Server fell over"}]}"#),
			page(&["2"], None),
		]);
		let client = client(&http).await;
		let mut pager = client.paginate(Query::new("articles"));

		pager.next_page().await.expect("First page.");

		let err = pager.next_page().await.expect_err("Server errors must surface.");

		assert!(matches!(err, Error::Remote(_)));

		let retried = pager.next_page().await.expect("Retry.").expect("Second page exists.");

		assert_eq!(retried.primary().next().and_then(|r| r.id.as_deref()), Some("2"));
		assert_eq!(http.requests()[1].uri(), http.requests()[2].uri());
	}

	#[tokio::test]
	async fn streams_every_page() {
		let http = ScriptedHttpClient::new([
			page(&["1"], Some("https://api.example.com/articles?cursor=b")),
			page(&["2"], Some("https://api.example.com/articles?cursor=c")),
			page(&["3"], None),
		]);
		let client = client(&http).await;
		let pages: Vec<Document> = client
			.paginate(Query::new("articles"))
			.into_stream()
			.try_collect()
			.await
			.expect("Every page should load.");
		let ids: Vec<_> =
			pages.iter().flat_map(Document::primary).filter_map(|r| r.id.clone()).collect();

		assert_eq!(ids, ["1", "2", "3"]);
	}

	#[tokio::test]
	async fn tolerated_throttle_mid_collection_fails_the_stream() {
		let http = ScriptedHttpClient::new([
			page(&["1"], Some("https://api.example.com/articles?cursor=b")),
			ScriptedResponse::json(429, r#"{"errors":[]}"#).with_header("retry-after", "40"),
		]);
		let descriptor = ApiDescriptor {
			throttle_fallback: ThrottleFallback::EmptyOnFirst,
			..test_descriptor()
		};
		let client = Client::builder(descriptor, http.clone())
			.credentials(ClientCredentials::new("client-id"))
			.initial_token(token_expiring_in("stored", None, Duration::hours(1)))
			.build()
			.await
			.expect("Client should build.");
		let mut pages = Box::pin(client.paginate(Query::new("articles")).into_stream());
		let first = pages.try_next().await.expect("First page.").expect("First page exists.");

		assert_eq!(first.primary().count(), 1);

		match pages.try_next().await {
			Err(Error::RateLimited { retry_after }) => {
				assert!(retry_after > Duration::seconds(35));
				assert!(retry_after <= Duration::seconds(40));
			},
			other => panic!("Unexpected result: {other:?}"),
		}

		assert_eq!(http.request_count(), 2);
	}
}
