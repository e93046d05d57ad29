//! Composition root: wires the token manager, transport, and optional resource cache into
//! resource-level helpers.

mod pagination;

pub use pagination::Paginator;

// self
use crate::{
	_prelude::*,
	auth::Token,
	cache::{AbsorbMode, ResourceCache},
	config::{ApiDescriptor, ClientCredentials},
	error::ConfigError,
	http::{HttpClient, Method},
	jsonapi::{Document, Resource},
	oauth::TokenEndpoint,
	rate_limit::RateLimiter,
	rest::{RequestOptions, RestTransport},
	session::TokenManager,
	store::{KvTokenStore, MemoryKv, TokenStore},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestApiClient = Client<ReqwestHttpClient>;

/// Opaque request descriptor: a path plus query pairs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
	path: String,
	params: Vec<(String, String)>,
}
impl Query {
	/// Targets `path`, relative to the base URL or an absolute same-origin URL.
	pub fn new(path: impl Into<String>) -> Self {
		Self { path: path.into(), params: Vec::new() }
	}

	/// Appends a raw query pair.
	pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.params.push((key.into(), value.into()));

		self
	}

	/// Adds `filter[field]=value`.
	pub fn filter(self, field: &str, value: impl Into<String>) -> Self {
		self.param(format!("filter[{field}]"), value)
	}

	/// Adds `include=a,b`.
	pub fn include<I, S>(self, relationships: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		self.param("include", join(relationships))
	}

	/// Adds a sparse fieldset, `fields[type]=a,b`.
	pub fn fields<I, S>(self, resource_type: &str, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		self.param(format!("fields[{resource_type}]"), join(fields))
	}

	/// Adds `sort=...`.
	pub fn sort(self, sort: impl Into<String>) -> Self {
		self.param("sort", sort)
	}

	/// Adds `page[size]=n`.
	pub fn page_size(self, size: u32) -> Self {
		self.param("page[size]", size.to_string())
	}

	/// Returns the target path.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Returns the query pairs in insertion order.
	pub fn params(&self) -> &[(String, String)] {
		&self.params
	}
}

/// Collects the pieces a [`Client`] is built from.
pub struct ClientBuilder<C>
where
	C: HttpClient,
{
	descriptor: ApiDescriptor,
	http_client: Arc<C>,
	credentials: Option<ClientCredentials>,
	store: Option<Arc<dyn TokenStore>>,
	initial_token: Option<Token>,
	cache: Option<ResourceCache>,
}
impl<C> ClientBuilder<C>
where
	C: HttpClient,
{
	/// Starts a builder over an injected HTTP client.
	pub fn new(descriptor: ApiDescriptor, http_client: impl Into<Arc<C>>) -> Self {
		Self {
			descriptor,
			http_client: http_client.into(),
			credentials: None,
			store: None,
			initial_token: None,
			cache: None,
		}
	}

	/// Client identity for the token endpoint; without it stale tokens cannot be refreshed.
	pub fn credentials(mut self, credentials: ClientCredentials) -> Self {
		self.credentials = Some(credentials);

		self
	}

	/// Token store; defaults to an in-memory KV store.
	pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
		self.store = Some(store);

		self
	}

	/// Token written to the store during [`ClientBuilder::build`].
	pub fn initial_token(mut self, token: Token) -> Self {
		self.initial_token = Some(token);

		self
	}

	/// Mirrors responses into `cache`.
	pub fn cache(mut self, cache: ResourceCache) -> Self {
		self.cache = Some(cache);

		self
	}

	/// Validates the descriptor, seeds the token store, and assembles the client.
	pub async fn build(self) -> Result<Client<C>> {
		let Self { descriptor, http_client, credentials, store, initial_token, cache } = self;

		descriptor.validate().map_err(ConfigError::from)?;

		let store = store.unwrap_or_else(|| Arc::new(KvTokenStore::new(MemoryKv::default())));

		if let Some(token) = initial_token {
			store.put(token).await?;
		}

		let endpoint = credentials
			.map(|credentials| {
				TokenEndpoint::<C>::from_descriptor(&descriptor, &credentials, http_client.clone())
			})
			.transpose()?;
		let tokens = Arc::new(TokenManager::new(store, endpoint));
		let transport = RestTransport::new(&descriptor, http_client, tokens)?;

		Ok(Client { descriptor, transport, cache: cache.map(Arc::new) })
	}
}
#[cfg(feature = "reqwest")]
impl ClientBuilder<ReqwestHttpClient> {
	/// Starts a builder backed by a reqwest client that never follows redirects.
	pub fn with_reqwest(descriptor: ApiDescriptor) -> Result<Self> {
		Ok(Self::new(descriptor, ReqwestHttpClient::new()?))
	}
}
impl<C> Debug for ClientBuilder<C>
where
	C: HttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientBuilder")
			.field("descriptor", &self.descriptor)
			.field("credentials_set", &self.credentials.is_some())
			.field("initial_token_set", &self.initial_token.is_some())
			.finish_non_exhaustive()
	}
}

/// Resource-level API over one JSON:API service.
///
/// Every call goes through the shared [`RestTransport`], so rate limiting and token refresh
/// apply uniformly. When a cache is attached, successful responses are mirrored into it:
/// reads upsert, mutations follow the cache's `put` rule, and deletes drop the addressed key.
pub struct Client<C>
where
	C: HttpClient,
{
	descriptor: ApiDescriptor,
	transport: RestTransport<C>,
	cache: Option<Arc<ResourceCache>>,
}
impl<C> Client<C>
where
	C: HttpClient,
{
	/// Shorthand for [`ClientBuilder::new`].
	pub fn builder(descriptor: ApiDescriptor, http_client: impl Into<Arc<C>>) -> ClientBuilder<C> {
		ClientBuilder::new(descriptor, http_client)
	}

	/// Returns the descriptor the client was built from.
	pub fn descriptor(&self) -> &ApiDescriptor {
		&self.descriptor
	}

	/// Returns the underlying transport.
	pub fn transport(&self) -> &RestTransport<C> {
		&self.transport
	}

	/// Returns the shared rate limiter.
	pub fn rate_limiter(&self) -> &RateLimiter {
		self.transport.rate_limiter()
	}

	/// Returns the token manager.
	pub fn tokens(&self) -> &Arc<TokenManager<C>> {
		self.transport.tokens()
	}

	/// Returns the attached cache.
	pub fn cache(&self) -> Option<&Arc<ResourceCache>> {
		self.cache.as_ref()
	}

	/// Sends a raw request and mirrors the response into the cache.
	pub async fn request(
		&self,
		method: Method,
		path: &str,
		options: RequestOptions,
	) -> Result<Option<Value>> {
		let value = self.transport.request(method.clone(), path, options).await?;

		if self.cache.is_some() {
			let document = value.as_ref().and_then(|value| {
				Document::from_value(value.clone())
					.inspect_err(|_e| {
						#[cfg(feature = "tracing")]
						tracing::debug!(path, error = %_e, "response is not a JSON:API document");
					})
					.ok()
			});

			self.mirror(&method, path, document.as_ref()).await?;
		}

		Ok(value)
	}

	/// Reads a document; `None` for empty bodies or a tolerated throttle.
	pub async fn get(&self, query: &Query) -> Result<Option<Document>> {
		let Some(value) = self.transport.request(Method::GET, &query.path, options(query)).await?
		else {
			return Ok(None);
		};
		let document = Document::from_value(value)
			.map_err(|source| Error::MalformedResponse { source, status: None })?;

		self.mirror(&Method::GET, &query.path, Some(&document)).await?;

		Ok(Some(document))
	}

	/// Reads and decodes the response into `T`, reporting the JSON path of any mismatch.
	pub async fn fetch<T>(&self, query: &Query) -> Result<Option<T>>
	where
		T: DeserializeOwned,
	{
		let Some(value) = self.request(Method::GET, &query.path, options(query)).await? else {
			return Ok(None);
		};

		serde_path_to_error::deserialize(value)
			.map(Some)
			.map_err(|source| Error::MalformedResponse { source, status: None })
	}

	/// Creates `resource` under `path`.
	pub async fn create(&self, path: &str, resource: &Resource) -> Result<Option<Document>> {
		self.mutate(Method::POST, path, resource).await
	}

	/// Updates `resource` at `path`.
	pub async fn update(&self, path: &str, resource: &Resource) -> Result<Option<Document>> {
		self.mutate(Method::PATCH, path, resource).await
	}

	/// Deletes the resource at `path` (`.../{type}/{id}`).
	pub async fn delete(&self, path: &str) -> Result<()> {
		self.request(Method::DELETE, path, RequestOptions::default()).await?;

		Ok(())
	}

	/// Starts a lazy walk over `next` links.
	pub fn paginate(&self, query: Query) -> Paginator<'_, C> {
		Paginator::new(self, query)
	}

	async fn mutate(
		&self,
		method: Method,
		path: &str,
		resource: &Resource,
	) -> Result<Option<Document>> {
		let body = serde_json::json!({ "data": resource });
		let Some(value) = self
			.transport
			.request(method.clone(), path, RequestOptions::default().with_body(body))
			.await?
		else {
			return Ok(None);
		};
		let document = Document::from_value(value)
			.map_err(|source| Error::MalformedResponse { source, status: None })?;

		self.mirror(&method, path, Some(&document)).await?;

		Ok(Some(document))
	}

	async fn mirror(&self, method: &Method, path: &str, document: Option<&Document>) -> Result<()> {
		let Some(cache) = self.cache.as_ref() else { return Ok(()) };

		if *method == Method::DELETE {
			if let Some((resource_type, id)) = resource_key(path) {
				cache.remove(&resource_type, &id).await?;
			}

			return Ok(());
		}

		let mode = match *method {
			Method::GET => AbsorbMode::Fetch,
			Method::POST | Method::PATCH | Method::PUT => AbsorbMode::Mutation,
			_ => return Ok(()),
		};

		if let Some(document) = document {
			cache.absorb(document, mode).await?;
		}

		Ok(())
	}
}
impl<C> Debug for Client<C>
where
	C: HttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client")
			.field("transport", &self.transport)
			.field("cache", &self.cache)
			.finish_non_exhaustive()
	}
}

fn options(query: &Query) -> RequestOptions {
	RequestOptions { query: query.params.clone(), ..Default::default() }
}

fn join<I, S>(items: I) -> String
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	items.into_iter().map(|item| item.as_ref().to_owned()).collect::<Vec<_>>().join(",")
}

/// Extracts `(type, id)` from the last two segments of a resource path.
fn resource_key(path: &str) -> Option<(String, String)> {
	let path = match Url::parse(path) {
		Ok(url) => url.path().to_owned(),
		Err(_) => path.split(['?', '#']).next().unwrap_or_default().to_owned(),
	};
	let mut segments = path.split('/').filter(|segment| !segment.is_empty()).rev();
	let id = segments.next()?;
	let resource_type = segments.next()?;

	Some((resource_type.to_owned(), id.to_owned()))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::*,
		cache::{CacheItem, CacheStoreOptions, MemoryCache},
	};

	async fn client(
		http: &ScriptedHttpClient,
		cache: Option<ResourceCache>,
	) -> Client<ScriptedHttpClient> {
		let mut builder = Client::builder(test_descriptor(), http.clone())
			.credentials(ClientCredentials::new("client-id"))
			.initial_token(token_expiring_in("stored", Some("refresh"), Duration::hours(1)));

		if let Some(cache) = cache {
			builder = builder.cache(cache);
		}

		builder.build().await.expect("Client should build.")
	}

	fn memory_cache(patch_unknown_item: bool, initial: Vec<CacheItem<Resource>>) -> ResourceCache {
		ResourceCache::create_sync(
			MemoryCache::default(),
			CacheStoreOptions { patch_unknown_item, initial },
		)
		.expect("Cache should build.")
	}

	#[test]
	fn query_builders_encode_jsonapi_parameters() {
		let query = Query::new("articles")
			.filter("author", "9")
			.include(["author", "comments"])
			.fields("articles", ["title"])
			.sort("-created")
			.page_size(25);

		assert_eq!(query.path(), "articles");
		assert_eq!(query.params(), &[
			("filter[author]".to_owned(), "9".to_owned()),
			("include".to_owned(), "author,comments".to_owned()),
			("fields[articles]".to_owned(), "title".to_owned()),
			("sort".to_owned(), "-created".to_owned()),
			("page[size]".to_owned(), "25".to_owned()),
		]);
	}

	#[test]
	fn resource_keys_come_from_the_last_two_segments() {
		assert_eq!(resource_key("articles/1"), Some(("articles".into(), "1".into())));
		assert_eq!(resource_key("/v1/articles/1/?x=y"), Some(("articles".into(), "1".into())));
		assert_eq!(
			resource_key("https://api.example.com/articles/7"),
			Some(("articles".into(), "7".into()))
		);
		assert_eq!(resource_key("articles"), None);
	}

	#[tokio::test]
	async fn reads_seed_the_cache_and_keep_included_on_put_rule() {
		let http = ScriptedHttpClient::new([ScriptedResponse::json(
			200,
			r#"{"data":[{"type":"articles","id":"1","attributes":{"title":"One"}}],
			   "included":[{"type":"people","id":"9"}]}"#,
		)]);
		let client = client(&http, Some(memory_cache(false, Vec::new()))).await;
		let document = client
			.get(&Query::new("articles").include(["author"]))
			.await
			.expect("Read should succeed.")
			.expect("A document should be returned.");
		let cache = client.cache().expect("Cache should be attached.");

		assert_eq!(document.primary().count(), 1);
		assert!(cache.get("articles", "1").await.expect("Cache read.").is_some());
		assert!(cache.get("people", "9").await.expect("Cache read.").is_none());
		assert_eq!(
			http.requests()[0].uri().to_string(),
			"https://api.example.com/articles?include=author"
		);
	}

	#[tokio::test]
	async fn mutations_follow_put_rule_and_deletes_drop_keys() {
		let known = Resource::new("articles", "1");
		let http = ScriptedHttpClient::new([
			ScriptedResponse::json(
				200,
				r#"{"data":{"type":"articles","id":"1","attributes":{"title":"Edited"}}}"#,
			),
			ScriptedResponse::json(201, r#"{"data":{"type":"articles","id":"2"}}"#),
			ScriptedResponse::empty(204),
		]);
		let cache = memory_cache(
			false,
			vec![CacheItem::from_resource(&known).expect("Fixture has an id.")],
		);
		let client = client(&http, Some(cache)).await;

		client.update("articles/1", &known).await.expect("Update should succeed.");
		client
			.create("articles", &Resource::new("articles", "2"))
			.await
			.expect("Create should succeed.");

		let cache = client.cache().expect("Cache should be attached.");
		let edited = cache.get("articles", "1").await.expect("Cache read.").expect("Known key.");

		assert_eq!(edited.value.attribute("title"), Some(&Value::from("Edited")));
		assert!(cache.get("articles", "2").await.expect("Cache read.").is_none());

		client.delete("articles/1").await.expect("Delete should succeed.");

		assert!(cache.get("articles", "1").await.expect("Cache read.").is_none());
		assert_eq!(http.requests()[1].method(), Method::POST);
		assert_eq!(http.requests()[2].method(), Method::DELETE);
	}

	#[tokio::test]
	async fn fetch_decodes_into_caller_types() {
		#[derive(Debug, Deserialize)]
		struct Envelope {
			data: Vec<Row>,
		}
		#[derive(Debug, Deserialize)]
		struct Row {
			id: u64,
		}

		let http = ScriptedHttpClient::new([
			ScriptedResponse::json(200, r#"{"data":[{"id":1},{"id":2}]}"#),
			ScriptedResponse::json(200, r#"{"data":[{"id":"three"}]}"#),
		]);
		let client = client(&http, None).await;
		let envelope: Envelope = client
			.fetch(&Query::new("rows"))
			.await
			.expect("Fetch should succeed.")
			.expect("A body should be returned.");

		assert_eq!(envelope.data.iter().map(|row| row.id).collect::<Vec<_>>(), [1, 2]);

		let err = client.fetch::<Envelope>(&Query::new("rows")).await.expect_err("Bad shape.");

		match err {
			Error::MalformedResponse { source, .. } =>
				assert_eq!(source.path().to_string(), "data[0].id"),
			other => panic!("Unexpected error: {other:?}"),
		}
	}

	#[tokio::test]
	async fn build_rejects_invalid_descriptors() {
		let descriptor = ApiDescriptor { user_agent: String::new(), ..test_descriptor() };
		let err = Client::<ScriptedHttpClient>::builder(descriptor, ScriptedHttpClient::default())
			.build()
			.await
			.expect_err("Empty user agents must be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::Descriptor(_))));
	}
}
