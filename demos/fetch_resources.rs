//! Walks a paginated JSON:API collection with the default reqwest transport, refreshing a stale
//! token first and mirroring every page into an in-memory resource cache.

// crates.io
use color_eyre::Result;
use futures::TryStreamExt;
use httpmock::prelude::*;
use time::Duration;
// self
use oauth2_jsonapi::{
	auth::Token,
	cache::{CacheStoreOptions, MemoryCache, ResourceCache},
	client::{ClientBuilder, Query},
	config::{ApiDescriptor, ClientCredentials},
	jsonapi::Document,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"bearer\",\"expires_in\":900}",
			);
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/articles");
			then.status(200).header("content-type", "application/vnd.api+json").body(format!(
				r#"{{"data":[{{"type":"articles","id":"1","attributes":{{"title":"Hello"}}}}],"links":{{"next":"{}"}}}}"#,
				server.url("/articles/pages/2")
			));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/articles/pages/2");
			then.status(200)
				.header("content-type", "application/vnd.api+json")
				.body(r#"{"data":[{"type":"articles","id":"2","attributes":{"title":"World"}}]}"#);
		})
		.await;

	let descriptor = ApiDescriptor::builder(Url::parse(&server.url("/"))?)
		.token_endpoint(Url::parse(&server.url("/oauth/token"))?)
		.build()?;
	let stale = Token::builder()
		.access_token("stale-access")
		.refresh_token("demo-refresh")
		.expires_in(Duration::ZERO)
		.build()?;
	let cache = ResourceCache::create_sync(MemoryCache::default(), CacheStoreOptions::default())?;
	let client = ClientBuilder::with_reqwest(descriptor)?
		.credentials(ClientCredentials::new("demo-client").with_secret("super-secret"))
		.initial_token(stale)
		.cache(cache)
		.build()
		.await?;
	let pages: Vec<Document> =
		client.paginate(Query::new("articles").page_size(1)).into_stream().try_collect().await?;

	for resource in pages.iter().flat_map(Document::primary) {
		println!("{} {:?}: {:?}", resource.resource_type, resource.id, resource.attribute("title"));
	}

	if let Some(cache) = client.cache() {
		println!("Cached articles: {}.", cache.list(Some("articles")).await?.len());
	}

	token_mock.assert_async().await;

	Ok(())
}
