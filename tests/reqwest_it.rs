#![cfg(feature = "reqwest")]

// crates.io
use futures::TryStreamExt;
use httpmock::prelude::*;
use time::Duration;
// self
use oauth2_jsonapi::{
	auth::Token,
	cache::{CacheStoreOptions, MemoryCache, ResourceCache},
	client::{ClientBuilder, Query},
	config::{ApiDescriptor, ClientAuthMethod, ClientCredentials},
	error::Error,
	http::Method,
	jsonapi::Document,
	rest::RequestOptions,
	url::Url,
};

fn build_descriptor(server: &MockServer) -> ApiDescriptor {
	ApiDescriptor::builder(Url::parse(&server.url("/")).expect("Mock base URL should parse."))
		.token_endpoint(
			Url::parse(&server.url("/oauth/token")).expect("Mock token endpoint should parse."),
		)
		.client_auth_method(ClientAuthMethod::ClientSecretPost)
		.build()
		.expect("Loopback descriptor should build.")
}

fn expired_token() -> Token {
	Token::builder()
		.access_token("expired-access")
		.refresh_token("refresh-1")
		.expires_in(Duration::ZERO)
		.build()
		.expect("Token fixture should build.")
}

#[tokio::test]
async fn stale_token_is_refreshed_before_paginating_into_the_cache() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token").body_includes("grant_type=refresh_token");
			then.status(200).header("content-type", "application/json").body(
				r#"{"access_token":"fresh-access","token_type":"bearer","expires_in":1800}"#,
			);
		})
		.await;
	let first_page = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/articles")
				.query_param("limit", "1")
				.header("authorization", "Bearer fresh-access")
				.header("accept", "application/vnd.api+json");
			then.status(200).header("content-type", "application/vnd.api+json").body(format!(
				r#"{{"data":[{{"type":"articles","id":"1"}}],"links":{{"next":"{}"}}}}"#,
				server.url("/articles?cursor=2")
			));
		})
		.await;
	let second_page = server
		.mock_async(|when, then| {
			when.method(GET).path("/articles").query_param("cursor", "2");
			then.status(200)
				.header("content-type", "application/vnd.api+json")
				.body(r#"{"data":[{"type":"articles","id":"2"}],"links":{"next":null}}"#);
		})
		.await;
	let cache = ResourceCache::create_sync(MemoryCache::default(), CacheStoreOptions::default())
		.expect("Cache should build.");
	let client = ClientBuilder::with_reqwest(build_descriptor(&server))
		.expect("Reqwest client should build.")
		.credentials(ClientCredentials::new("client-id").with_secret("client-secret"))
		.initial_token(expired_token())
		.cache(cache)
		.build()
		.await
		.expect("Client should build.");
	let pages: Vec<Document> = client
		.paginate(Query::new("articles").param("limit", "1"))
		.into_stream()
		.try_collect()
		.await
		.expect("Both pages should load.");

	token_mock.assert_calls_async(1).await;
	first_page.assert_async().await;
	second_page.assert_async().await;

	assert_eq!(pages.len(), 2);

	let cached = client
		.cache()
		.expect("Cache should be attached.")
		.list(Some("articles"))
		.await
		.expect("Cache listing should succeed.");

	assert_eq!(cached.len(), 2);
	assert_eq!(client.rate_limiter().snapshot().request_counter, 2);
}

#[tokio::test]
async fn retry_after_header_arms_the_cooldown() {
	let server = MockServer::start_async().await;
	let throttled = server
		.mock_async(|when, then| {
			when.method(GET).path("/articles");
			then.status(429)
				.header("retry-after", "30")
				.header("content-type", "application/vnd.api+json")
				.body(r#"{"errors":[{"code_name":"rate_limited","title":"Slow down"}]}"#);
		})
		.await;
	let client = ClientBuilder::with_reqwest(build_descriptor(&server))
		.expect("Reqwest client should build.")
		.build()
		.await
		.expect("Client should build.");
	let err = client
		.request(Method::GET, "articles", RequestOptions::default().anonymous())
		.await
		.expect_err("Throttling must surface by default.");

	assert_eq!(err.retry_after(), Some(Duration::seconds(30)));

	let err = client
		.request(Method::GET, "articles", RequestOptions::default().anonymous())
		.await
		.expect_err("Cooldown must block the next call.");

	assert!(matches!(err, Error::RateLimited { .. }));

	throttled.assert_calls_async(1).await;
}
