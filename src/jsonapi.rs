//! Minimal JSON:API document model used for caching and pagination.

// self
use crate::_prelude::*;

/// JSON object map.
pub type Object = serde_json::Map<String, Value>;

/// Addressable resource object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
	/// Resource type.
	#[serde(rename = "type")]
	pub resource_type: String,
	/// Resource identifier; absent on client-generated creates.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	/// Attribute map.
	#[serde(default, skip_serializing_if = "Object::is_empty")]
	pub attributes: Object,
	/// Relationship map.
	#[serde(default, skip_serializing_if = "Object::is_empty")]
	pub relationships: Object,
	/// Resource-level links.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub links: Option<Value>,
	/// Resource-level meta.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub meta: Option<Value>,
}
impl Resource {
	/// Creates an empty resource.
	pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
		Self {
			resource_type: resource_type.into(),
			id: Some(id.into()),
			attributes: Object::new(),
			relationships: Object::new(),
			links: None,
			meta: None,
		}
	}

	/// Sets one attribute.
	pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
		self.attributes.insert(name.into(), value);

		self
	}

	/// Returns an attribute by name.
	pub fn attribute(&self, name: &str) -> Option<&Value> {
		self.attributes.get(name)
	}
}

/// Primary data: a single resource or a collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
	/// Collection response.
	Many(Vec<Resource>),
	/// Single-resource response.
	One(Box<Resource>),
}

/// A link given either as a bare URL or as a link object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Link {
	/// Bare URL.
	Url(String),
	/// Link object.
	Object {
		/// Target URL.
		href: String,
		/// Link meta.
		#[serde(default, skip_serializing_if = "Option::is_none")]
		meta: Option<Value>,
	},
}
impl Link {
	/// Returns the target URL.
	pub fn href(&self) -> &str {
		match self {
			Link::Url(href) | Link::Object { href, .. } => href,
		}
	}
}

/// Top-level JSON:API document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
	/// Primary data; `None` when absent or `null`.
	#[serde(default)]
	pub data: Option<PrimaryData>,
	/// Side-loaded resources.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub included: Vec<Resource>,
	/// Top-level links; `null` entries are dropped.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty", deserialize_with = "links")]
	pub links: BTreeMap<String, Link>,
	/// Top-level meta.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub meta: Option<Value>,
}
impl Document {
	/// Decodes a document, reporting the JSON path of any mismatch.
	pub fn from_value(value: Value) -> Result<Self, serde_path_to_error::Error<serde_json::Error>> {
		serde_path_to_error::deserialize(value)
	}

	/// Iterates the primary resources.
	pub fn primary(&self) -> impl Iterator<Item = &Resource> {
		let (one, many) = match &self.data {
			Some(PrimaryData::One(resource)) => (Some(resource.as_ref()), &[][..]),
			Some(PrimaryData::Many(resources)) => (None, resources.as_slice()),
			None => (None, &[][..]),
		};

		one.into_iter().chain(many)
	}

	/// Returns the `next` pagination link.
	pub fn next_link(&self) -> Option<&str> {
		self.links.get("next").map(Link::href)
	}
}

fn links<'de, D>(deserializer: D) -> Result<BTreeMap<String, Link>, D::Error>
where
	D: serde::Deserializer<'de>,
{
	let raw = <Option<BTreeMap<String, Option<Link>>>>::deserialize(deserializer)?;

	Ok(raw
		.unwrap_or_default()
		.into_iter()
		.filter_map(|(name, link)| link.map(|link| (name, link)))
		.collect())
}
