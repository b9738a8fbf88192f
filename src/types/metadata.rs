//! Server-side facts about an image.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

/// Metadata record returned by the image API.
///
/// `url` is kept as the server reported it; a missing or malformed value is
/// only rejected when the resolver tries to download it. Unknown fields are
/// preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    /// Image identifier.
    pub id: String,
    /// Fetchable location of the image bytes.
    #[serde(default)]
    pub url: String,
    /// Any other domain fields the server attached.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ResourceMetadata {
    /// Create metadata with the required fields.
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            extra: BTreeMap::new(),
        }
    }

    /// Attach an extra domain field.
    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Parse the `url` field.
    pub fn parsed_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.url)
    }
}
