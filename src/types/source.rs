//! Resource references: what a caller asks to resolve.

use url::Url;

/// Identifies a remote image.
///
/// ```rust
/// # use huginn::ResourceRef;
/// let by_id = ResourceRef::id("abc123");
/// let by_url = ResourceRef::url_string("https://example.com/cat.png");
/// assert!(by_id.resolved_url().is_none());
/// assert!(by_url.resolved_url().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceRef {
    /// Opaque server-side ID; resolved through metadata before download.
    Id(String),
    /// Fully parsed URL, downloaded directly.
    Url(Url),
    /// URL string, parsed at resolution time.
    UrlString(String),
}

impl ResourceRef {
    /// Reference an image by server-side ID.
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Reference an image by URL.
    pub fn url(url: Url) -> Self {
        Self::Url(url)
    }

    /// Reference an image by URL string.
    pub fn url_string(url: impl Into<String>) -> Self {
        Self::UrlString(url.into())
    }

    /// The directly downloadable URL, if this reference carries one.
    ///
    /// `UrlString` values that fail to parse yield `None`.
    pub fn resolved_url(&self) -> Option<Url> {
        match self {
            Self::Id(_) => None,
            Self::Url(url) => Some(url.clone()),
            Self::UrlString(s) => Url::parse(s).ok(),
        }
    }

    /// The image ID, for ID-based references.
    pub fn image_id(&self) -> Option<&str> {
        match self {
            Self::Id(id) => Some(id),
            _ => None,
        }
    }
}

impl From<Url> for ResourceRef {
    fn from(url: Url) -> Self {
        Self::Url(url)
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id:{id}"),
            Self::Url(url) => write!(f, "{url}"),
            Self::UrlString(s) => write!(f, "{s}"),
        }
    }
}
